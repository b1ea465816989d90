use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{
        AuthResponse, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest,
        SendResetOtpRequest, UserSummary, VerifyEmailRequest,
    },
    extractor::{CurrentUser, SESSION_COOKIE},
    jwt::JwtKeys,
    otp, password,
    repo::User,
};
use crate::email::templates;
use crate::error::ApiError;
use crate::state::AppState;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    // Cross-site frontend in prod needs None; Strict is fine locally
    cookie.set_same_site(if secure {
        SameSite::None
    } else {
        SameSite::Strict
    });
    cookie.set_path("/");
    cookie.set_max_age(TimeDuration::days(1));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    cookie
}

/// Issue a fresh session token, mirror it on the user row, and return the
/// cookie jar carrying it.
async fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
) -> Result<CookieJar, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id)?;
    User::store_token(&state.db, user.id, &token).await?;
    Ok(jar.add(session_cookie(token, state.config.secure_cookies)))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if payload.name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let hash = password::hash_password(&payload.password)?;
    // A concurrent duplicate can slip past the exists check; the unique
    // constraint still has to surface as a conflict, not a 500
    let user = match User::create(&state.db, &payload.name, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) if crate::auth::repo::is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            return Err(ApiError::Conflict("User already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };
    let jar = start_session(&state, jar, &user).await?;

    // Best-effort: a dead relay must not block registration
    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            templates::WELCOME_SUBJECT,
            &templates::welcome(&user.email),
        )
        .await
    {
        warn!(error = %e, user_id = %user.id, "welcome email failed");
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully".into(),
            user: UserSummary::from(&user),
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Invalid credentials".into()));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Unauthorized("Invalid credentials".into())
        })?;

    if !password::verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let jar = start_session(&state, jar, &user).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            message: "Login successful".into(),
            user: UserSummary::from(&user),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    User::clear_token(&state.db, user.id).await?;
    let jar = jar.remove(removal_cookie());
    info!(user_id = %user.id, "user logged out");
    Ok((jar, Json(MessageResponse::ok("Logged out successfully"))))
}

#[instrument(skip_all)]
pub async fn send_verification_otp(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if user.is_verified {
        return Err(ApiError::BadRequest("Account already verified".into()));
    }

    let code = otp::generate();
    let expires_at = otp::expiry_from(OffsetDateTime::now_utc());
    User::set_verify_otp(&state.db, user.id, &code, expires_at).await?;

    // The user cannot proceed without the code, so a send failure is fatal
    state
        .mailer
        .send(
            &user.email,
            templates::VERIFY_SUBJECT,
            &templates::verify_otp(&user.email, &code),
        )
        .await?;

    info!(user_id = %user.id, "verification otp sent");
    Ok(Json(MessageResponse::ok("Verification OTP sent to email")))
}

#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.otp.is_empty() {
        return Err(ApiError::BadRequest("OTP is required".into()));
    }

    if !otp::matches(user.verify_otp.as_deref(), &payload.otp) {
        return Err(ApiError::BadRequest("Invalid OTP".into()));
    }
    match user.verify_otp_expires_at {
        Some(expires_at) if !otp::is_expired(expires_at, OffsetDateTime::now_utc()) => {}
        _ => return Err(ApiError::BadRequest("OTP expired".into())),
    }

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

#[instrument(skip_all)]
pub async fn is_authenticated(
    CurrentUser(user): CurrentUser,
) -> Json<AuthResponse> {
    Json(AuthResponse {
        success: true,
        message: String::new(),
        user: UserSummary::from(&user),
    })
}

#[instrument(skip(state, payload))]
pub async fn send_reset_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendResetOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let code = otp::generate();
    let expires_at = otp::expiry_from(OffsetDateTime::now_utc());
    User::set_reset_otp(&state.db, user.id, &code, expires_at).await?;

    state
        .mailer
        .send(
            &user.email,
            templates::RESET_SUBJECT,
            &templates::reset_otp(&user.email, &code),
        )
        .await?;

    info!(user_id = %user.id, "reset otp sent");
    Ok(Json(MessageResponse::ok("Password reset OTP sent to email")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.otp.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::BadRequest("Missing details".into()));
    }
    if payload.new_password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !otp::matches(user.reset_otp.as_deref(), &payload.otp) {
        return Err(ApiError::BadRequest("Invalid OTP".into()));
    }
    match user.reset_otp_expires_at {
        Some(expires_at) if !otp::is_expired(expires_at, OffsetDateTime::now_utc()) => {}
        _ => return Err(ApiError::BadRequest("OTP expired".into())),
    }

    let hash = password::hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse::ok("Password reset successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("user.name+tag@sub.domain.org"));
    }

    #[test]
    fn email_validation_rejects_malformed_input() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn session_cookie_is_http_only_with_a_day_ttl() {
        let cookie = session_cookie("tok".into(), false);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(TimeDuration::days(1)));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn prod_cookie_is_secure_and_cross_site() {
        let cookie = session_cookie("tok".into(), true);
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
    }
}

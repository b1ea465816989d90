use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;

/// Name of the HTTP-only session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Extractor behind every protected route: cookie token must verify as a JWT
/// and equal the token stored on the user row (single-session semantics).
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized user".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("session token expired or invalid");
            ApiError::TokenInvalid
        })?;

        let user = User::find_by_session(&state.db, claims.sub, &token)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "session token does not match stored token");
                ApiError::Unauthorized("Unauthorized user".into())
            })?;

        Ok(CurrentUser(user))
    }
}

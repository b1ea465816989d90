use serde::{Deserialize, Serialize};

use crate::auth::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct SendResetOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub email: String,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            name: u.name.clone(),
            email: u.email.clone(),
            is_verified: u.is_verified,
        }
    }
}

/// Response for register/login and the authenticated-user lookups.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSummary,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_summary_uses_camel_case_flag() {
        let json = serde_json::to_string(&UserSummary {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            is_verified: true,
        })
        .unwrap();
        assert!(json.contains("\"isVerified\":true"));
        assert!(json.contains("ada@example.com"));
    }

    #[test]
    fn reset_request_accepts_frontend_field_name() {
        let req: ResetPasswordRequest = serde_json::from_str(
            r#"{"email":"a@b.com","otp":"123456","newPassword":"fresh-password"}"#,
        )
        .unwrap();
        assert_eq!(req.new_password, "fresh-password");
    }
}

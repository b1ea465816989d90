use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod extractor;
pub mod handlers;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/send-verification-otp", post(handlers::send_verification_otp))
        .route("/verify-email", post(handlers::verify_email))
        .route("/is-authenticated", get(handlers::is_authenticated))
        .route("/send-reset-otp", post(handlers::send_reset_otp))
        .route("/reset-password", post(handlers::reset_password))
}

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/getUserData", get(handlers::get_user_data))
        .route("/skinAnalyze", post(handlers::analyze_skin))
        .route("/eyeAnalyze", post(handlers::analyze_eye))
        .route("/woundMonitor", post(handlers::analyze_wound))
        .route("/checkReportStatus/:id", get(handlers::check_report_status))
        .route("/downloadReport/:id", get(handlers::download_report))
        .route("/getUserHistory", get(handlers::get_user_history))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB uploads
}

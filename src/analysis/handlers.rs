use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::analysis::{
    dto::{AnalysisResponse, HistoryItem, HistoryResponse, Pagination},
    repo::{self, NewHistoryRecord},
};
use crate::auth::dto::{AuthResponse, UserSummary};
use crate::auth::extractor::CurrentUser;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::inference::{AnalyzeUpload, ImageKind};
use crate::state::AppState;

/// Multipart fields gathered before validation.
#[derive(Default)]
struct UploadParts {
    image: Option<(Bytes, String, String)>, // bytes, content type, file name
    description: String,
    location: String,
}

impl UploadParts {
    /// Reject the request before any outbound call when no file arrived.
    fn into_upload(self) -> Result<AnalyzeUpload, ApiError> {
        let (bytes, content_type, file_name) = self
            .image
            .ok_or_else(|| ApiError::BadRequest("Image file is required".into()))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Image file is empty".into()));
        }
        Ok(AnalyzeUpload {
            bytes,
            content_type,
            file_name,
            description: self.description,
            location: self.location,
        })
    }
}

async fn collect_upload(mut mp: Multipart) -> Result<AnalyzeUpload, ApiError> {
    let mut parts = UploadParts::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "image" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.bin".into());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                parts.image = Some((bytes, content_type, file_name));
            }
            "description" => {
                parts.description = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            "location" => {
                parts.location = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            _ => {}
        }
    }
    parts.into_upload()
}

/// Shared flow for the three examination endpoints: forward upstream,
/// persist the result, echo it back. No retries on upstream failure.
async fn run_analysis(
    state: AppState,
    user: User,
    kind: ImageKind,
    mp: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let upload = collect_upload(mp).await?;

    let job_id = Uuid::new_v4();
    let outcome = state
        .inference
        .analyze(kind, job_id, &upload)
        .await
        .map_err(|e| {
            error!(error = %e, %job_id, kind = kind.endpoint_slug(), "inference call failed");
            ApiError::Upstream(e.to_string())
        })?;

    let confidence = outcome.confidence.clamp(0.0, 1.0);
    repo::insert(
        &state.db,
        NewHistoryRecord {
            id: job_id,
            user_id: user.id,
            image: upload.bytes.to_vec(),
            content_type: upload.content_type,
            original_name: Some(upload.file_name),
            description: (!upload.description.is_empty()).then_some(upload.description),
            location: (!upload.location.is_empty()).then_some(upload.location),
            prediction: outcome.label.clone(),
            confidence,
            image_type: kind.as_str().to_string(),
        },
    )
    .await?;

    info!(user_id = %user.id, %job_id, label = %outcome.label, "analysis stored");
    Ok(Json(AnalysisResponse {
        id: job_id,
        label: outcome.label,
        confidence,
        annotated_image: outcome.annotated_image,
        report: outcome.report,
        report_url: outcome.report_url,
    }))
}

#[instrument(skip_all)]
pub async fn analyze_skin(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    run_analysis(state, user, ImageKind::Skin, mp).await
}

#[instrument(skip_all)]
pub async fn analyze_eye(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    run_analysis(state, user, ImageKind::Eye, mp).await
}

#[instrument(skip_all)]
pub async fn analyze_wound(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    run_analysis(state, user, ImageKind::Wound, mp).await
}

#[instrument(skip_all)]
pub async fn get_user_data(CurrentUser(user): CurrentUser) -> Json<AuthResponse> {
    Json(AuthResponse {
        success: true,
        message: String::new(),
        user: UserSummary::from(&user),
    })
}

#[instrument(skip_all)]
pub async fn get_user_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let rows = repo::list_page(&state.db, user.id, p.limit(), p.offset()).await?;
    let total = repo::count_for_user(&state.db, user.id).await?;
    let history = rows.into_iter().map(HistoryItem::from).collect();
    Ok(Json(HistoryResponse {
        success: true,
        history,
        total,
    }))
}

#[instrument(skip_all)]
pub async fn check_report_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !repo::is_owned_by(&state.db, id, user.id).await? {
        return Err(ApiError::NotFound("Record not found".into()));
    }
    let status = state.inference.report_status(id).await.map_err(|e| {
        error!(error = %e, %id, "report status lookup failed");
        ApiError::Upstream(e.to_string())
    })?;
    Ok(Json(status))
}

#[instrument(skip_all)]
pub async fn download_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !repo::is_owned_by(&state.db, id, user.id).await? {
        return Err(ApiError::NotFound("Record not found".into()));
    }
    let pdf = state.inference.download_report(id).await.map_err(|e| {
        error!(error = %e, %id, "report download failed");
        ApiError::Upstream(e.to_string())
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"report-{id}.pdf\""),
            ),
        ],
        pdf,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_rejected_before_any_outbound_call() {
        let parts = UploadParts {
            image: None,
            description: "itchy patch".into(),
            location: "left arm".into(),
        };
        let err = parts.into_upload().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn empty_file_is_rejected() {
        let parts = UploadParts {
            image: Some((Bytes::new(), "image/png".into(), "a.png".into())),
            ..Default::default()
        };
        assert!(matches!(
            parts.into_upload().unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn upload_keeps_metadata_and_defaults() {
        let parts = UploadParts {
            image: Some((Bytes::from_static(b"\xff\xd8"), "image/jpeg".into(), "x.jpg".into())),
            description: "d".into(),
            location: String::new(),
        };
        let upload = parts.into_upload().unwrap();
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.file_name, "x.jpg");
        assert_eq!(upload.description, "d");
        assert!(upload.location.is_empty());
    }
}

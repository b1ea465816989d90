use std::time::Duration;

use axum::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::InferenceConfig;

/// Which examination the upload belongs to. Drives both the upstream
/// endpoint and the `image_type` column on the history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Skin,
    Eye,
    Wound,
}

impl ImageKind {
    /// Path segment of the upstream analyze endpoint.
    pub fn endpoint_slug(&self) -> &'static str {
        match self {
            ImageKind::Skin => "skin",
            ImageKind::Eye => "eye",
            ImageKind::Wound => "wound",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Skin => "Skin",
            ImageKind::Eye => "Eye",
            ImageKind::Wound => "Wound",
        }
    }
}

/// An upload buffered in memory, ready to forward upstream.
#[derive(Debug, Clone)]
pub struct AnalyzeUpload {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: String,
    pub description: String,
    pub location: String,
}

/// What the inference service returns for one image.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceOutcome {
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub annotated_image: Option<String>,
    #[serde(default)]
    pub report: Option<serde_json::Value>,
    #[serde(default)]
    pub report_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(String),

    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid inference response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Forward one image as multipart form data and get the prediction back.
    async fn analyze(
        &self,
        kind: ImageKind,
        job_id: Uuid,
        upload: &AnalyzeUpload,
    ) -> Result<InferenceOutcome, InferenceError>;

    /// Pass-through report status lookup keyed by record id.
    async fn report_status(&self, id: Uuid) -> Result<serde_json::Value, InferenceError>;

    /// Fetch the generated PDF for a record.
    async fn download_report(&self, id: Uuid) -> Result<Bytes, InferenceError>;
}

/// reqwest-backed client with one bounded timeout for every call.
pub struct HttpInferenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInferenceClient {
    pub fn new(cfg: &InferenceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    #[instrument(skip(self, upload), fields(kind = kind.endpoint_slug()))]
    async fn analyze(
        &self,
        kind: ImageKind,
        job_id: Uuid,
        upload: &AnalyzeUpload,
    ) -> Result<InferenceOutcome, InferenceError> {
        let file = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let form = Form::new()
            .part("file", file)
            .text("job_id", job_id.to_string())
            .text("description", upload.description.clone())
            .text("location", upload.location.clone());

        let url = format!("{}/analyze-{}", self.base_url, kind.endpoint_slug());
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let resp = Self::check(resp).await?;
        let outcome = resp
            .json::<InferenceOutcome>()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        debug!(%job_id, label = %outcome.label, confidence = outcome.confidence, "analysis done");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn report_status(&self, id: Uuid) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/check-report-status/{}", self.base_url, id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;
        let resp = Self::check(resp).await?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn download_report(&self, id: Uuid) -> Result<Bytes, InferenceError> {
        let url = format!("{}/pdf/{}", self.base_url, id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;
        let resp = Self::check(resp).await?;
        resp.bytes()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_slugs_and_labels() {
        assert_eq!(ImageKind::Skin.endpoint_slug(), "skin");
        assert_eq!(ImageKind::Eye.endpoint_slug(), "eye");
        assert_eq!(ImageKind::Wound.endpoint_slug(), "wound");
        assert_eq!(ImageKind::Skin.as_str(), "Skin");
        assert_eq!(ImageKind::Eye.as_str(), "Eye");
        assert_eq!(ImageKind::Wound.as_str(), "Wound");
    }

    #[test]
    fn outcome_parses_full_payload() {
        let json = r#"{
            "label": "melanoma",
            "confidence": 0.93,
            "annotated_image": "data:image/png;base64,AAAA",
            "report": {"summary": "see dermatologist"},
            "report_url": "/reports/abc.json"
        }"#;
        let out: InferenceOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(out.label, "melanoma");
        assert!((out.confidence - 0.93).abs() < f64::EPSILON);
        assert!(out.annotated_image.is_some());
        assert!(out.report.is_some());
        assert_eq!(out.report_url.as_deref(), Some("/reports/abc.json"));
    }

    #[test]
    fn outcome_parses_minimal_payload() {
        let out: InferenceOutcome =
            serde_json::from_str(r#"{"label": "healthy", "confidence": 0.5}"#).unwrap();
        assert_eq!(out.label, "healthy");
        assert!(out.annotated_image.is_none());
        assert!(out.report.is_none());
        assert!(out.report_url.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpInferenceClient::new(&InferenceConfig {
            base_url: "http://inference:8000/".into(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(client.base_url, "http://inference:8000");
    }
}

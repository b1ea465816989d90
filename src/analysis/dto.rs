use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::analysis::repo::HistoryRecord;

/// 1-based page query, matching the frontend's `?pageNumber=&pageSize=`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default = "default_page_number")]
    pub page_number: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page_number() -> i64 {
    1
}
fn default_page_size() -> i64 {
    4
}

const MAX_PAGE_SIZE: i64 = 100;

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page_number.max(1) - 1) * self.limit()
    }
}

/// Result of one analysis, echoed straight back to the browser.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub id: Uuid,
    pub label: String,
    pub confidence: f64,
    pub annotated_image: Option<String>,
    pub report: Option<serde_json::Value>,
    pub report_url: Option<String>,
}

/// One past analysis with the stored image inlined as a data URI.
#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub image: String,
    pub content_type: String,
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub prediction: String,
    pub confidence: f64,
    pub image_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<HistoryItem>,
    pub total: i64,
}

pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

impl From<HistoryRecord> for HistoryItem {
    fn from(r: HistoryRecord) -> Self {
        Self {
            id: r.id,
            image: data_uri(&r.content_type, &r.image),
            content_type: r.content_type,
            original_name: r.original_name,
            description: r.description,
            location: r.location,
            prediction: r.prediction,
            confidence: r.confidence,
            image_type: r.image_type,
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_match_frontend() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.page_number, 1);
        assert_eq!(p.page_size, 4);
        assert_eq!(p.limit(), 4);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn pagination_offset_is_zero_based() {
        let p: Pagination =
            serde_json::from_str(r#"{"pageNumber": 3, "pageSize": 10}"#).unwrap();
        assert_eq!(p.limit(), 10);
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn pagination_clamps_abusive_values() {
        let p: Pagination =
            serde_json::from_str(r#"{"pageNumber": 0, "pageSize": 10000}"#).unwrap();
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);

        let p: Pagination =
            serde_json::from_str(r#"{"pageNumber": -5, "pageSize": -1}"#).unwrap();
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn data_uri_embeds_content_type_and_base64() {
        let uri = data_uri("image/png", b"\x89PNG");
        assert!(uri.starts_with("data:image/png;base64,"));
        let encoded = uri.rsplit(',').next().unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"\x89PNG");
    }
}

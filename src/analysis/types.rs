use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Normalized reply of the analysis service.
///
/// `score: None` means the service produced no score, which is not the same
/// as a score of zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub feedback: String,
    pub score: Option<u8>,
}

impl AnalysisResult {
    pub fn new(feedback: impl Into<String>, score: Option<u8>) -> Self {
        Self {
            feedback: feedback.into(),
            score,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.feedback.is_empty() && self.score.is_none()
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis service answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed analysis response: {0}")]
    Malformed(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Parses `{ feedback?: string, score?: number }`.
///
/// Missing or null feedback becomes `""`, missing or null score stays
/// absent. Scores are rounded and clamped into `0..=100`.
pub fn parse_response(body: &[u8]) -> Result<AnalysisResult, ClientError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| ClientError::Malformed(err.to_string()))?;
    if !value.is_object() {
        return Err(ClientError::Malformed(format!(
            "expected a JSON object, got {value}"
        )));
    }

    let raw: RawResponse =
        serde_json::from_value(value).map_err(|err| ClientError::Malformed(err.to_string()))?;

    Ok(AnalysisResult {
        feedback: raw.feedback.unwrap_or_default(),
        score: raw.score.map(normalize_score),
    })
}

fn normalize_score(score: f64) -> u8 {
    score.round().clamp(0.0, 100.0) as u8
}

/// A file picked for upload, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl UploadPayload {
    pub fn new(path: &Path, bytes: Vec<u8>) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Self {
            content_type: content_type_for(path),
            file_name,
            bytes,
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

//! Terminal values of a submission.
//!
//! The backend has shipped two response shapes over time:
//! `{"status": "success", "download": "abc.wav"}` and
//! `{"success": true, "download_url": "/download/abc.wav", ...}`.
//! Both are read here; the untouched object is kept as `payload`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path segment under which the backend serves processed files.
pub const DOWNLOAD_SEGMENT: &str = "/download/";

/// Keys that may carry the download reference, in lookup order.
const REFERENCE_KEYS: [&str; 4] = ["download", "filename", "download_url", "output_file"];

/// Outcome reported by the backend inside a 2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
}

/// The result of a completed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    /// Success unless the body explicitly says otherwise.
    pub status: ResultStatus,

    /// Opaque name to pass to `resolve_download_url`.
    pub download_reference: Option<String>,

    /// The parsed response object.
    pub payload: Map<String, Value>,
}

impl ProcessingResult {
    /// Builds a result from a 2xx response object.
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let status = status_from_payload(&payload);
        let download_reference = download_reference_from_payload(&payload);
        Self {
            status,
            download_reference,
            payload,
        }
    }

    /// Returns true if the backend reported success.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Returns the backend's human-readable message, if any.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }
}

fn status_from_payload(payload: &Map<String, Value>) -> ResultStatus {
    if let Some(Value::Bool(false)) = payload.get("success") {
        return ResultStatus::Failure;
    }
    match payload.get("status").and_then(Value::as_str) {
        Some("error") | Some("failure") | Some("failed") => ResultStatus::Failure,
        _ => ResultStatus::Success,
    }
}

fn download_reference_from_payload(payload: &Map<String, Value>) -> Option<String> {
    REFERENCE_KEYS
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(reference_from_value)
        .find(|r| !r.is_empty())
}

/// Reduces `/download/abc.wav` or `http://host/download/abc.wav` to `abc.wav`.
pub fn reference_from_value(value: &str) -> String {
    match value.rfind(DOWNLOAD_SEGMENT) {
        Some(idx) => value[idx + DOWNLOAD_SEGMENT.len()..].to_string(),
        None => value.to_string(),
    }
}

/// Typed view of the `/health` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Gateway state, e.g. `"healthy"`.
    #[serde(default)]
    pub gateway: Option<String>,

    /// Single-service state, e.g. `"ok"` or `"running"`.
    #[serde(default)]
    pub status: Option<String>,

    /// Per-microservice details.
    #[serde(default)]
    pub services: BTreeMap<String, Value>,

    /// Everything else the backend sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthStatus {
    /// Returns true if the backend describes itself as up.
    pub fn is_healthy(&self) -> bool {
        let up = |s: &str| matches!(s, "healthy" | "ok" | "running" | "ready");
        self.gateway.as_deref().map_or(false, up) || self.status.as_deref().map_or(false, up)
    }

    /// Names of the microservices the gateway reports.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}

//! Error types for the processing client.
//!
//! Every failure a submission can end in is a [`ClientError`] tagged with a
//! [`FailureKind`], so callers can decide on retries or messaging without
//! string matching.

use std::fmt;

/// Failure categories surfaced by the client.
///
/// The first four mirror the transport outcomes of a submission; the rest
/// cover cancellation and problems on the local side of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request never produced an HTTP response.
    /// Trigger: DNS failure, connection refused or reset.
    Network,

    /// The backend answered with a non-2xx status.
    /// Trigger: processing failure, bad parameters, missing route.
    HttpStatus,

    /// No complete response arrived within the request ceiling.
    /// Trigger: backend stuck or upload link too slow.
    Timeout,

    /// The response body was not a JSON object.
    /// Trigger: proxy error page, truncated body, wrong backend.
    Serialization,

    /// The caller cancelled the submission.
    Cancelled,

    /// The request breaks a structural invariant.
    /// Trigger: missing or empty file, join file on a non-join request.
    InvalidRequest,

    /// Reading an input file or writing a downloaded result failed.
    LocalIo,
}

impl FailureKind {
    /// Returns the string representation of the failure kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "NETWORK",
            FailureKind::HttpStatus => "HTTP_STATUS",
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::Serialization => "SERIALIZATION",
            FailureKind::Cancelled => "CANCELLED",
            FailureKind::InvalidRequest => "INVALID_REQUEST",
            FailureKind::LocalIo => "LOCAL_IO",
        }
    }

    /// Returns a human-readable description of the failure.
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Network => "Could not reach the processing backend",
            FailureKind::HttpStatus => "The processing backend rejected the request",
            FailureKind::Timeout => "The processing backend did not answer in time",
            FailureKind::Serialization => "The processing backend sent an unreadable response",
            FailureKind::Cancelled => "The request was cancelled",
            FailureKind::InvalidRequest => "The request is missing required input",
            FailureKind::LocalIo => "A local file could not be read or written",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this failure.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            FailureKind::Network => {
                "Check that the backend is running and that ODOREMOVER_API_BASE \
                 (or --api-base) points at it, e.g. http://localhost:5000"
            }
            FailureKind::HttpStatus => {
                "Inspect the response body for the backend's error message; \
                 check the file format and the operation parameters"
            }
            FailureKind::Timeout => {
                "Try a shorter file, raise ODOREMOVER_TIMEOUT_SEC, \
                 or check backend load"
            }
            FailureKind::Serialization => {
                "Verify the base URL points at the audio API and not at a proxy or web page"
            }
            FailureKind::Cancelled => "Submit the file again when ready",
            FailureKind::InvalidRequest => {
                "Provide a non-empty audio file; a second file is only accepted for join"
            }
            FailureKind::LocalIo => "Check that the path exists and is readable/writable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for client operations.
#[derive(Debug)]
pub struct ClientError {
    /// The failure category.
    pub kind: FailureKind,
    /// Human-readable error message with context.
    pub message: String,
    /// HTTP status code, set for `HttpStatus` failures.
    pub status: Option<u16>,
    /// Raw response body, when the backend sent one.
    pub body: Option<String>,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClientError {
    /// Creates a new ClientError with the given kind and message.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            body: None,
            source: None,
        }
    }

    /// Creates a new ClientError with an underlying cause.
    pub fn with_source(
        kind: FailureKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(kind, message)
        }
    }

    /// Creates a NETWORK error from a transport failure.
    pub fn network(
        url: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(
            FailureKind::Network,
            format!("Request to {} failed", url),
            source,
        )
    }

    /// Creates an HTTP_STATUS error, keeping the status code and body.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = backend_error_detail(&body);
        let message = match detail {
            Some(detail) => format!("Backend returned HTTP {}: {}", status, detail),
            None => format!("Backend returned HTTP {}", status),
        };
        Self {
            status: Some(status),
            body: Some(body),
            ..Self::new(FailureKind::HttpStatus, message)
        }
    }

    /// Creates an HTTP_STATUS error for a response whose body could not be read.
    pub fn http_status_unreadable(
        status: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let message = format!(
            "Backend returned HTTP {} (response body unreadable: {})",
            status, source
        );
        Self {
            status: Some(status),
            ..Self::with_source(FailureKind::HttpStatus, message, source)
        }
    }

    /// Creates a TIMEOUT error.
    pub fn timeout(seconds: u64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("No response within {} seconds", seconds),
        )
    }

    /// Creates a SERIALIZATION error for an unparsable body.
    pub fn serialization(body: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::with_source(
                FailureKind::Serialization,
                "Response body is not a JSON object",
                source,
            )
        }
    }

    /// Creates a CANCELLED error.
    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Submission cancelled by caller")
    }

    /// Creates an INVALID_REQUEST error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidRequest, reason)
    }

    /// Creates a LOCAL_IO error.
    pub fn local_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::with_source(FailureKind::LocalIo, context, source)
    }

    /// Returns true if the failure happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, FailureKind::Network | FailureKind::Timeout)
    }
}

/// Pulls the backend's own message out of an error body, if it has one.
///
/// The gateway answers `{"success": false, "error": "..."}`; FastAPI
/// validation errors use `{"detail": ...}`.
fn backend_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("error").or_else(|| value.get("detail"))?;
    match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.kind,
            self.message,
            self.kind.recovery_hint()
        )
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

//! SubmissionState: what a front end shows while a submission runs.
//!
//! The client itself keeps no state; callers fold progress events and the
//! terminal outcome into this value to render idle/uploading/done/error.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, FailureKind};

use super::result::ProcessingResult;

/// Derived state of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionState {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Upload in flight.
    Uploading { percent: u8 },
    /// Upload finished, waiting for the backend to answer.
    Processing,
    /// The backend returned a result.
    Succeeded { download_reference: Option<String> },
    /// The submission failed.
    Failed { kind: String, message: String },
}

impl SubmissionState {
    /// Returns true if the submission has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Succeeded { .. } | SubmissionState::Failed { .. }
        )
    }

    /// Returns true if a request is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SubmissionState::Uploading { .. } | SubmissionState::Processing
        )
    }

    /// Marks the submission as started.
    pub fn start(&mut self) {
        *self = SubmissionState::Uploading { percent: 0 };
    }

    /// Applies an upload progress event.
    ///
    /// Ignored once terminal. Reaching 100 % moves to `Processing`.
    pub fn on_progress(&mut self, percent: u8) {
        if self.is_terminal() || *self == SubmissionState::Processing {
            return;
        }
        let percent = percent.min(100);
        *self = if percent == 100 {
            SubmissionState::Processing
        } else {
            SubmissionState::Uploading { percent }
        };
    }

    /// Applies the terminal outcome of the submission.
    pub fn on_outcome(&mut self, outcome: &Result<ProcessingResult, ClientError>) {
        *self = match outcome {
            Ok(result) if result.is_success() => SubmissionState::Succeeded {
                download_reference: result.download_reference.clone(),
            },
            Ok(result) => SubmissionState::Failed {
                kind: FailureKind::HttpStatus.as_str().to_string(),
                message: result
                    .payload
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Backend reported failure")
                    .to_string(),
            },
            Err(e) => SubmissionState::Failed {
                kind: e.kind.as_str().to_string(),
                message: e.message.clone(),
            },
        };
    }

    /// Returns the upload percentage to display, if meaningful.
    pub fn percent(&self) -> Option<u8> {
        match self {
            SubmissionState::Uploading { percent } => Some(*percent),
            SubmissionState::Processing | SubmissionState::Succeeded { .. } => Some(100),
            _ => None,
        }
    }
}

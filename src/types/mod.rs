//! Core types for the processing client.
//!
//! - [`Operation`]: which backend action a request targets
//! - [`ProcessingRequest`]: file, join file and form parameters for one submission
//! - [`ProcessingResult`] / [`HealthStatus`]: parsed backend responses
//! - [`SubmissionState`]: derived front-end state of a submission

mod operation;
mod request;
mod result;
mod state;

pub use operation::{Method, Operation};
pub use request::{
    mime_for_path, AudioFile, CutJoinMode, ParamValue, ProcessingRequest, FILE_FIELD,
    JOIN_FILE_FIELD,
};
pub use result::{reference_from_value, HealthStatus, ProcessingResult, ResultStatus, DOWNLOAD_SEGMENT};
pub use state::SubmissionState;

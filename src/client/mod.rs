//! Processing client for the audio backend.
//!
//! - [`ProcessingClient`]: `submit`, `health`, `resolve_download_url`,
//!   `download`, `play_info`
//! - [`Transport`] / [`HttpTransport`]: the network seam
//! - [`ProgressReporter`] / [`ProgressTracker`]: upload progress accounting
//! - [`CancelToken`]: aborts an in-flight submission

pub mod cancel;
pub mod download;
pub mod processing;
pub mod progress;
pub mod transport;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use download::local_file_name;
pub use processing::ProcessingClient;
pub use progress::{ProgressCallback, ProgressReporter, ProgressTracker, UPLOAD_CHUNK_SIZE};
pub use transport::{HttpTransport, OutgoingRequest, Transport, TransportResponse};

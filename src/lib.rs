//! odoremover-client: upload/progress/result client for the Odoremover
//! audio processing backend.
//!
//! The backend does the DSP (vocal removal, pitch/tempo, conversion, noise
//! reduction, cut/join). This library turns a local file plus parameters
//! into one tracked, cancellable request and a downloadable result.
//!
//! # Modules
//!
//! - [`types`]: Requests, results and derived submission state
//! - [`client`]: The processing client, transport seam and progress plumbing
//! - [`config`]: Runtime configuration (ClientConfig)
//! - [`error`]: Error types and failure kinds (ClientError, FailureKind)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use odoremover_client::{AudioFile, ClientConfig, ProcessingClient, ProcessingRequest};
//!
//! let client = ProcessingClient::new(ClientConfig::with_base_url("http://localhost:5000"))?;
//! let file = AudioFile::from_path("song.mp3".as_ref()).await?;
//!
//! let result = client
//!     .submit(
//!         ProcessingRequest::adjust_pitch_tempo(file, -2.0, 1.0),
//!         Some(Arc::new(|percent| eprintln!("upload {}%", percent))),
//!     )
//!     .await?;
//!
//! if let Some(reference) = &result.download_reference {
//!     println!("{}", client.resolve_download_url(reference));
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use client::{CancelToken, ProcessingClient, ProgressCallback, Transport};
pub use config::ClientConfig;
pub use error::{ClientError, FailureKind, Result};
pub use types::{
    AudioFile, HealthStatus, Operation, ProcessingRequest, ProcessingResult, ResultStatus,
    SubmissionState,
};

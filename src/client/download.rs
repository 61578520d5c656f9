//! Result downloader.
//!
//! Fetches processed files from `GET /download/{reference}` into a local
//! directory. Bytes land in a `.part` file first and are renamed once the
//! body is complete, so a failed download never leaves a truncated result
//! under the final name.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{ClientError, Result};
use crate::types::reference_from_value;

use super::processing::ProcessingClient;
use super::progress::{ProgressCallback, ProgressReporter};
use super::transport::{map_reqwest_error, HttpTransport};

impl ProcessingClient {
    /// Downloads a processed file into `dest_dir`, returning its path.
    ///
    /// `on_progress` receives download percentages when the server sends a
    /// content length.
    pub async fn download(
        &self,
        reference: &str,
        dest_dir: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PathBuf> {
        let file_name = local_file_name(reference)?;
        let url = self.resolve_download_url(&reference_from_value(reference));

        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            ClientError::local_io(
                format!("Failed to create download directory {}", dest_dir.display()),
                e,
            )
        })?;

        let dest = dest_dir.join(&file_name);
        let partial = dest_dir.join(format!("{}.part", file_name));
        let reporter = ProgressReporter::new(on_progress, None);

        tracing::debug!(url = %url, dest = %dest.display(), "downloading result");

        let fetched = tokio::time::timeout(
            self.config().request_timeout(),
            self.transport().download(&url, &partial, reporter.clone()),
        )
        .await;
        reporter.close();

        let written = match fetched {
            Ok(Ok(written)) => written,
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
            Err(_) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(ClientError::timeout(self.config().request_timeout_sec));
            }
        };

        tokio::fs::rename(&partial, &dest).await.map_err(|e| {
            ClientError::local_io(format!("Failed to move download to {}", dest.display()), e)
        })?;

        let size_mb = written as f64 / (1024.0 * 1024.0);
        tracing::info!(dest = %dest.display(), size_mb, "download complete");
        Ok(dest)
    }
}

impl HttpTransport {
    /// Streams a GET response body into `dest` chunk by chunk.
    pub(crate) async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressReporter,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(match response.text().await {
                Ok(body) => ClientError::http_status(status, body),
                Err(e) => ClientError::http_status_unreadable(status, e),
            });
        }

        let total_size = response.content_length();

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            ClientError::local_io(format!("Failed to create file {}", dest.display()), e)
        })?;

        let mut downloaded: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_error(url, e))?;
            file.write_all(&chunk).await.map_err(|e| {
                ClientError::local_io(format!("Failed to write file {}", dest.display()), e)
            })?;
            downloaded += chunk.len() as u64;
            progress.observe(downloaded, total_size);
        }

        file.flush().await.map_err(|e| {
            ClientError::local_io(format!("Failed to write file {}", dest.display()), e)
        })?;

        Ok(downloaded)
    }
}

/// Turns a download reference into a safe local file name.
///
/// Only the last path component is kept, so a reference can never point
/// outside the destination directory.
pub fn local_file_name(reference: &str) -> Result<String> {
    let name = reference
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    match name {
        "" | "." | ".." => Err(ClientError::invalid_request(format!(
            "Download reference {:?} has no file name",
            reference
        ))),
        _ => Ok(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn file_name_keeps_last_component() {
        assert_eq!(local_file_name("abc.wav").unwrap(), "abc.wav");
        assert_eq!(local_file_name("/download/abc.wav").unwrap(), "abc.wav");
        assert_eq!(local_file_name("..\\..\\evil.mp3").unwrap(), "evil.mp3");
    }

    #[test]
    fn file_name_rejects_empty_and_dots() {
        for reference in ["", "/download/", "..", "a/."] {
            let err = local_file_name(reference).unwrap_err();
            assert_eq!(err.kind, FailureKind::InvalidRequest, "{:?}", reference);
        }
    }
}

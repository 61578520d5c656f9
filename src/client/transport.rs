//! Transport seam between the processing client and the network.
//!
//! The client prepares an [`OutgoingRequest`] and hands it to a
//! [`Transport`]. [`HttpTransport`] sends it with reqwest; tests plug in
//! in-memory transports.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::{ClientError, FailureKind, Result};
use crate::types::{AudioFile, Method};

use super::progress::{chunked_upload, ProgressReporter};

/// A request ready to be sent, independent of any HTTP library.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Text form fields, in order.
    pub fields: Vec<(String, String)>,
    /// File parts as (field name, file).
    pub files: Vec<(String, AudioFile)>,
}

impl OutgoingRequest {
    /// A bodyless GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            fields: Vec::new(),
            files: Vec::new(),
        }
    }

    /// An empty multipart POST.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    /// Returns the value of a text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the file sent under a field name.
    pub fn file(&self, name: &str) -> Option<&AudioFile> {
        self.files.iter().find(|(k, _)| k == name).map(|(_, f)| f)
    }

    /// Total bytes of all file parts.
    pub fn upload_size(&self) -> u64 {
        self.files.iter().map(|(_, f)| f.len()).sum()
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends prepared requests.
///
/// Implementations must advance `progress` as upload bytes are consumed and
/// must map failures onto the client's [`FailureKind`]s.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and reads the complete response.
    async fn execute(
        &self,
        request: OutgoingRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse>;

    /// Fetches `url` into `dest`, returning the number of bytes written.
    ///
    /// The default buffers the whole body; streaming transports override it.
    async fn download(&self, url: &str, dest: &Path, progress: ProgressReporter) -> Result<u64> {
        let response = self
            .execute(OutgoingRequest::get(url), ProgressReporter::disabled())
            .await?;
        if !response.is_success() {
            return Err(ClientError::http_status(response.status, response.body_text()));
        }
        tokio::fs::write(dest, &response.body).await.map_err(|e| {
            ClientError::local_io(format!("Failed to write {}", dest.display()), e)
        })?;
        let len = response.body.len() as u64;
        progress.observe(len, Some(len));
        Ok(len)
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    pub(crate) client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a fresh connection pool.
    ///
    /// No reqwest-level timeout is set; the processing client enforces its
    /// own ceilings around every call.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("odoremover-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ClientError::with_source(
                    FailureKind::InvalidRequest,
                    "Failed to create HTTP client",
                    e,
                )
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_form(request: &OutgoingRequest, progress: &ProgressReporter) -> Result<Form> {
        let mut form = Form::new();
        for (name, file) in &request.files {
            let body = reqwest::Body::wrap_stream(chunked_upload(
                file.shared_bytes(),
                progress.clone(),
            ));
            let part = Part::stream_with_length(body, file.len())
                .file_name(file.name.clone())
                .mime_str(&file.mime)
                .map_err(|e| {
                    ClientError::with_source(
                        FailureKind::InvalidRequest,
                        format!("Invalid MIME type {} for {}", file.mime, file.name),
                        e,
                    )
                })?;
            form = form.part(name.clone(), part);
        }
        for (name, value) in &request.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }
}

/// Maps a reqwest failure onto the client's taxonomy.
pub(crate) fn map_reqwest_error(url: &str, error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::with_source(
            FailureKind::Timeout,
            format!("Request to {} timed out", url),
            error,
        )
    } else if error.is_builder() {
        ClientError::with_source(
            FailureKind::InvalidRequest,
            format!("Could not build request for {}", url),
            error,
        )
    } else {
        ClientError::network(url, error)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: OutgoingRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => {
                let form = Self::build_form(&request, &progress)?;
                self.client.post(&request.url).multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn download(&self, url: &str, dest: &Path, progress: ProgressReporter) -> Result<u64> {
        self.stream_to_file(url, dest, progress).await
    }
}

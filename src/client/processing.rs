//! The processing client.
//!
//! Turns a [`ProcessingRequest`] into one HTTP call against the configured
//! backend and resolves it to a [`ProcessingResult`] or a [`ClientError`].
//! The client holds only the immutable configuration and a transport; every
//! submission is independent.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::{ClientError, FailureKind, Result};
use crate::types::{
    HealthStatus, Method, Operation, ProcessingRequest, ProcessingResult, DOWNLOAD_SEGMENT,
    FILE_FIELD, JOIN_FILE_FIELD,
};

use super::cancel::CancelToken;
use super::progress::{ProgressCallback, ProgressReporter};
use super::transport::{HttpTransport, OutgoingRequest, Transport, TransportResponse};

/// Client for the audio processing backend.
///
/// Cheap to clone; clones share the configuration and connection pool.
#[derive(Clone)]
pub struct ProcessingClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ProcessingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProcessingClient {
    /// Creates a client that talks HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over a custom transport.
    ///
    /// The base URL is normalised here, so configs built as struct literals
    /// or deserialised from files behave like ones from `with_base_url`.
    pub fn with_transport(mut config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.base_url = crate::config::normalize_base_url(&config.base_url);
        if let Some(reason) = config.validate() {
            return Err(ClientError::invalid_request(format!(
                "Invalid client configuration: {}",
                reason
            )));
        }
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// Builds a client for the first candidate base URL whose `/health`
    /// answers.
    ///
    /// The choice is made once; the returned client never switches.
    pub async fn discover(config: ClientConfig, candidates: &[String]) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        Self::discover_with(config, candidates, transport).await
    }

    /// [`discover`](Self::discover) over a custom transport.
    pub async fn discover_with(
        config: ClientConfig,
        candidates: &[String],
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let mut last_error = None;
        for base in candidates {
            let candidate = ClientConfig {
                base_url: crate::config::normalize_base_url(base),
                ..config.clone()
            };
            let client = match Self::with_transport(candidate, Arc::clone(&transport)) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(base_url = %base, error = %e, "skipping candidate");
                    last_error = Some(e);
                    continue;
                }
            };
            match client.health().await {
                Ok(_) => {
                    tracing::info!(base_url = %client.base_url(), "backend discovered");
                    return Ok(client);
                }
                Err(e) => {
                    tracing::warn!(base_url = %base, error = %e, "health probe failed");
                    last_error = Some(e);
                }
            }
        }

        let mut error = ClientError::new(
            FailureKind::Network,
            format!("Backend not accessible at any of {:?}", candidates),
        );
        if let Some(cause) = last_error {
            error.source = Some(Box::new(cause));
        }
        Err(error)
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the backend base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Submits a request and waits for the backend's answer.
    ///
    /// `on_progress` receives upload percentages; nothing is delivered after
    /// this call returns. Every operation, `HealthCheck` included, is bounded
    /// by the request ceiling; only [`health`](Self::health) uses the shorter
    /// probe ceiling.
    pub async fn submit(
        &self,
        request: ProcessingRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ProcessingResult> {
        self.submit_inner(request, on_progress, None).await
    }

    /// Like [`submit`](Self::submit), failing with `Cancelled` as soon as
    /// `cancel` fires. The in-flight transport call is dropped; a token that
    /// is already cancelled fails before anything is sent.
    pub async fn submit_cancellable(
        &self,
        request: ProcessingRequest,
        on_progress: Option<ProgressCallback>,
        cancel: &CancelToken,
    ) -> Result<ProcessingResult> {
        self.submit_inner(request, on_progress, Some(cancel)).await
    }

    async fn submit_inner(
        &self,
        request: ProcessingRequest,
        on_progress: Option<ProgressCallback>,
        cancel: Option<&CancelToken>,
    ) -> Result<ProcessingResult> {
        request.validate()?;

        let operation = request.operation;
        let total = Some(request.upload_size()).filter(|&n| n > 0);
        let reporter = ProgressReporter::new(on_progress, total);
        let outgoing = self.prepare(request);
        let ceiling = self.config.request_timeout();

        tracing::debug!(
            operation = %operation,
            method = outgoing.method.as_str(),
            url = %outgoing.url,
            bytes = outgoing.upload_size(),
            "submitting"
        );

        let outcome = self.run(outgoing, reporter, ceiling, cancel).await;
        let result = outcome.and_then(|response| {
            let payload = parse_object(&response)?;
            Ok(ProcessingResult::from_payload(payload))
        });

        match &result {
            Ok(result) => tracing::info!(
                operation = %operation,
                download = ?result.download_reference,
                "submission complete"
            ),
            Err(e) => tracing::warn!(operation = %operation, error = %e, "submission failed"),
        }
        result
    }

    /// Probes `GET /health`.
    pub async fn health(&self) -> Result<HealthStatus> {
        let outgoing = OutgoingRequest::get(self.config.endpoint(Operation::HealthCheck.path()));
        let response = self
            .run(
                outgoing,
                ProgressReporter::disabled(),
                self.config.health_timeout(),
                None,
            )
            .await?;
        let payload = parse_object(&response)?;
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| ClientError::serialization(response.body_text(), e))
    }

    /// Fetches playback metadata for a stored file from `GET /play/{file_id}`.
    pub async fn play_info(&self, file_id: &str) -> Result<Value> {
        let outgoing = OutgoingRequest::get(self.config.endpoint(&format!("/play/{}", file_id)));
        let response = self
            .run(
                outgoing,
                ProgressReporter::disabled(),
                self.config.request_timeout(),
                None,
            )
            .await?;
        parse_object(&response).map(Value::Object)
    }

    /// Builds the URL a processed file can be fetched from.
    ///
    /// Pure string construction; the reference is not checked.
    pub fn resolve_download_url(&self, reference: &str) -> String {
        format!("{}{}{}", self.config.base_url, DOWNLOAD_SEGMENT, reference)
    }

    /// Lays a request out as form fields and file parts.
    fn prepare(&self, request: ProcessingRequest) -> OutgoingRequest {
        let url = self.config.endpoint(request.operation.path());
        let mut outgoing = match request.operation.method() {
            Method::Get => OutgoingRequest::get(url),
            Method::Post => OutgoingRequest::post(url),
        };
        if let Some(file) = request.file {
            outgoing.files.push((FILE_FIELD.to_string(), file));
        }
        if let Some(join_file) = request.join_file {
            outgoing.files.push((JOIN_FILE_FIELD.to_string(), join_file));
        }
        outgoing.fields = request
            .params
            .into_iter()
            .map(|(key, value)| (key, value.to_form_value()))
            .collect();
        outgoing
    }

    /// Runs one transport call under the ceiling and the optional token,
    /// then closes the reporter.
    async fn run(
        &self,
        outgoing: OutgoingRequest,
        reporter: ProgressReporter,
        ceiling: Duration,
        cancel: Option<&CancelToken>,
    ) -> Result<TransportResponse> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            reporter.close();
            return Err(ClientError::cancelled());
        }

        let call = tokio::time::timeout(ceiling, self.transport.execute(outgoing, reporter.clone()));

        let outcome = tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => Err(ClientError::cancelled()),
            timed = call => match timed {
                Ok(outcome) => outcome,
                Err(_) => Err(ClientError::timeout(ceiling.as_secs())),
            },
        };
        reporter.close();

        let response = outcome?;
        if !response.is_success() {
            return Err(ClientError::http_status(response.status, response.body_text()));
        }
        Ok(response)
    }
}

async fn wait_cancelled(cancel: Option<&CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Parses a response body that must be a JSON object.
fn parse_object(response: &TransportResponse) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_slice(&response.body)
        .map_err(|e| ClientError::serialization(response.body_text(), e))?;
    match value {
        Value::Object(map) => Ok(map),
        other => {
            let e = <serde_json::Error as serde::de::Error>::custom(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ));
            Err(ClientError::serialization(response.body_text(), e))
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFile;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed response.
    struct FixedTransport {
        status: u16,
        body: String,
        seen: Mutex<Vec<OutgoingRequest>>,
    }

    impl FixedTransport {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn execute(
            &self,
            request: OutgoingRequest,
            progress: ProgressReporter,
        ) -> Result<TransportResponse> {
            let total = request.upload_size();
            progress.advance(total / 2);
            progress.advance(total - total / 2);
            self.seen.lock().unwrap().push(request);
            Ok(TransportResponse {
                status: self.status,
                body: self.body.clone().into_bytes(),
            })
        }
    }

    /// Echoes the uploaded file name back after a per-file delay.
    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn execute(
            &self,
            request: OutgoingRequest,
            progress: ProgressReporter,
        ) -> Result<TransportResponse> {
            let file = request.file(FILE_FIELD).cloned().unwrap();
            let delay = if file.name.starts_with("slow") { 50 } else { 5 };
            progress.advance(file.len());
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let body = serde_json::json!({
                "status": "success",
                "download": format!("processed_{}", file.name),
                "size": file.len(),
            });
            Ok(TransportResponse {
                status: 200,
                body: body.to_string().into_bytes(),
            })
        }
    }

    /// Reports half the upload, schedules a late event, then never answers.
    struct HangingTransport;

    #[async_trait]
    impl Transport for HangingTransport {
        async fn execute(
            &self,
            request: OutgoingRequest,
            progress: ProgressReporter,
        ) -> Result<TransportResponse> {
            let total = request.upload_size();
            progress.advance(total / 2);
            let late = progress.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(400)).await;
                late.advance(total);
            });
            std::future::pending().await
        }
    }

    fn wav(name: &str, len: usize) -> AudioFile {
        AudioFile::new(name, "audio/wav", vec![1u8; len])
    }

    fn client_with(transport: Arc<dyn Transport>) -> ProcessingClient {
        ProcessingClient::with_transport(ClientConfig::with_base_url("http://localhost:5000"), transport)
            .unwrap()
    }

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Arc::new(move |p: u8| sink.lock().unwrap().push(p)), seen)
    }

    #[tokio::test]
    async fn each_operation_hits_its_path_once() {
        let cases = vec![
            (ProcessingRequest::remove_vocals(wav("a.wav", 10)), "/remove-vocals"),
            (
                ProcessingRequest::adjust_pitch_tempo(wav("a.wav", 10), 2.0, 1.0),
                "/adjust-pitch-tempo",
            ),
            (ProcessingRequest::convert_format(wav("a.wav", 10), "mp3"), "/convert-format"),
            (ProcessingRequest::cut(wav("a.wav", 10), Some(1.0), Some(2.5)), "/cut-join-audio"),
            (ProcessingRequest::join(wav("a.wav", 10), wav("b.wav", 4)), "/cut-join-audio"),
            (ProcessingRequest::reduce_noise(wav("a.wav", 10), 0.5), "/reduce-noise"),
            (ProcessingRequest::health_check(), "/health"),
        ];

        for (request, path) in cases {
            let transport = FixedTransport::new(200, r#"{"status": "success"}"#);
            let client = client_with(transport.clone());
            client.submit(request, None).await.unwrap();

            let seen = transport.seen.lock().unwrap();
            assert_eq!(seen.len(), 1, "{}", path);
            assert_eq!(seen[0].url, format!("http://localhost:5000{}", path));
        }
    }

    #[tokio::test]
    async fn form_fields_are_stringified_in_order() {
        let transport = FixedTransport::new(200, r#"{"status": "success"}"#);
        let client = client_with(transport.clone());
        let request = ProcessingRequest::adjust_pitch_tempo(wav("song.wav", 10), -3.0, 1.5)
            .with_param("preserve_formants", true);
        client.submit(request, None).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(
            sent.fields,
            vec![
                ("pitch_shift".to_string(), "-3".to_string()),
                ("tempo_change".to_string(), "1.5".to_string()),
                ("preserve_formants".to_string(), "true".to_string()),
            ]
        );
        assert_eq!(sent.file(FILE_FIELD).unwrap().name, "song.wav");
        assert!(sent.file(JOIN_FILE_FIELD).is_none());
    }

    #[tokio::test]
    async fn join_sends_both_files() {
        let transport = FixedTransport::new(200, r#"{"status": "success"}"#);
        let client = client_with(transport.clone());
        client
            .submit(ProcessingRequest::join(wav("a.wav", 10), wav("b.wav", 6)), None)
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].field("operation"), Some("join"));
        assert_eq!(seen[0].file(JOIN_FILE_FIELD).unwrap().name, "b.wav");
        assert_eq!(seen[0].upload_size(), 16);
    }

    #[tokio::test]
    async fn success_resolves_download_url() {
        let transport = FixedTransport::new(200, r#"{"status": "success", "download": "abc.wav"}"#);
        let client = client_with(transport);
        let result = client
            .submit(ProcessingRequest::remove_vocals(wav("a.wav", 10)), None)
            .await
            .unwrap();

        assert!(result.is_success());
        let reference = result.download_reference.as_deref().unwrap();
        assert_eq!(
            client.resolve_download_url(reference),
            "http://localhost:5000/download/abc.wav"
        );
    }

    #[tokio::test]
    async fn progress_reported_and_bounded() {
        let transport = FixedTransport::new(200, r#"{"status": "success"}"#);
        let client = client_with(transport);
        let (callback, seen) = recorder();
        client
            .submit(ProcessingRequest::reduce_noise(wav("a.wav", 200), 0.3), Some(callback))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), [50, 100]);
    }

    #[tokio::test]
    async fn http_500_keeps_status() {
        let transport = FixedTransport::new(500, r#"{"success": false, "error": "decode failed"}"#);
        let client = client_with(transport);
        let err = client
            .submit(ProcessingRequest::remove_vocals(wav("a.wav", 10)), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind, FailureKind::HttpStatus);
        assert_eq!(err.status, Some(500));
        assert!(err.message.contains("decode failed"));
    }

    #[tokio::test]
    async fn non_json_body_is_serialization_failure() {
        for body in ["<html>502 Bad Gateway</html>", "[1, 2, 3]", ""] {
            let client = client_with(FixedTransport::new(200, body));
            let err = client
                .submit(ProcessingRequest::remove_vocals(wav("a.wav", 10)), None)
                .await
                .unwrap_err();
            assert_eq!(err.kind, FailureKind::Serialization, "{:?}", body);
        }
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_transport() {
        let transport = FixedTransport::new(200, "{}");
        let client = client_with(transport.clone());
        let empty = ProcessingRequest::remove_vocals(wav("empty.wav", 0));
        let err = client.submit(empty, None).await.unwrap_err();

        assert_eq!(err.kind, FailureKind::InvalidRequest);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_stops_progress() {
        let client = client_with(Arc::new(HangingTransport));
        let (callback, seen) = recorder();
        let err = client
            .submit(ProcessingRequest::remove_vocals(wav("a.wav", 100)), Some(callback))
            .await
            .unwrap_err();

        assert_eq!(err.kind, FailureKind::Timeout);
        assert!(err.message.contains("300"));

        // The transport's late event fires at t=400s.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(*seen.lock().unwrap(), [50]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_in_flight_submission() {
        let client = client_with(Arc::new(HangingTransport));
        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = client
            .submit_cancellable(ProcessingRequest::remove_vocals(wav("a.wav", 10)), None, &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind, FailureKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(300));
    }

    #[tokio::test]
    async fn cancelled_token_stops_submission_before_sending() {
        let transport = FixedTransport::new(200, r#"{"status": "success"}"#);
        let client = client_with(transport.clone());
        let token = CancelToken::new();
        token.cancel();

        for _ in 0..50 {
            let (callback, seen) = recorder();
            let err = client
                .submit_cancellable(
                    ProcessingRequest::remove_vocals(wav("a.wav", 10)),
                    Some(callback),
                    &token,
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind, FailureKind::Cancelled);
            assert!(seen.lock().unwrap().is_empty());
        }
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_health_check_uses_request_ceiling() {
        let client = client_with(Arc::new(HangingTransport));
        let started = tokio::time::Instant::now();
        let err = client
            .submit(ProcessingRequest::health_check(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind, FailureKind::Timeout);
        assert!(err.message.contains("300"));
        assert!(started.elapsed() >= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn deserialized_config_with_trailing_slash_is_normalized() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "base_url": "http://host:5000/",
            "request_timeout_sec": 300,
            "health_timeout_sec": 10,
            "download_dir": null
        }))
        .unwrap();
        let transport = FixedTransport::new(200, r#"{"status": "success"}"#);
        let client = ProcessingClient::with_transport(config, transport.clone()).unwrap();

        assert_eq!(client.base_url(), "http://host:5000");
        assert_eq!(
            client.resolve_download_url("abc.wav"),
            "http://host:5000/download/abc.wav"
        );

        client
            .submit(ProcessingRequest::remove_vocals(wav("a.wav", 10)), None)
            .await
            .unwrap();
        assert_eq!(
            transport.seen.lock().unwrap()[0].url,
            "http://host:5000/remove-vocals"
        );
    }

    #[tokio::test]
    async fn concurrent_submissions_are_independent() {
        let client = client_with(Arc::new(EchoTransport));
        let (slow_cb, slow_seen) = recorder();
        let (fast_cb, fast_seen) = recorder();

        let (slow, fast) = tokio::join!(
            client.submit(ProcessingRequest::remove_vocals(wav("slow.wav", 300)), Some(slow_cb)),
            client.submit(ProcessingRequest::remove_vocals(wav("fast.wav", 20)), Some(fast_cb)),
        );

        let slow = slow.unwrap();
        let fast = fast.unwrap();
        assert_eq!(slow.download_reference.as_deref(), Some("processed_slow.wav"));
        assert_eq!(fast.download_reference.as_deref(), Some("processed_fast.wav"));
        assert_eq!(slow.payload["size"], 300);
        assert_eq!(fast.payload["size"], 20);
        assert_eq!(*slow_seen.lock().unwrap(), [100]);
        assert_eq!(*fast_seen.lock().unwrap(), [100]);
    }

    #[tokio::test]
    async fn health_parses_gateway_body() {
        let transport = FixedTransport::new(
            200,
            r#"{"gateway": "healthy", "services": {"converter": {"status": "ready"}}}"#,
        );
        let client = client_with(transport.clone());
        let health = client.health().await.unwrap();

        assert!(health.is_healthy());
        assert_eq!(health.service_names(), ["converter"]);
        assert_eq!(transport.seen.lock().unwrap()[0].method, Method::Get);
    }

    #[tokio::test]
    async fn discover_picks_first_healthy_candidate() {
        struct OnlySecondUp;

        #[async_trait]
        impl Transport for OnlySecondUp {
            async fn execute(
                &self,
                request: OutgoingRequest,
                _progress: ProgressReporter,
            ) -> Result<TransportResponse> {
                if request.url.starts_with("http://second:5000") {
                    Ok(TransportResponse {
                        status: 200,
                        body: br#"{"status": "ok"}"#.to_vec(),
                    })
                } else {
                    Err(ClientError::new(FailureKind::Network, "connection refused"))
                }
            }
        }

        let candidates = vec![
            "http://first:5000".to_string(),
            "http://second:5000/".to_string(),
        ];
        let client =
            ProcessingClient::discover_with(ClientConfig::new(), &candidates, Arc::new(OnlySecondUp))
                .await
                .unwrap();
        assert_eq!(client.base_url(), "http://second:5000");

        let none = ProcessingClient::discover_with(
            ClientConfig::new(),
            &candidates[..1],
            Arc::new(OnlySecondUp),
        )
        .await
        .unwrap_err();
        assert_eq!(none.kind, FailureKind::Network);
    }

    #[tokio::test]
    async fn play_info_returns_object() {
        let transport = FixedTransport::new(200, r#"{"file_id": "x1", "duration": 12.5}"#);
        let client = client_with(transport.clone());
        let info = client.play_info("x1").await.unwrap();

        assert_eq!(info["duration"], 12.5);
        assert_eq!(
            transport.seen.lock().unwrap()[0].url,
            "http://localhost:5000/play/x1"
        );
    }

    #[test]
    fn invalid_config_rejected() {
        let err = ProcessingClient::with_transport(
            ClientConfig::with_base_url("localhost:5000"),
            FixedTransport::new(200, "{}"),
        )
        .unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidRequest);
    }
}

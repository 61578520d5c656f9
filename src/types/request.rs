//! ProcessingRequest type and its upload payloads.
//!
//! A request pairs an [`Operation`] with the file to upload and an ordered
//! list of form parameters. Parameter keys are not checked against the
//! operation; the backend validates them.

use std::path::Path;
use std::sync::Arc;

use crate::error::{ClientError, Result};

use super::operation::Operation;

/// Form field name of the primary upload.
pub const FILE_FIELD: &str = "file";

/// Form field name of the second upload for joins.
pub const JOIN_FILE_FIELD: &str = "join_file";

/// An audio file held in memory, ready to upload.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioFile {
    /// File name sent in the multipart part.
    pub name: String,
    /// MIME type sent in the multipart part.
    pub mime: String,
    data: Arc<[u8]>,
}

impl AudioFile {
    /// Creates an AudioFile from bytes.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            name: name.into(),
            mime: mime.into(),
            data: Arc::from(data),
        }
    }

    /// Reads a file from disk, guessing the MIME type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            ClientError::local_io(format!("Failed to read {}", path.display()), e)
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let mime = mime_for_path(path);
        Ok(Self::new(name, mime, data))
    }

    /// Returns the file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns a shared handle to the file contents.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Returns the size in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns true if the file has no content.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for AudioFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Guesses an audio MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "webm" => "audio/webm",
        "aiff" | "aif" => "audio/aiff",
        _ => "application/octet-stream",
    }
}

/// A scalar form parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    /// Renders the value as a form field.
    ///
    /// Numbers use their shortest decimal form: `1.0` is sent as `1`,
    /// `0.5` as `0.5`. Non-finite and huge floats keep Rust's rendering
    /// (`inf`, `NaN`, no exponent), not JavaScript's `Infinity`/`1e+21`.
    pub fn to_form_value(&self) -> String {
        match self {
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Bool(v) => v.to_string(),
            ParamValue::Text(v) => v.clone(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// The two variants behind the cut/join endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutJoinMode {
    Cut,
    Join,
}

impl CutJoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CutJoinMode::Cut => "cut",
            CutJoinMode::Join => "join",
        }
    }
}

/// A request for backend processing.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    /// Which backend action to run.
    pub operation: Operation,

    /// Primary upload. None only for health checks.
    pub file: Option<AudioFile>,

    /// Second upload, only for joins.
    pub join_file: Option<AudioFile>,

    /// Form parameters in submission order.
    pub params: Vec<(String, ParamValue)>,
}

impl ProcessingRequest {
    /// Creates a request with no parameters.
    pub fn new(operation: Operation, file: Option<AudioFile>) -> Self {
        Self {
            operation,
            file,
            join_file: None,
            params: Vec::new(),
        }
    }

    /// Vocal removal.
    pub fn remove_vocals(file: AudioFile) -> Self {
        Self::new(Operation::RemoveVocals, Some(file))
    }

    /// Pitch shift (semitones) and tempo change (rate, 1 = unchanged).
    pub fn adjust_pitch_tempo(file: AudioFile, pitch_shift: f64, tempo_change: f64) -> Self {
        Self::new(Operation::AdjustPitchTempo, Some(file))
            .with_param("pitch_shift", pitch_shift)
            .with_param("tempo_change", tempo_change)
    }

    /// Format conversion, e.g. `"mp3"` or `"flac"`.
    pub fn convert_format(file: AudioFile, target_format: impl Into<String>) -> Self {
        let target_format: String = target_format.into();
        Self::new(Operation::ConvertFormat, Some(file)).with_param("target_format", target_format)
    }

    /// Cut a range; unset bounds default to the file's start/end on the backend.
    pub fn cut(file: AudioFile, start_time: Option<f64>, end_time: Option<f64>) -> Self {
        let mut request = Self::new(Operation::CutJoinAudio, Some(file))
            .with_param("operation", CutJoinMode::Cut.as_str());
        if let Some(start) = start_time {
            request = request.with_param("start_time", start);
        }
        if let Some(end) = end_time {
            request = request.with_param("end_time", end);
        }
        request
    }

    /// Append `join_file` after `file`.
    pub fn join(file: AudioFile, join_file: AudioFile) -> Self {
        let mut request = Self::new(Operation::CutJoinAudio, Some(file))
            .with_param("operation", CutJoinMode::Join.as_str());
        request.join_file = Some(join_file);
        request
    }

    /// Noise reduction with strength in [0, 1].
    pub fn reduce_noise(file: AudioFile, strength: f64) -> Self {
        Self::new(Operation::ReduceNoise, Some(file))
            .with_param("noise_reduction_strength", strength)
    }

    /// Backend availability probe.
    pub fn health_check() -> Self {
        Self::new(Operation::HealthCheck, None)
    }

    /// Appends a form parameter. Keys are sent verbatim.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Returns the value of a parameter, if set.
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the cut/join variant, if this is a cut/join request.
    pub fn cut_join_mode(&self) -> Option<CutJoinMode> {
        if self.operation != Operation::CutJoinAudio {
            return None;
        }
        match self.param("operation") {
            Some(ParamValue::Text(mode)) if mode == "join" => Some(CutJoinMode::Join),
            _ => Some(CutJoinMode::Cut),
        }
    }

    /// Total bytes of all uploads.
    pub fn upload_size(&self) -> u64 {
        self.file.as_ref().map_or(0, AudioFile::len)
            + self.join_file.as_ref().map_or(0, AudioFile::len)
    }

    /// Checks the structural invariants of the request.
    ///
    /// Parameters are deliberately left unchecked.
    pub fn validate(&self) -> Result<()> {
        match (&self.file, self.operation.requires_file()) {
            (None, true) => {
                return Err(ClientError::invalid_request(format!(
                    "{} requires a file",
                    self.operation
                )))
            }
            (Some(_), false) => {
                return Err(ClientError::invalid_request(format!(
                    "{} does not accept a file",
                    self.operation
                )))
            }
            (Some(file), true) if file.is_empty() => {
                return Err(ClientError::invalid_request(format!(
                    "File {} is empty",
                    file.name
                )))
            }
            _ => {}
        }

        if self.cut_join_mode() == Some(CutJoinMode::Join) && self.join_file.is_none() {
            return Err(ClientError::invalid_request(
                "The join variant of cut_join_audio requires a join_file",
            ));
        }

        if let Some(join_file) = &self.join_file {
            if self.cut_join_mode() != Some(CutJoinMode::Join) {
                return Err(ClientError::invalid_request(
                    "join_file is only accepted by the join variant of cut_join_audio",
                ));
            }
            if join_file.is_empty() {
                return Err(ClientError::invalid_request(format!(
                    "Join file {} is empty",
                    join_file.name
                )));
            }
        }

        Ok(())
    }
}

//! Operation selector for backend processing requests.

use serde::{Deserialize, Serialize};

/// Audio-processing actions the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Center-channel vocal removal.
    RemoveVocals,
    /// Pitch shift in semitones and tempo stretch.
    AdjustPitchTempo,
    /// Transcode to another container/codec.
    ConvertFormat,
    /// Trim a range out of a file, or append a second file.
    CutJoinAudio,
    /// Spectral noise reduction.
    ReduceNoise,
    /// Backend availability probe.
    HealthCheck,
}

/// Wire method for an operation's endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl Operation {
    /// All operations, in the order the backend documents them.
    pub const ALL: [Operation; 6] = [
        Operation::RemoveVocals,
        Operation::AdjustPitchTempo,
        Operation::ConvertFormat,
        Operation::CutJoinAudio,
        Operation::ReduceNoise,
        Operation::HealthCheck,
    ];

    /// Returns the string representation of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::RemoveVocals => "remove_vocals",
            Operation::AdjustPitchTempo => "adjust_pitch_tempo",
            Operation::ConvertFormat => "convert_format",
            Operation::CutJoinAudio => "cut_join_audio",
            Operation::ReduceNoise => "reduce_noise",
            Operation::HealthCheck => "health_check",
        }
    }

    /// Parses an operation from a string. Accepts snake_case or kebab-case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "remove_vocals" => Some(Operation::RemoveVocals),
            "adjust_pitch_tempo" | "pitch_tempo" => Some(Operation::AdjustPitchTempo),
            "convert_format" | "convert" => Some(Operation::ConvertFormat),
            "cut_join_audio" | "cut_join" => Some(Operation::CutJoinAudio),
            "reduce_noise" => Some(Operation::ReduceNoise),
            "health_check" | "health" => Some(Operation::HealthCheck),
            _ => None,
        }
    }

    /// Returns the endpoint path relative to the base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::RemoveVocals => "/remove-vocals",
            Operation::AdjustPitchTempo => "/adjust-pitch-tempo",
            Operation::ConvertFormat => "/convert-format",
            Operation::CutJoinAudio => "/cut-join-audio",
            Operation::ReduceNoise => "/reduce-noise",
            Operation::HealthCheck => "/health",
        }
    }

    /// Returns the HTTP method used for this operation.
    pub fn method(&self) -> Method {
        match self {
            Operation::HealthCheck => Method::Get,
            _ => Method::Post,
        }
    }

    /// Returns true if the operation uploads a primary file.
    pub fn requires_file(&self) -> bool {
        !matches!(self, Operation::HealthCheck)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Client configuration module.
//!
//! Holds the backend base URL and the request ceilings. A config is built
//! once at startup (defaults, then environment, then CLI flags) and handed
//! to every client; it never changes afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Backend address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Port the audio gateway listens on in every known deployment.
pub const DEFAULT_API_PORT: u16 = 5000;

/// Ceiling for processing requests. Backend DSP on a full song takes minutes.
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 300;

/// Ceiling for health probes.
pub const DEFAULT_HEALTH_TIMEOUT_SEC: u64 = 10;

/// Runtime configuration for the processing client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the processing backend, without a trailing slash.
    pub base_url: String,

    /// Seconds to wait for a processing request to complete.
    pub request_timeout_sec: u64,

    /// Seconds to wait for a health probe.
    pub health_timeout_sec: u64,

    /// Directory where downloaded results are written.
    /// If None, uses the platform download directory.
    pub download_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Creates a new ClientConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ClientConfig pointing at the given base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Self::default()
        }
    }

    /// Maps an explicit deployment host to the gateway address.
    ///
    /// Local hosts always talk plain HTTP to `localhost:5000`; any other host
    /// keeps its scheme and gets the gateway port appended.
    pub fn for_host(scheme: &str, host: &str) -> Self {
        let base_url = match host {
            "localhost" | "127.0.0.1" => DEFAULT_BASE_URL.to_string(),
            _ => format!("{}://{}:{}", scheme, host, DEFAULT_API_PORT),
        };
        Self::with_base_url(base_url)
    }

    /// Creates a ClientConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `ODOREMOVER_API_BASE` - Backend base URL
    /// - `ODOREMOVER_TIMEOUT_SEC` - Processing request ceiling in seconds
    /// - `ODOREMOVER_HEALTH_TIMEOUT_SEC` - Health probe ceiling in seconds
    /// - `ODOREMOVER_DOWNLOAD_DIR` - Directory for downloaded results
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("ODOREMOVER_API_BASE") {
            if !base.trim().is_empty() {
                config.base_url = normalize_base_url(&base);
            }
        }

        if let Ok(timeout_str) = std::env::var("ODOREMOVER_TIMEOUT_SEC") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                if timeout > 0 {
                    config.request_timeout_sec = timeout;
                }
            }
        }

        if let Ok(timeout_str) = std::env::var("ODOREMOVER_HEALTH_TIMEOUT_SEC") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                if timeout > 0 {
                    config.health_timeout_sec = timeout;
                }
            }
        }

        if let Ok(path) = std::env::var("ODOREMOVER_DOWNLOAD_DIR") {
            config.download_dir = Some(PathBuf::from(path));
        }

        config
    }

    /// Returns the processing request ceiling.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    /// Returns the health probe ceiling.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_sec)
    }

    /// Returns the effective download directory, using platform defaults if not specified.
    pub fn effective_download_dir(&self) -> PathBuf {
        if let Some(ref path) = self.download_dir {
            path.clone()
        } else {
            default_download_dir()
        }
    }

    /// Joins an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        match reqwest::Url::parse(&self.base_url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Some(format!(
                        "base_url must use http or https, got {}",
                        url.scheme()
                    ));
                }
                if url.host_str().is_none() {
                    return Some(format!("base_url has no host: {}", self.base_url));
                }
            }
            Err(e) => return Some(format!("invalid base_url {}: {}", self.base_url, e)),
        }

        if self.request_timeout_sec == 0 {
            return Some("request_timeout_sec must be > 0".to_string());
        }
        if self.health_timeout_sec == 0 {
            return Some("health_timeout_sec must be > 0".to_string());
        }

        None
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SEC,
            health_timeout_sec: DEFAULT_HEALTH_TIMEOUT_SEC,
            download_dir: None,
        }
    }
}

/// Strips whitespace and trailing slashes so paths can be appended verbatim.
pub fn normalize_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Returns the platform-specific default download path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Downloads/odoremover
/// - Linux: $XDG_DOWNLOAD_DIR/odoremover (usually ~/Downloads/odoremover)
/// - Windows: C:\Users\<user>\Downloads\odoremover
fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|d| d.join("odoremover")))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.health_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let config = ClientConfig::with_base_url("https://api.example.com/audio/ ");
        assert_eq!(config.base_url, "https://api.example.com/audio");
        assert_eq!(
            config.endpoint("/remove-vocals"),
            "https://api.example.com/audio/remove-vocals"
        );
    }

    #[test]
    fn for_host_maps_local_and_deployed() {
        assert_eq!(
            ClientConfig::for_host("https", "localhost").base_url,
            "http://localhost:5000"
        );
        assert_eq!(
            ClientConfig::for_host("https", "odoremover.app").base_url,
            "https://odoremover.app:5000"
        );
    }

    #[test]
    fn config_validation() {
        let mut config = ClientConfig::with_base_url("ftp://files.example.com");
        assert!(config.validate().is_some());

        config = ClientConfig::with_base_url("not a url");
        assert!(config.validate().is_some());

        config = ClientConfig::new();
        config.request_timeout_sec = 0;
        assert!(config.validate().is_some());

        config.request_timeout_sec = 60;
        assert!(config.validate().is_none());
    }

    #[test]
    fn effective_download_dir_is_valid() {
        let config = ClientConfig::new();
        assert!(!config.effective_download_dir().as_os_str().is_empty());

        let config = ClientConfig {
            download_dir: Some(PathBuf::from("/tmp/out")),
            ..ClientConfig::new()
        };
        assert_eq!(config.effective_download_dir(), PathBuf::from("/tmp/out"));
    }
}

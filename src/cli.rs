//! CLI argument parser.
//!
//! One subcommand per backend operation, plus `health`, `url` and
//! `download`. Processing subcommands share [`ProcessArgs`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ClientConfig;
use crate::types::ParamValue;

/// odoremover: send audio to the Odoremover processing backend
#[derive(Parser, Debug)]
#[command(name = "odoremover")]
#[command(about = "Vocal removal, pitch/tempo, conversion, cut/join and noise reduction via the Odoremover API")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides ODOREMOVER_API_BASE)
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Extra base URLs to probe, in order, when the first is unreachable
    #[arg(long = "fallback", global = true)]
    pub fallbacks: Vec<String>,

    /// Processing timeout in seconds (overrides ODOREMOVER_TIMEOUT_SEC)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove vocals from a song
    RemoveVocals {
        #[command(flatten)]
        args: ProcessArgs,
    },

    /// Shift pitch (semitones) and change tempo (rate)
    PitchTempo {
        #[command(flatten)]
        args: ProcessArgs,
        /// Pitch shift in semitones
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        pitch: f64,
        /// Tempo rate, 1.0 keeps the original speed
        #[arg(long, default_value = "1")]
        tempo: f64,
    },

    /// Convert to another audio format
    Convert {
        #[command(flatten)]
        args: ProcessArgs,
        /// Target format, e.g. mp3, wav, flac, ogg
        #[arg(short, long)]
        format: String,
    },

    /// Cut a time range out of a file
    Cut {
        #[command(flatten)]
        args: ProcessArgs,
        /// Range start in seconds
        #[arg(long)]
        start: Option<f64>,
        /// Range end in seconds
        #[arg(long)]
        end: Option<f64>,
    },

    /// Append a second file after the first
    Join {
        #[command(flatten)]
        args: ProcessArgs,
        /// File to append
        with: PathBuf,
    },

    /// Reduce background noise
    ReduceNoise {
        #[command(flatten)]
        args: ProcessArgs,
        /// Reduction strength between 0 and 1
        #[arg(long, default_value = "0.5")]
        strength: f64,
    },

    /// Check that the backend is up
    Health,

    /// Print the download URL for a result reference
    Url {
        /// Reference returned by a processing command
        reference: String,
    },

    /// Download a processed file
    Download {
        /// Reference returned by a processing command
        reference: String,
        /// Directory to write into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

/// Options shared by every processing subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Input audio file
    pub input: PathBuf,

    /// Extra form field sent verbatim, as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Directory to download the result into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print the result URL instead of downloading it
    #[arg(long)]
    pub no_download: bool,
}

impl ProcessArgs {
    /// Extra parameters as form values. Numbers stay numbers.
    pub fn extra_params(&self) -> Vec<(String, ParamValue)> {
        self.params
            .iter()
            .map(|(k, v)| {
                let value = match v.parse::<f64>() {
                    Ok(n) if n.is_finite() => ParamValue::Float(n),
                    _ => ParamValue::Text(v.clone()),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

/// Parses `key=value`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", s))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in {:?}", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Layers CLI overrides on top of an environment-derived config.
    pub fn apply_to(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(ref base) = self.api_base {
            config.base_url = crate::config::normalize_base_url(base);
        }
        if let Some(timeout) = self.timeout {
            if timeout > 0 {
                config.request_timeout_sec = timeout;
            }
        }
        config
    }

    /// Candidate base URLs: the configured one first, then fallbacks.
    pub fn candidates(&self, config: &ClientConfig) -> Vec<String> {
        std::iter::once(config.base_url.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }

    /// Returns the processing args if the subcommand uploads a file.
    pub fn process_args(&self) -> Option<&ProcessArgs> {
        match &self.command {
            Command::RemoveVocals { args }
            | Command::PitchTempo { args, .. }
            | Command::Convert { args, .. }
            | Command::Cut { args, .. }
            | Command::Join { args, .. }
            | Command::ReduceNoise { args, .. } => Some(args),
            Command::Health | Command::Url { .. } | Command::Download { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pitch_tempo_accepts_negative_pitch() {
        let cli = Cli::try_parse_from([
            "odoremover",
            "pitch-tempo",
            "song.wav",
            "--pitch",
            "-2",
            "--tempo",
            "1.25",
        ])
        .unwrap();
        match cli.command {
            Command::PitchTempo { pitch, tempo, ref args } => {
                assert_eq!(pitch, -2.0);
                assert_eq!(tempo, 1.25);
                assert_eq!(args.input, PathBuf::from("song.wav"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn params_parse_as_key_value() {
        let cli = Cli::try_parse_from([
            "odoremover",
            "remove-vocals",
            "a.mp3",
            "--param",
            "stems=2",
            "--param",
            "model=htdemucs",
        ])
        .unwrap();
        let args = cli.process_args().unwrap();
        assert_eq!(
            args.extra_params(),
            vec![
                ("stems".to_string(), ParamValue::Float(2.0)),
                ("model".to_string(), ParamValue::Text("htdemucs".to_string())),
            ]
        );

        assert!(Cli::try_parse_from(["odoremover", "remove-vocals", "a.mp3", "--param", "novalue"]).is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let cli = Cli::try_parse_from([
            "odoremover",
            "--api-base",
            "http://10.0.0.5:8000/",
            "--timeout",
            "60",
            "--fallback",
            "http://localhost:5000",
            "health",
        ])
        .unwrap();
        let config = cli.apply_to(ClientConfig::new());
        assert_eq!(config.base_url, "http://10.0.0.5:8000");
        assert_eq!(config.request_timeout_sec, 60);
        assert_eq!(
            cli.candidates(&config),
            ["http://10.0.0.5:8000", "http://localhost:5000"]
        );
        assert!(cli.process_args().is_none());
    }

    #[test]
    fn join_takes_second_file() {
        let cli = Cli::try_parse_from(["odoremover", "join", "intro.wav", "outro.wav", "--no-download"])
            .unwrap();
        match cli.command {
            Command::Join { ref with, ref args } => {
                assert_eq!(with, &PathBuf::from("outro.wav"));
                assert!(args.no_download);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

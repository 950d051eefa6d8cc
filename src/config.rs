//! Environment-driven configuration, validated before the engine starts

use crate::record::{RecordFormat, SentimentRange};
use crate::snapshot::PublishCadence;
use crate::window::{CumulativeWindow, SlidingWindow, WindowPolicy};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVariable(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Which windowing policy the aggregator runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowMode {
    Cumulative,
    Sliding { duration_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub window_mode: WindowMode,
    pub publish_cadence: PublishCadence,
    pub sentiment_range: SentimentRange,
    pub stream_path: PathBuf,
    pub stream_format: RecordFormat,
    pub rust_log: Option<String>,
}

impl Config {
    /// Read configuration from the environment. Any invalid combination is
    /// fatal here, before aggregation starts.
    ///
    /// Recognized variables: `WINDOW_MODE` (`cumulative`|`sliding`),
    /// `WINDOW_DURATION_SECS`, `PUBLISH_CADENCE` (`on_message`|`interval`),
    /// `PUBLISH_INTERVAL_SECS`, `SENTIMENT_MIN`, `SENTIMENT_MAX`,
    /// `STREAM_PATH`, `STREAM_FORMAT` (`jsonl`|`csv`), `RUST_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let window_mode = match env::var("WINDOW_MODE")
            .unwrap_or_else(|_| "cumulative".to_string())
            .to_lowercase()
            .as_str()
        {
            "cumulative" => WindowMode::Cumulative,
            "sliding" => {
                let raw = env::var("WINDOW_DURATION_SECS").map_err(|_| {
                    ConfigError::MissingVariable(
                        "WINDOW_DURATION_SECS (required when WINDOW_MODE=sliding)".to_string(),
                    )
                })?;
                let duration_secs: u64 = raw.parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "WINDOW_DURATION_SECS must be a positive integer, got '{}'",
                        raw
                    ))
                })?;
                if duration_secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "WINDOW_DURATION_SECS must be greater than zero".to_string(),
                    ));
                }
                WindowMode::Sliding { duration_secs }
            }
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "WINDOW_MODE must be 'cumulative' or 'sliding', got '{}'",
                    other
                )))
            }
        };

        let publish_cadence = match env::var("PUBLISH_CADENCE")
            .unwrap_or_else(|_| "on_message".to_string())
            .to_lowercase()
            .as_str()
        {
            "on_message" => PublishCadence::OnMessage,
            "interval" => {
                let raw = env::var("PUBLISH_INTERVAL_SECS").map_err(|_| {
                    ConfigError::MissingVariable(
                        "PUBLISH_INTERVAL_SECS (required when PUBLISH_CADENCE=interval)"
                            .to_string(),
                    )
                })?;
                let secs: f64 = raw.parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "PUBLISH_INTERVAL_SECS must be a positive number, got '{}'",
                        raw
                    ))
                })?;
                if !(secs > 0.0) {
                    return Err(ConfigError::InvalidValue(
                        "PUBLISH_INTERVAL_SECS must be greater than zero".to_string(),
                    ));
                }
                PublishCadence::Interval { secs }
            }
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "PUBLISH_CADENCE must be 'on_message' or 'interval', got '{}'",
                    other
                )))
            }
        };

        let min = parse_float_var("SENTIMENT_MIN", -1.0)?;
        let max = parse_float_var("SENTIMENT_MAX", 1.0)?;
        if min >= max {
            return Err(ConfigError::InvalidValue(format!(
                "SENTIMENT_MIN ({}) must be below SENTIMENT_MAX ({})",
                min, max
            )));
        }

        let stream_path = env::var("STREAM_PATH")
            .unwrap_or_else(|_| "streams/sentiment.jsonl".to_string())
            .into();

        let stream_format = match env::var("STREAM_FORMAT")
            .unwrap_or_else(|_| "jsonl".to_string())
            .to_lowercase()
            .as_str()
        {
            "jsonl" | "json" => RecordFormat::Jsonl,
            "csv" => RecordFormat::Csv,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "STREAM_FORMAT must be 'jsonl' or 'csv', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            window_mode,
            publish_cadence,
            sentiment_range: SentimentRange::new(min, max),
            stream_path,
            stream_format,
            rust_log: env::var("RUST_LOG").ok(),
        })
    }

    /// Build the window policy this configuration selects.
    pub fn window_policy(&self) -> Box<dyn WindowPolicy> {
        match self.window_mode {
            WindowMode::Cumulative => Box::new(CumulativeWindow::new()),
            WindowMode::Sliding { duration_secs } => Box::new(SlidingWindow::new(duration_secs)),
        }
    }
}

fn parse_float_var(name: &str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be a number, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

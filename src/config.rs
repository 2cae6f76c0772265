//! Configuration for the heartbeat monitor agent.

use crate::core::segmenter::{PeakHeight, SegmenterConfig};
use crate::source::types::RowSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// How rows of the input source are turned into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Each row is one pre-segmented beat
    Beats,
    /// Rows carry raw samples that are segmented on R-peaks
    Stream,
}

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CSV written by the capture process
    pub input_path: PathBuf,
    /// Append-only prediction log
    pub output_path: PathBuf,
    /// Plain-text file holding the latest predicted class
    pub status_path: PathBuf,
    /// Exported classifier weights
    pub model_path: PathBuf,
    /// Fitted scaler parameters; normalization is skipped without them
    pub scaler_path: Option<PathBuf>,
    /// Cumulative pipeline statistics
    pub stats_path: PathBuf,

    /// Input interpretation
    pub mode: InputMode,
    /// First input row to process
    pub start_row: u64,
    /// In beats mode, skip rows already present in the output log
    pub resume_from_log: bool,
    /// Whether the input starts with a header line
    pub has_header: bool,
    /// Input column layout
    pub schema: RowSchema,

    /// Samples per window
    pub window_length: usize,
    /// Sampling rate of the input in Hz
    pub sampling_rate_hz: f64,
    /// Minimum spacing between detected beats, in seconds
    pub min_peak_distance_secs: f64,
    /// Peak height threshold
    pub peak_height: PeakHeight,
    /// Beats-mode rows with fewer features are not beats and are skipped
    pub min_row_features: usize,

    /// Windows per classifier call
    pub batch_size: usize,
    /// Delay between polls of the input source
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Status server settings
    pub server: ServerSettings,
    /// Remote inference service; the local model is used when absent
    pub remote: Option<RemoteSettings>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-ecg-agent");

        Self {
            input_path: data_dir.join("ecg_live.csv"),
            output_path: data_dir.join("ecg_predictions.csv"),
            status_path: data_dir.join("ecg_live_status.txt"),
            model_path: data_dir.join("models").join("ecg_model.json"),
            scaler_path: Some(data_dir.join("models").join("ecg_scaler.json")),
            stats_path: data_dir.join("stats.json"),
            mode: InputMode::Beats,
            start_row: 0,
            resume_from_log: true,
            has_header: true,
            schema: RowSchema::default(),
            window_length: 187,
            sampling_rate_hz: 125.0,
            min_peak_distance_secs: 0.6,
            peak_height: PeakHeight::Mean,
            min_row_features: 10,
            batch_size: 32,
            poll_interval: Duration::from_millis(100),
            server: ServerSettings::default(),
            remote: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-ecg-agent")
            .join("config.json")
    }

    /// Segmentation parameters derived from this configuration.
    pub fn segmenter(&self) -> SegmenterConfig {
        SegmenterConfig {
            window_length: self.window_length,
            sampling_rate_hz: self.sampling_rate_hz,
            min_peak_distance_secs: self.min_peak_distance_secs,
            peak_height: self.peak_height,
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_length == 0 {
            return Err(ConfigError::Invalid("window_length must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sampling_rate_hz must be positive, got {}",
                self.sampling_rate_hz
            )));
        }
        if !(self.min_peak_distance_secs.is_finite() && self.min_peak_distance_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_peak_distance_secs must be non-negative, got {}",
                self.min_peak_distance_secs
            )));
        }
        Ok(())
    }
}

/// Status server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
        }
    }
}

/// Remote inference settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub url: String,
    pub timeout_secs: u64,
    pub num_classes: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8501/v1/models/ecg:predict".to_string(),
            timeout_secs: 10,
            num_classes: 5,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_length, 187);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.mode, InputMode::Beats);
        assert!(config.schema.has_label);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"mode": "stream", "poll_interval": 250, "peak_height": {"fixed": 0.4}}"#,
        )
        .unwrap();
        assert_eq!(config.mode, InputMode::Stream);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.peak_height, PeakHeight::Fixed(0.4));
        assert_eq!(config.window_length, 187);
    }

    #[test]
    fn test_nested_sections_fill_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"server": {"port": 9000}, "remote": {"timeout_secs": 3}, "schema": {"has_label": false}}"#,
        )
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        let remote = config.remote.unwrap();
        assert_eq!(remote.timeout_secs, 3);
        assert_eq!(remote.num_classes, 5);
        assert!(!config.schema.has_label);
        assert_eq!(config.schema.leading_columns, 0);
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.poll_interval, config.poll_interval);
        assert_eq!(parsed.output_path, config.output_path);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sampling_rate_hz = 0.0;
        assert!(config.validate().is_err());
    }
}

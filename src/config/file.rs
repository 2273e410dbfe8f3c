//! TOML configuration file.

use super::{ConfigError, RunOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full configuration file format.
///
/// ```toml
/// [run]
/// source = "reference.mkv"
/// distorted = "encoded.mkv"
/// pnorm = 3.0
/// intensity_target = 250.0
/// threads = 4
///
/// [run.pixel_format]
/// channels = "rgb"
/// sample = "u16"
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Run options, overridden by the command line.
    #[serde(default)]
    pub run: RunOptions,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Only parsing happens here; the run options are validated later,
    /// after command line overrides are applied.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PixelFormat;
    use std::io::Write;

    #[test]
    fn test_empty_file_is_default() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.run.pnorm, 3.0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.metrics.port, 0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[run]
source = "a.mkv"
distorted = "b.mkv"
pnorm = 2.0
threads = 6

[run.pixel_format]
channels = "gray"
sample = "u8"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = FileConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run.source.as_deref(), Some(Path::new("a.mkv")));
        assert_eq!(config.run.pnorm, 2.0);
        assert_eq!(config.run.threads, Some(6));
        assert_eq!(config.run.intensity_target, 250.0);
        assert_eq!(config.run.pixel_format, PixelFormat::GRAY8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/no/such/vqscore.toml"),
            Err(ConfigError::FileRead(_))
        ));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\npnorm = \"three\"").unwrap();

        assert!(matches!(
            FileConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}

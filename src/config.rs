use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fetch::DEFAULT_TIMEOUT_SECS;
use crate::highlight::{DEFAULT_API_BASE, LookupMode};
use crate::transcode::DEFAULT_QUALITY;

/// Top-level configuration for the waypoint-exif library and CLI.
///
/// # Loading
///
/// ```rust,no_run
/// use waypoint_exif::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.timezone = "Europe/Berlin".into();
/// config.highlight.ignore_errors = true;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA time zone the capture timestamps are rendered in.
    pub timezone: String,
    /// JPEG quality (1–100) used when a PNG is re-encoded.
    pub jpeg_quality: u8,
    /// Timeout for every outbound HTTP request.
    pub fetch_timeout_secs: u64,
    /// Highlight override lookup.
    pub highlight: HighlightConfig,
    /// Where and how output files are written.
    pub output: OutputConfig,
}

/// Highlight lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// If `false`, highlight references on records are not resolved at all.
    pub enabled: bool,
    /// Base URL of the route API.
    pub api_base: String,
    /// If `true`, lookup failures are logged and the record's own fields are kept.
    pub ignore_errors: bool,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the CLI writes `<id>.jpg` files into.
    pub directory: PathBuf,
    /// If `false`, the CLI skips records whose output file already exists.
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            jpeg_quality: DEFAULT_QUALITY,
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
            highlight: HighlightConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: DEFAULT_API_BASE.to_string(),
            ignore_errors: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("photos"),
            overwrite: true,
        }
    }
}

impl HighlightConfig {
    pub fn lookup_mode(&self) -> LookupMode {
        if self.ignore_errors {
            LookupMode::Ignore
        } else {
            LookupMode::Fatal
        }
    }
}

impl Config {
    /// Default config location: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("Cannot locate the waypoint-exif executable")?;
        let dir = exe
            .parent()
            .context("waypoint-exif executable has no parent directory")?;
        Ok(dir.join("config.json"))
    }

    fn resolve(path: Option<&Path>) -> Result<PathBuf> {
        path.map_or_else(Self::config_path, |p| Ok(p.to_path_buf()))
    }

    /// Load config from the given path, or from [`Config::config_path`].
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve(path)?;

        if !path.exists() {
            log::warn!(
                "No waypoint-exif config at {}, using defaults (timezone UTC, quality {DEFAULT_QUALITY})",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read waypoint-exif config {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed waypoint-exif config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty JSON to the given path, or to [`Config::config_path`].
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = Self::resolve(path)?;

        let contents = serde_json::to_string_pretty(self).context("Cannot serialize config")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Cannot write waypoint-exif config {}", path.display()))?;
        log::info!("Wrote waypoint-exif config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.fetch_timeout_secs, 15);
        assert!(config.highlight.enabled);
        assert_eq!(config.highlight.lookup_mode(), LookupMode::Fatal);
        assert_eq!(config.output.directory, PathBuf::from("photos"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.timezone = "Europe/Berlin".into();
        config.highlight.ignore_errors = true;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.timezone, "Europe/Berlin");
        assert_eq!(loaded.highlight.lookup_mode(), LookupMode::Ignore);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.jpeg_quality, 90);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"timezone": "Asia/Tokyo", "highlight": {"enabled": false}}"#)
            .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.timezone, "Asia/Tokyo");
        assert!(!config.highlight.enabled);
        assert_eq!(config.highlight.api_base, DEFAULT_API_BASE);
        assert_eq!(config.fetch_timeout_secs, 15);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Malformed waypoint-exif config"), "{err:#}");
    }

    #[test]
    fn save_to_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("config.json");
        assert!(Config::default().save(Some(&path)).is_err());
    }
}

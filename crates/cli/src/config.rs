//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service URL used when neither the flag, the environment nor the config
/// file provides one
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Prediction service URL
    pub api_url: Option<String>,
    /// Artifact directory used by `inspect` and local `predict`
    pub artifact_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `~/.config/estato/config.json`
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file; a missing file is empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Resolve the service URL: explicit value, then config file, then default
    pub fn api_url(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("estato").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_url.is_none());
        assert_eq!(config.api_url(None), DEFAULT_API_URL);
    }

    #[test]
    fn test_api_url_precedence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_url": "http://estato.internal:5000"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url(None), "http://estato.internal:5000");
        assert_eq!(config.api_url(Some("http://127.0.0.1:9000")), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}

//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name attached to structured log records
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port for predictions, health and metrics
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the artifact bundle
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Frontend assets served for unmatched paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_service_name() -> String {
    "estato".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("model")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            host: default_host(),
            port: default_port(),
            artifact_dir: default_artifact_dir(),
            static_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from an optional `estato.toml` and `ESTATO_*`
    /// environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("estato").required(false))
            .add_source(config::Environment::with_prefix("ESTATO"))
            .build()
            .context("Failed to build service configuration")?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.artifact_dir, PathBuf::from("model"));
        assert!(config.static_dir.is_none());
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_deserialize_partial_source() {
        let config: ServiceConfig = config::Config::builder()
            .set_override("port", 8081)
            .unwrap()
            .set_override("static_dir", "frontend")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.static_dir, Some(PathBuf::from("frontend")));
        assert_eq!(config.service_name, "estato");
    }
}

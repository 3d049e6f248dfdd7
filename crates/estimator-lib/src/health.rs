//! Health reporting for the predictor service
//!
//! The service has a single component that matters, the artifact bundle.
//! A missing or rejected bundle leaves the process up but degraded.

use crate::bundle::BundleManifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Model loaded, predictions are served
    Healthy,
    /// Process is up but every prediction fails
    Degraded,
}

impl ComponentStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ComponentStatus::Healthy)
    }
}

/// Summary of the loaded bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub trained_at: DateTime<Utc>,
    pub features: usize,
    pub trees: usize,
}

impl From<&BundleManifest> for ModelInfo {
    fn from(manifest: &BundleManifest) -> Self {
        Self {
            trained_at: manifest.trained_at,
            features: manifest.feature_count,
            trees: manifest.tree_count,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub model_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealthResponse {
    pub fn healthy(model: Option<ModelInfo>) -> Self {
        Self {
            status: ComponentStatus::Healthy,
            model_loaded: true,
            model,
            reason: None,
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            model_loaded: false,
            model: None,
            reason: Some(reason.into()),
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

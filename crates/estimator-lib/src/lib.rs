//! Estimator library for house-price prediction
//!
//! This crate provides the core functionality for:
//! - The train/serve encoding contract (schema, label encoders, log target)
//! - Dataset loading and deterministic splitting
//! - Random forest fitting and inference
//! - Artifact bundle persistence
//! - The prediction service, health reporting and observability

pub mod bundle;
pub mod dataset;
pub mod encoding;
pub mod forest;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use bundle::{ArtifactStore, BundleError, BundleManifest, ModelBundle};
pub use health::{ComponentStatus, HealthResponse, ModelInfo, ReadinessResponse};
pub use models::*;
pub use observability::{EstimatorMetrics, StructuredLogger};
pub use predictor::{PredictError, PredictionService};

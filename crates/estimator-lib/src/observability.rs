//! Observability infrastructure for the estimator
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, unseen labels, model state)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge, Histogram,
    IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EstimatorMetricsInner> = OnceLock::new();

struct EstimatorMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounterVec,
    unseen_labels_total: IntCounterVec,
    model_loaded: IntGauge,
}

impl EstimatorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "estato_prediction_latency_seconds",
                "Time spent encoding a request and running the forest",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "estato_predictions_total",
                "Total number of predictions served"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "estato_prediction_errors_total",
                "Total number of failed predictions by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            unseen_labels_total: register_int_counter_vec!(
                "estato_unseen_labels_total",
                "Categorical values replaced by the fallback label, by column",
                &["column"]
            )
            .expect("Failed to register unseen_labels_total"),

            model_loaded: register_int_gauge!(
                "estato_model_loaded",
                "1 when an artifact bundle is loaded, 0 otherwise"
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Handle to the process-wide estimator metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct EstimatorMetrics {
    inner: &'static EstimatorMetricsInner,
}

impl Default for EstimatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EstimatorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimatorMetrics").finish_non_exhaustive()
    }
}

impl EstimatorMetrics {
    /// Create a metrics handle, registering the collectors on first use
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new),
        }
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner.prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner.predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner.prediction_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_unseen_label(&self, column: &str) {
        self.inner.unseen_labels_total.with_label_values(&[column]).inc();
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.inner.model_loaded.set(i64::from(loaded));
    }
}

/// Structured logger for estimator events
///
/// Every record carries an `event` field so log pipelines can filter on it.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            service = %self.service_name,
            version = %version,
            port = port,
            "Estimator service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Estimator service shutting down"
        );
    }

    pub fn log_bundle_loaded(&self, dir: &str, features: usize, trees: usize) {
        info!(
            event = "bundle_loaded",
            service = %self.service_name,
            dir = %dir,
            features = features,
            trees = trees,
            "Artifact bundle loaded"
        );
    }

    /// Log a bundle that could not be loaded; the service keeps running
    pub fn log_bundle_unavailable(&self, dir: &str, reason: &str) {
        warn!(
            event = "bundle_unavailable",
            service = %self.service_name,
            dir = %dir,
            reason = %reason,
            "Artifact bundle unavailable, predictions will fail"
        );
    }

    pub fn log_unseen_label(&self, column: &str, label: &str, fallback: &str) {
        warn!(
            event = "unseen_label",
            service = %self.service_name,
            column = %column,
            label = %label,
            fallback = %fallback,
            "Unseen categorical value, using fallback label"
        );
    }

    pub fn log_prediction(&self, predicted_price: f64, currency: &str, latency_secs: f64) {
        debug!(
            event = "prediction_served",
            service = %self.service_name,
            predicted_price = predicted_price,
            currency = %currency,
            latency_secs = latency_secs,
            "Prediction served"
        );
    }

    pub fn log_evaluation(&self, partition: &str, r2: f64, mae: f64, rmse: f64, samples: usize) {
        info!(
            event = "evaluation",
            service = %self.service_name,
            partition = %partition,
            r2 = r2,
            mae = mae,
            rmse = rmse,
            samples = samples,
            "Evaluation results"
        );
    }

    pub fn log_training_completed(&self, rows: usize, features: usize, trees: usize, elapsed_secs: f64) {
        info!(
            event = "training_completed",
            service = %self.service_name,
            rows = rows,
            features = features,
            trees = trees,
            elapsed_secs = elapsed_secs,
            "Training completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_collectors() {
        let a = EstimatorMetrics::new();
        let b = a.clone();
        a.observe_prediction_latency(0.0004);
        a.inc_unseen_label("City");
        a.inc_prediction_errors("invalid_request");
        a.set_model_loaded(true);

        let before = b.inner.predictions_total.get();
        a.inc_predictions();
        assert!(b.inner.predictions_total.get() > before);
        assert!(std::ptr::eq(a.inner, EstimatorMetrics::new().inner));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("estato-test");
        assert_eq!(logger.service_name(), "estato-test");
    }
}

//! Prediction service shared by the HTTP handlers and the CLI

use super::payload::parse_payload;
use super::PredictError;
use crate::bundle::{ArtifactStore, ModelBundle};
use crate::encoding::inverse_target;
use crate::health::{HealthResponse, ModelInfo, ReadinessResponse};
use crate::models::{PricePrediction, RawRow, CURRENCY};
use crate::observability::{EstimatorMetrics, StructuredLogger};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

enum ModelState {
    Loaded(ModelBundle),
    Unavailable(String),
}

/// Serves predictions from a bundle loaded once at startup.
///
/// A service built without a bundle stays up and answers every prediction
/// with [`PredictError::ModelUnavailable`]; it never retries the load.
pub struct PredictionService {
    state: ModelState,
    logger: StructuredLogger,
    metrics: EstimatorMetrics,
    prediction_count: AtomicU64,
}

impl PredictionService {
    pub fn new(bundle: ModelBundle, logger: StructuredLogger) -> Self {
        Self::with_state(ModelState::Loaded(bundle), logger)
    }

    /// Service that fails every prediction with `reason`
    pub fn unavailable(reason: impl Into<String>, logger: StructuredLogger) -> Self {
        Self::with_state(ModelState::Unavailable(reason.into()), logger)
    }

    /// Load the bundle in `store`, degrading instead of failing
    pub fn load(store: &ArtifactStore, logger: StructuredLogger) -> Self {
        let dir = store.dir().display().to_string();
        match store.load() {
            Ok(bundle) => {
                let trees = bundle.manifest().map(|m| m.tree_count).unwrap_or_default();
                logger.log_bundle_loaded(&dir, bundle.schema().len(), trees);
                Self::new(bundle, logger)
            }
            Err(e) => {
                let reason = e.to_string();
                logger.log_bundle_unavailable(&dir, &reason);
                Self::unavailable(reason, logger)
            }
        }
    }

    fn with_state(state: ModelState, logger: StructuredLogger) -> Self {
        let metrics = EstimatorMetrics::new();
        metrics.set_model_loaded(matches!(state, ModelState::Loaded(_)));
        Self {
            state,
            logger,
            metrics,
            prediction_count: AtomicU64::new(0),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    pub fn bundle(&self) -> Option<&ModelBundle> {
        match &self.state {
            ModelState::Loaded(bundle) => Some(bundle),
            ModelState::Unavailable(_) => None,
        }
    }

    /// Number of successful predictions served by this instance
    pub fn prediction_count(&self) -> u64 {
        self.prediction_count.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> HealthResponse {
        match &self.state {
            ModelState::Loaded(bundle) => HealthResponse::healthy(bundle.manifest().map(ModelInfo::from)),
            ModelState::Unavailable(reason) => HealthResponse::degraded(reason.clone()),
        }
    }

    pub fn readiness(&self) -> ReadinessResponse {
        match &self.state {
            ModelState::Loaded(_) => ReadinessResponse {
                ready: true,
                reason: None,
            },
            ModelState::Unavailable(reason) => ReadinessResponse {
                ready: false,
                reason: Some(reason.clone()),
            },
        }
    }

    /// Predict from raw request bytes. Availability is checked before the
    /// body is parsed.
    pub fn predict_body(&self, body: &[u8]) -> Result<PricePrediction, PredictError> {
        let result = self
            .loaded()
            .and_then(|_| {
                serde_json::from_slice::<Value>(body)
                    .map_err(|e| PredictError::InvalidRequest(format!("malformed JSON body: {}", e)))
            })
            .and_then(|value| self.predict_value(&value));
        self.record_failure(result)
    }

    /// Predict from a JSON request body
    pub fn predict_json(&self, body: &Value) -> Result<PricePrediction, PredictError> {
        self.record_failure(self.predict_value(body))
    }

    /// Predict from an already-typed row
    pub fn predict_row(&self, row: &RawRow) -> Result<PricePrediction, PredictError> {
        self.record_failure(self.run(row))
    }

    fn record_failure(
        &self,
        result: Result<PricePrediction, PredictError>,
    ) -> Result<PricePrediction, PredictError> {
        if let Err(e) = &result {
            self.metrics.inc_prediction_errors(e.kind());
        }
        result
    }

    fn predict_value(&self, body: &Value) -> Result<PricePrediction, PredictError> {
        let bundle = self.loaded()?;
        let row = parse_payload(body, bundle.schema())?;
        self.run(&row)
    }

    fn loaded(&self) -> Result<&ModelBundle, PredictError> {
        match &self.state {
            ModelState::Loaded(bundle) => Ok(bundle),
            ModelState::Unavailable(reason) => Err(PredictError::ModelUnavailable(reason.clone())),
        }
    }

    fn run(&self, row: &RawRow) -> Result<PricePrediction, PredictError> {
        let bundle = self.loaded()?;
        let start = Instant::now();

        let encoded = bundle.encoder().encode(row)?;
        for unseen in &encoded.unseen {
            self.logger
                .log_unseen_label(&unseen.column, &unseen.label, &unseen.fallback);
            self.metrics.inc_unseen_label(&unseen.column);
        }

        let log_price = bundle.model().predict(&encoded.values);
        let price = inverse_target(log_price);
        if !price.is_finite() {
            return Err(PredictError::Internal(format!(
                "model produced a non-finite prediction ({})",
                log_price
            )));
        }

        let prediction = PricePrediction {
            predicted_price: round_to_cents(price),
            currency: CURRENCY.to_string(),
        };

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.observe_prediction_latency(elapsed);
        self.metrics.inc_predictions();
        self.prediction_count.fetch_add(1, Ordering::Relaxed);
        self.logger
            .log_prediction(prediction.predicted_price, &prediction.currency, elapsed);

        Ok(prediction)
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{ColumnSchema, FeatureEncoder, LabelEncoder};
    use crate::forest::Regressor;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// Returns a fixed log price and remembers the last input
    struct StubModel {
        output: f64,
        n_features: usize,
        last_input: Mutex<Vec<f64>>,
    }

    impl StubModel {
        fn new(output: f64, n_features: usize) -> Arc<Self> {
            Arc::new(Self {
                output,
                n_features,
                last_input: Mutex::new(Vec::new()),
            })
        }
    }

    impl Regressor for StubModel {
        fn predict(&self, features: &[f64]) -> f64 {
            *self.last_input.lock().unwrap() = features.to_vec();
            self.output
        }

        fn n_features(&self) -> usize {
            self.n_features
        }

        fn kind(&self) -> &str {
            "stub"
        }
    }

    fn service_with(model: Arc<StubModel>) -> PredictionService {
        let schema = ColumnSchema::new(["Area", "Bedrooms", "City"]).unwrap();
        let city = LabelEncoder::from_mapping(BTreeMap::from([
            ("Lahore".to_string(), 0),
            ("Karachi".to_string(), 1),
        ]))
        .unwrap();
        let encoder = FeatureEncoder::new(schema, BTreeMap::from([("City".to_string(), city)])).unwrap();
        let bundle = ModelBundle::new(model, encoder).unwrap();
        PredictionService::new(bundle, StructuredLogger::new("test"))
    }

    fn expected_price(log_price: f64) -> f64 {
        (log_price.exp_m1() * 100.0).round() / 100.0
    }

    #[test]
    fn test_known_row_prediction() {
        let model = StubModel::new(14.0, 3);
        let service = service_with(model.clone());

        let prediction = service
            .predict_json(&json!({"Area": 1000, "Bedrooms": 3, "City": "Lahore"}))
            .unwrap();

        assert_eq!(*model.last_input.lock().unwrap(), vec![1000.0, 3.0, 0.0]);
        assert_eq!(prediction.predicted_price, expected_price(14.0));
        assert_eq!(prediction.currency, "PKR");
        assert_eq!(service.prediction_count(), 1);
    }

    #[test]
    fn test_unseen_label_uses_fallback() {
        let model = StubModel::new(14.0, 3);
        let service = service_with(model.clone());

        let prediction = service
            .predict_json(&json!({"Area": 1000, "Bedrooms": 3, "City": "Islamabad"}))
            .unwrap();

        // "Karachi" sorts first and carries code 1
        assert_eq!(*model.last_input.lock().unwrap(), vec![1000.0, 3.0, 1.0]);
        assert!(prediction.predicted_price.is_finite());
    }

    #[test]
    fn test_unavailable_model() {
        let service = PredictionService::unavailable("manifest.json not found", StructuredLogger::new("test"));

        let err = service.predict_json(&json!({"Area": 1000})).unwrap_err();
        assert!(matches!(err, PredictError::ModelUnavailable(_)));
        assert_eq!(err.kind(), "model_unavailable");

        let health = service.health();
        assert!(!health.model_loaded);
        assert!(!service.readiness().ready);
    }

    #[test]
    fn test_unavailable_checked_before_payload() {
        let service = PredictionService::unavailable("no bundle", StructuredLogger::new("test"));
        let err = service.predict_json(&json!("not an object")).unwrap_err();
        assert!(matches!(err, PredictError::ModelUnavailable(_)));
    }

    #[test]
    fn test_missing_field_defaults_to_zero() {
        let model = StubModel::new(14.0, 3);
        let service = service_with(model.clone());

        let omitted = service
            .predict_json(&json!({"Area": 1000, "City": "Lahore"}))
            .unwrap();
        assert_eq!(*model.last_input.lock().unwrap(), vec![1000.0, 0.0, 0.0]);

        let explicit = service
            .predict_json(&json!({"Area": 1000, "Bedrooms": 0, "City": "Lahore"}))
            .unwrap();
        assert_eq!(omitted, explicit);
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let model = StubModel::new(13.2, 3);
        let service = service_with(model);
        let a = service
            .predict_json(&json!({"City": "Karachi", "Area": 800, "Bedrooms": 2}))
            .unwrap();
        let b = service
            .predict_json(&json!({"Bedrooms": 2, "Area": 800, "City": "Karachi"}))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_numeric_value_is_invalid_request() {
        let service = service_with(StubModel::new(14.0, 3));
        let err = service
            .predict_json(&json!({"Area": "large", "City": "Lahore"}))
            .unwrap_err();
        assert!(matches!(err, PredictError::InvalidRequest(_)));

        // numeric strings are accepted for numeric columns
        assert!(service.predict_json(&json!({"Area": "1000", "City": "Lahore"})).is_ok());
    }

    #[test]
    fn test_non_finite_output_is_internal_error() {
        let service = service_with(StubModel::new(f64::INFINITY, 3));
        let err = service.predict_json(&json!({"Area": 1})).unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
    }

    #[test]
    fn test_health_reports_loaded_bundle() {
        let service = service_with(StubModel::new(14.0, 3));
        assert!(service.is_loaded());
        let health = service.health();
        assert!(health.model_loaded);
        assert!(health.status.is_healthy());
        assert!(service.readiness().ready);
    }

    #[test]
    fn test_predict_body() {
        let service = service_with(StubModel::new(14.0, 3));
        let ok = service.predict_body(br#"{"Area": 1000, "Bedrooms": 3, "City": "Lahore"}"#);
        assert_eq!(ok.unwrap().predicted_price, expected_price(14.0));

        let err = service.predict_body(b"{not json").unwrap_err();
        assert!(matches!(err, PredictError::InvalidRequest(_)));

        let unavailable = PredictionService::unavailable("no bundle", StructuredLogger::new("test"));
        let err = unavailable.predict_body(b"{not json").unwrap_err();
        assert!(matches!(err, PredictError::ModelUnavailable(_)));
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(1234.5678), 1234.57);
        assert_eq!(round_to_cents(10.0), 10.0);
    }
}

//! `estato predict`

use anyhow::{Context, Result};
use colored::Colorize;
use estimator_lib::{ArtifactStore, PredictionService, PricePrediction, StructuredLogger};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::client::ApiClient;
use crate::output::{format_price, print_json, OutputFormat};

/// Parse a `KEY=VALUE` pair
pub fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build the request body from `--field` pairs or a `--json` object.
///
/// Field values that parse as finite numbers are sent as JSON numbers.
pub fn build_payload(fields: &[(String, String)], json: Option<&str>) -> Result<Value> {
    if let Some(raw) = json {
        let value: Value = serde_json::from_str(raw).context("--json is not valid JSON")?;
        if !value.is_object() {
            anyhow::bail!("--json must be a JSON object");
        }
        return Ok(value);
    }

    let mut object = Map::with_capacity(fields.len());
    for (key, raw) in fields {
        let value = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.clone()));
        object.insert(key.clone(), value);
    }
    Ok(Value::Object(object))
}

/// Predict through the running service
pub async fn predict_remote(client: &ApiClient, payload: &Value, format: OutputFormat) -> Result<()> {
    debug!(url = %client.base_url(), "Requesting prediction from service");
    let prediction: PricePrediction = client.post("predict", payload).await?;
    print_prediction(&prediction, format)
}

/// Predict in-process from a bundle on disk
pub fn predict_local(artifacts: &Path, payload: &Value, format: OutputFormat) -> Result<()> {
    let bundle = ArtifactStore::new(artifacts)
        .load()
        .with_context(|| format!("Failed to load artifact bundle from {}", artifacts.display()))?;
    debug!(dir = %artifacts.display(), columns = bundle.schema().len(), "Bundle loaded for local prediction");
    let service = PredictionService::new(bundle, StructuredLogger::new("estato-cli"));

    let prediction = service.predict_json(payload)?;
    print_prediction(&prediction, format)
}

fn print_prediction(prediction: &PricePrediction, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(prediction)?,
        OutputFormat::Table => {
            println!(
                "Estimated price: {}",
                format_price(prediction.predicted_price, &prediction.currency)
                    .green()
                    .bold()
            );
        }
    }
    Ok(())
}

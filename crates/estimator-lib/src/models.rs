//! Core data models shared by the trainer and the predictor

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Currency tag attached to every prediction
pub const CURRENCY: &str = "PKR";

/// A single raw feature value as it arrives from a dataset cell or a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Canonical label text used when the value feeds a categorical column.
    ///
    /// Integral numbers render without a fractional part so that `3` and
    /// `3.0` map to the same label `"3"`.
    pub fn as_label(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            RawValue::Number(n) => n.to_string(),
        }
    }

    /// Numeric view used when the value feeds a numeric column
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// One row of raw features keyed by column name
pub type RawRow = HashMap<String, RawValue>;

/// Prediction returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    pub predicted_price: f64,
    pub currency: String,
}

/// Regression quality on one partition, in original price units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    pub samples: usize,
}

/// Row counts of the three partitions used during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSizes {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_number_label() {
        assert_eq!(RawValue::Number(3.0).as_label(), "3");
        assert_eq!(RawValue::Number(-12.0).as_label(), "-12");
        assert_eq!(RawValue::Number(2.5).as_label(), "2.5");
        assert_eq!(RawValue::from("Lahore").as_label(), "Lahore");
    }

    #[test]
    fn test_numeric_text_parses() {
        assert_eq!(RawValue::from(" 1200 ").as_number(), Some(1200.0));
        assert_eq!(RawValue::from("DHA").as_number(), None);
        assert_eq!(RawValue::from("NaN").as_number(), None);
        assert_eq!(RawValue::Number(7.5).as_number(), Some(7.5));
    }

    #[test]
    fn test_untagged_deserialization() {
        let v: RawValue = serde_json::from_str("1000").unwrap();
        assert_eq!(v, RawValue::Number(1000.0));
        let v: RawValue = serde_json::from_str("\"Karachi\"").unwrap();
        assert_eq!(v, RawValue::from("Karachi"));
    }
}

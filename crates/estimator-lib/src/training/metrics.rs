//! Regression metrics in original price units

use crate::models::EvaluationMetrics;

/// Coefficient of determination.
///
/// When the actual values have zero variance the score is 1.0 for a perfect
/// fit and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / actual.len() as f64;
    mse.sqrt()
}

/// All three metrics for one partition
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> EvaluationMetrics {
    EvaluationMetrics {
        r2: r2_score(actual, predicted),
        mae: mean_absolute_error(actual, predicted),
        rmse: root_mean_squared_error(actual, predicted),
        samples: actual.len(),
    }
}

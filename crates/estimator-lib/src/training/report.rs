//! Evaluation side artifacts: per-row error CSV and the accuracy chart

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ERROR_REPORT_FILE: &str = "prediction_analysis.csv";
pub const ACCURACY_PLOT_FILE: &str = "accuracy_plot.svg";

/// One test row of the error analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReportRow {
    #[serde(rename = "Actual_Price")]
    pub actual_price: f64,
    #[serde(rename = "Predicted_Price")]
    pub predicted_price: f64,
    #[serde(rename = "Difference")]
    pub difference: f64,
    /// Empty when the actual price is zero
    #[serde(rename = "Error_Percentage")]
    pub error_percentage: Option<f64>,
}

impl ErrorReportRow {
    pub fn new(actual_price: f64, predicted_price: f64) -> Self {
        let difference = actual_price - predicted_price;
        let error_percentage = (actual_price != 0.0).then(|| (difference / actual_price).abs() * 100.0);
        Self {
            actual_price,
            predicted_price,
            difference,
            error_percentage,
        }
    }
}

/// Rows in test-partition order
pub fn error_report(actual: &[f64], predicted: &[f64]) -> Vec<ErrorReportRow> {
    actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| ErrorReportRow::new(a, p))
        .collect()
}

pub fn write_error_report(path: &Path, rows: &[ErrorReportRow]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Least-squares fit `y = slope * x + intercept`
#[cfg_attr(not(feature = "plot"), allow(dead_code))]
fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let cov: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let var: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if var == 0.0 {
        return None;
    }
    let slope = cov / var;
    Some((slope, mean_y - slope * mean_x))
}

/// Scatter of actual vs predicted prices with trend line and diagonal
#[cfg(feature = "plot")]
pub fn write_accuracy_plot(
    path: &Path,
    actual: &[f64],
    predicted: &[f64],
    r2: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use plotters::prelude::*;

    let lo = actual.iter().chain(predicted).copied().fold(f64::INFINITY, f64::min);
    let hi = actual.iter().chain(predicted).copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return Err("no finite points to plot".into());
    }
    let pad = ((hi - lo) * 0.05).max(1.0);
    let range = (lo - pad)..(hi + pad);

    let root = SVGBackend::new(path, (1000, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = format!("Actual vs Predicted Prices (R² = {:.3})", r2);
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(range.clone(), range)?;

    chart
        .configure_mesh()
        .x_desc("Actual Price (PKR)")
        .y_desc("Predicted Price (PKR)")
        .draw()?;

    chart.draw_series(
        actual
            .iter()
            .zip(predicted)
            .map(|(&a, &p)| Circle::new((a, p), 3, BLUE.mix(0.5).filled())),
    )?;

    chart.draw_series(LineSeries::new(
        vec![(lo, lo), (hi, hi)],
        BLACK.stroke_width(1),
    ))?;

    if let Some((slope, intercept)) = linear_fit(actual, predicted) {
        chart.draw_series(LineSeries::new(
            vec![(lo, slope * lo + intercept), (hi, slope * hi + intercept)],
            RED.stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_report_row_values() {
        let row = ErrorReportRow::new(200.0, 150.0);
        assert_eq!(row.difference, 50.0);
        assert_eq!(row.error_percentage, Some(25.0));

        let over = ErrorReportRow::new(100.0, 120.0);
        assert_eq!(over.difference, -20.0);
        assert!((over.error_percentage.unwrap() - 20.0).abs() < 1e-9);

        assert_eq!(ErrorReportRow::new(0.0, 5.0).error_percentage, None);
    }

    #[test]
    fn test_write_error_report_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ERROR_REPORT_FILE);
        write_error_report(&path, &error_report(&[200.0, 0.0], &[150.0, 1.0])).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Actual_Price,Predicted_Price,Difference,Error_Percentage")
        );
        assert_eq!(lines.next(), Some("200.0,150.0,50.0,25.0"));
        assert_eq!(lines.next(), Some("0.0,1.0,-1.0,"));
    }

    #[test]
    fn test_linear_fit() {
        let (slope, intercept) = linear_fit(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert!(linear_fit(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }

    #[cfg(feature = "plot")]
    #[test]
    fn test_write_accuracy_plot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ACCURACY_PLOT_FILE);
        write_accuracy_plot(&path, &[100.0, 200.0, 300.0], &[110.0, 190.0, 320.0], 0.97).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }
}

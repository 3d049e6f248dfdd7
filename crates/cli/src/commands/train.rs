//! `estato train`

use anyhow::{Context, Result};
use colored::Colorize;
use estimator_lib::training::{TrainConfig, Trainer, TrainingOutcome};
use estimator_lib::EvaluationMetrics;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{color_r2, format_price, print_info, print_json, print_success, OutputFormat};

/// Row for the evaluation table
#[derive(Tabled, Serialize)]
struct MetricsRow {
    #[tabled(rename = "Partition")]
    partition: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "R²")]
    r2: String,
    #[tabled(rename = "MAE")]
    mae: String,
    #[tabled(rename = "RMSE")]
    rmse: String,
}

impl MetricsRow {
    fn new(partition: &str, metrics: &EvaluationMetrics) -> Self {
        Self {
            partition: partition.to_string(),
            samples: metrics.samples,
            r2: color_r2(metrics.r2),
            mae: format_price(metrics.mae, estimator_lib::CURRENCY),
            rmse: format_price(metrics.rmse, estimator_lib::CURRENCY),
        }
    }
}

/// JSON summary of a training run
#[derive(Serialize)]
struct TrainSummary<'a> {
    artifact_dir: String,
    error_report: String,
    plot: Option<String>,
    dropped_columns: &'a [String],
    split: estimator_lib::SplitSizes,
    validation: EvaluationMetrics,
    test: EvaluationMetrics,
}

/// Run the trainer on a worker thread and report the outcome
pub async fn run_training(dataset: std::path::PathBuf, config: TrainConfig, format: OutputFormat) -> Result<()> {
    let artifact_dir = config.artifact_dir.clone();
    let trainer = Trainer::new(config);
    let dataset_display = dataset.display().to_string();

    let outcome = tokio::task::spawn_blocking(move || trainer.run(&dataset))
        .await
        .context("Training task panicked")?
        .with_context(|| format!("Training on {} failed", dataset_display))?;

    let summary = TrainSummary {
        artifact_dir: artifact_dir.display().to_string(),
        error_report: outcome.error_report_path.display().to_string(),
        plot: outcome.plot_path.as_ref().map(|p| p.display().to_string()),
        dropped_columns: &outcome.dropped_columns,
        split: outcome.split,
        validation: outcome.validation,
        test: outcome.test,
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_outcome(&summary, &outcome),
    }

    Ok(())
}

fn print_outcome(summary: &TrainSummary<'_>, outcome: &TrainingOutcome) {
    println!("{}", "Training Summary".bold());
    println!("{}", "=".repeat(60));
    println!(
        "Rows:        {} train / {} validation / {} test",
        summary.split.train, summary.split.validation, summary.split.test
    );
    println!("Features:    {}", outcome.manifest.feature_count);
    println!("Trees:       {}", outcome.manifest.tree_count);
    if !summary.dropped_columns.is_empty() {
        println!("Dropped:     {}", summary.dropped_columns.join(", "));
    }
    println!();

    let rows = vec![
        MetricsRow::new("validation", &summary.validation),
        MetricsRow::new("test", &summary.test),
    ];
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
    println!();

    print_info(&format!("Error report: {}", summary.error_report));
    if let Some(plot) = &summary.plot {
        print_info(&format!("Accuracy plot: {}", plot));
    }
    print_success(&format!("Model bundle written to {}", summary.artifact_dir.cyan()));
}

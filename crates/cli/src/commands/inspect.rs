//! `estato inspect`

use anyhow::{Context, Result};
use colored::Colorize;
use estimator_lib::encoding::CategoricalEncoders;
use estimator_lib::{ArtifactStore, BundleManifest};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{color_r2, format_price, format_timestamp, print_json, print_table, OutputFormat};

/// Row for the schema table
#[derive(Tabled, Serialize)]
struct ColumnRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Labels")]
    labels: usize,
    #[tabled(rename = "Fallback")]
    fallback: String,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    columns: Vec<ColumnRow>,
    encoders: &'a CategoricalEncoders,
    manifest: Option<&'a BundleManifest>,
}

/// Load a bundle and describe its schema, encoders and metrics
pub fn inspect_bundle(artifacts: &Path, format: OutputFormat) -> Result<()> {
    let bundle = ArtifactStore::new(artifacts)
        .load()
        .with_context(|| format!("Failed to load artifact bundle from {}", artifacts.display()))?;

    let encoders = bundle.encoder().encoders();
    let columns: Vec<ColumnRow> = bundle
        .schema()
        .columns()
        .iter()
        .enumerate()
        .map(|(position, column)| match encoders.get(column) {
            Some(encoder) => ColumnRow {
                position,
                column: column.clone(),
                kind: "categorical".to_string(),
                labels: encoder.len(),
                fallback: encoder.fallback_label().to_string(),
            },
            None => ColumnRow {
                position,
                column: column.clone(),
                kind: "numeric".to_string(),
                labels: 0,
                fallback: "-".to_string(),
            },
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&InspectReport {
            columns,
            encoders,
            manifest: bundle.manifest(),
        })?,
        OutputFormat::Table => {
            println!("{}", "Artifact Bundle".bold());
            println!("{}", "=".repeat(60));
            println!("Directory:   {}", artifacts.display().to_string().cyan());
            println!("Model:       {}", bundle.model().kind());
            if let Some(manifest) = bundle.manifest() {
                println!("Target:      {}", manifest.target_column);
                println!("Trained At:  {}", format_timestamp(&manifest.trained_at));
                println!("Trees:       {}", manifest.tree_count);
            }
            println!();

            print_table(&columns, format);

            if let Some(manifest) = bundle.manifest() {
                println!();
                println!("{}", "Evaluation".bold());
                println!("{}", "-".repeat(60));
                for (name, metrics) in [("validation", &manifest.validation), ("test", &manifest.test)] {
                    println!(
                        "{:<11} R² {}  MAE {}  RMSE {}  ({} rows)",
                        name,
                        color_r2(metrics.r2),
                        format_price(metrics.mae, estimator_lib::CURRENCY),
                        format_price(metrics.rmse, estimator_lib::CURRENCY),
                        metrics.samples
                    );
                }
            }
        }
    }

    Ok(())
}

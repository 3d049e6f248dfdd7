//! Estato CLI
//!
//! A command-line tool for training the house-price model, requesting
//! predictions and checking on the prediction service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, inspect, predict, train};
use estimator_lib::forest::{ForestConfig, TreeConfig};
use estimator_lib::training::{TrainConfig, DEFAULT_DROP_COLUMN, DEFAULT_SEED, DEFAULT_TARGET_COLUMN};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Estato house-price estimator CLI
#[derive(Parser)]
#[command(name = "estato")]
#[command(author, version, about = "CLI for the Estato house-price estimator", long_about = None)]
pub struct Cli {
    /// Prediction service URL (can also be set via ESTATO_API_URL env var)
    #[arg(long, env = "ESTATO_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model bundle from a CSV dataset
    Train {
        /// CSV file with a header row
        #[arg(long)]
        dataset: PathBuf,

        /// Directory the bundle is written to
        #[arg(long, default_value = "model")]
        artifacts: PathBuf,

        /// Directory for the error report and accuracy plot (defaults to --artifacts)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Regression target column
        #[arg(long, default_value = DEFAULT_TARGET_COLUMN)]
        target: String,

        /// Column to drop before fitting (repeatable)
        #[arg(long = "drop", default_value = DEFAULT_DROP_COLUMN)]
        drop_columns: Vec<String>,

        /// Number of trees
        #[arg(long, default_value_t = 200)]
        trees: usize,

        /// Maximum tree depth
        #[arg(long, default_value_t = 20)]
        max_depth: usize,

        /// Features considered per split (all when omitted)
        #[arg(long)]
        max_features: Option<usize>,

        /// Random seed for splitting and bootstrap sampling
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Skip the accuracy plot
        #[arg(long)]
        no_plot: bool,
    },

    /// Estimate the price of one property
    Predict {
        /// Feature value as KEY=VALUE (repeatable)
        #[arg(long = "field", value_parser = predict::parse_field)]
        fields: Vec<(String, String)>,

        /// Feature object as JSON
        #[arg(long, conflicts_with = "fields")]
        json: Option<String>,

        /// Predict locally from this bundle instead of calling the service
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Show prediction service health
    Health,

    /// Describe an artifact bundle
    Inspect {
        /// Bundle directory (defaults to the config file value, then `model`)
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    match cli.command {
        Commands::Train {
            dataset,
            artifacts,
            report_dir,
            target,
            drop_columns,
            trees,
            max_depth,
            max_features,
            seed,
            no_plot,
        } => {
            let train_config = TrainConfig {
                target_column: target,
                drop_columns,
                forest: ForestConfig {
                    n_trees: trees,
                    tree: TreeConfig {
                        max_depth,
                        max_features,
                        ..Default::default()
                    },
                    bootstrap: true,
                },
                seed,
                report_dir: report_dir.unwrap_or_else(|| artifacts.clone()),
                artifact_dir: artifacts,
                write_plot: !no_plot,
            };
            train::run_training(dataset, train_config, cli.format).await?;
        }
        Commands::Predict {
            fields,
            json,
            artifacts,
        } => {
            let payload = predict::build_payload(&fields, json.as_deref())?;
            match artifacts {
                Some(dir) => predict::predict_local(&dir, &payload, cli.format)?,
                None => {
                    let client = client::ApiClient::new(&config.api_url(cli.api_url.as_deref()))?;
                    predict::predict_remote(&client, &payload, cli.format).await?;
                }
            }
        }
        Commands::Health => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url.as_deref()))?;
            health::show_health(&client, cli.format).await?;
        }
        Commands::Inspect { artifacts } => {
            let dir = artifacts
                .or_else(|| config.artifact_dir.clone())
                .unwrap_or_else(|| PathBuf::from("model"));
            inspect::inspect_bundle(&dir, cli.format)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

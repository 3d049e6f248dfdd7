//! Offline training pipeline
//!
//! load CSV -> drop identifier columns -> encode -> 70/15/15 split -> fit
//! forest on log prices -> evaluate in price units -> write reports -> commit
//! bundle. Any failure before the commit leaves the artifact directory as it
//! was.

mod metrics;
mod report;

pub use metrics::{evaluate, mean_absolute_error, r2_score, root_mean_squared_error};
pub use report::{error_report, write_error_report, ErrorReportRow, ACCURACY_PLOT_FILE, ERROR_REPORT_FILE};

#[cfg(feature = "plot")]
pub use report::write_accuracy_plot;

use crate::bundle::{ArtifactStore, BundleError, BundleManifest};
use crate::dataset::{prepare, three_way_split, DatasetError, PreparedDataset, RawTable};
use crate::encoding::inverse_target;
use crate::forest::{ForestConfig, ForestError, RandomForest, Regressor};
use crate::models::{EvaluationMetrics, SplitSizes};
use crate::observability::StructuredLogger;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Default regression target
pub const DEFAULT_TARGET_COLUMN: &str = "PricePKR";

/// Identifier-like column removed before fitting
pub const DEFAULT_DROP_COLUMN: &str = "Street Number";

pub const DEFAULT_SEED: u64 = 42;

/// Errors that abort a training run
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Forest(#[from] ForestError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Training run configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub target_column: String,
    pub drop_columns: Vec<String>,
    pub forest: ForestConfig,
    pub seed: u64,
    pub artifact_dir: PathBuf,
    pub report_dir: PathBuf,
    /// Render the accuracy chart when the `plot` feature is built
    pub write_plot: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            drop_columns: vec![DEFAULT_DROP_COLUMN.to_string()],
            forest: ForestConfig::default(),
            seed: DEFAULT_SEED,
            artifact_dir: PathBuf::from("model"),
            report_dir: PathBuf::from("model"),
            write_plot: true,
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub manifest: BundleManifest,
    pub validation: EvaluationMetrics,
    pub test: EvaluationMetrics,
    pub split: SplitSizes,
    pub dropped_columns: Vec<String>,
    pub error_report_path: PathBuf,
    pub plot_path: Option<PathBuf>,
}

pub struct Trainer {
    config: TrainConfig,
    logger: StructuredLogger,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            logger: StructuredLogger::new("estato-trainer"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train on a CSV dataset and commit the bundle
    pub fn run(&self, dataset: &Path) -> Result<TrainingOutcome, TrainError> {
        info!(dataset = %dataset.display(), "Loading dataset");
        let table = RawTable::from_csv(dataset)?;
        self.run_table(table)
    }

    pub fn run_table(&self, mut table: RawTable) -> Result<TrainingOutcome, TrainError> {
        let start = Instant::now();
        let dropped_columns = table.drop_columns(&self.config.drop_columns);
        if !dropped_columns.is_empty() {
            info!(columns = ?dropped_columns, "Dropped identifier columns");
        }

        let prepared = prepare(&table, &self.config.target_column)?;
        let split = three_way_split(prepared.len(), self.config.seed)?;
        let split_sizes = SplitSizes {
            train: split.train.len(),
            validation: split.validation.len(),
            test: split.test.len(),
        };
        info!(
            rows = prepared.len(),
            features = prepared.encoder.schema().len(),
            train = split_sizes.train,
            validation = split_sizes.validation,
            test = split_sizes.test,
            "Dataset prepared"
        );

        let (train_x, train_y) = gather(&prepared, &split.train);
        let forest = RandomForest::fit(&train_x, &train_y, &self.config.forest, self.config.seed)?;

        let (validation, _) = self.evaluate_partition(&forest, &prepared, &split.validation, "validation");
        let (test, test_predictions) = self.evaluate_partition(&forest, &prepared, &split.test, "test");
        let test_actual: Vec<f64> = split.test.iter().map(|&i| prepared.prices[i]).collect();

        let manifest = BundleManifest::for_forest(
            &forest,
            self.config.target_column.clone(),
            split_sizes,
            validation,
            test,
        );
        let store = ArtifactStore::new(&self.config.artifact_dir);
        let manifest = store.save(&forest, &prepared.encoder, manifest)?;

        // Reports follow the commit so a failed save leaves the previous ones alone
        std::fs::create_dir_all(&self.config.report_dir).map_err(|source| TrainError::Io {
            path: self.config.report_dir.clone(),
            source,
        })?;
        let error_report_path = self.config.report_dir.join(ERROR_REPORT_FILE);
        write_error_report(&error_report_path, &error_report(&test_actual, &test_predictions)).map_err(
            |source| TrainError::Report {
                path: error_report_path.clone(),
                source,
            },
        )?;
        let plot_path = self.render_plot(&test_actual, &test_predictions, test.r2);

        self.logger.log_training_completed(
            prepared.len(),
            prepared.encoder.schema().len(),
            forest.n_trees(),
            start.elapsed().as_secs_f64(),
        );

        Ok(TrainingOutcome {
            manifest,
            validation,
            test,
            split: split_sizes,
            dropped_columns,
            error_report_path,
            plot_path,
        })
    }

    /// Metrics in price units plus the predicted prices in partition order
    fn evaluate_partition(
        &self,
        forest: &RandomForest,
        data: &PreparedDataset,
        rows: &[usize],
        partition: &str,
    ) -> (EvaluationMetrics, Vec<f64>) {
        let actual: Vec<f64> = rows.iter().map(|&i| data.prices[i]).collect();
        let predicted: Vec<f64> = rows
            .iter()
            .map(|&i| inverse_target(forest.predict(&data.features[i])))
            .collect();
        let metrics = evaluate(&actual, &predicted);
        self.logger
            .log_evaluation(partition, metrics.r2, metrics.mae, metrics.rmse, metrics.samples);
        (metrics, predicted)
    }

    #[cfg(feature = "plot")]
    fn render_plot(&self, actual: &[f64], predicted: &[f64], r2: f64) -> Option<PathBuf> {
        if !self.config.write_plot {
            return None;
        }
        let path = self.config.report_dir.join(ACCURACY_PLOT_FILE);
        match write_accuracy_plot(&path, actual, predicted, r2) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Accuracy plot not written");
                None
            }
        }
    }

    #[cfg(not(feature = "plot"))]
    fn render_plot(&self, _actual: &[f64], _predicted: &[f64], _r2: f64) -> Option<PathBuf> {
        if self.config.write_plot {
            warn!("Built without the plot feature, skipping accuracy plot");
        }
        None
    }
}

fn gather(data: &PreparedDataset, rows: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    rows.iter()
        .map(|&i| (data.features[i].clone(), data.targets[i]))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{MANIFEST_FILE, MODEL_FILE};
    use crate::forest::TreeConfig;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    const CITIES: [&str; 3] = ["Islamabad", "Karachi", "Lahore"];

    fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
        let mut csv = String::from("Street Number,Area,Bedrooms,City,PricePKR\n");
        for i in 0..rows {
            let area = 500 + i * 25;
            let bedrooms = 1 + i % 5;
            let city = CITIES[i % 3];
            let price = area * 15_000 + bedrooms * 400_000 + (i % 3) * 1_000_000;
            writeln!(csv, "{},{},{},{},{}", 100 + i, area, bedrooms, city, price).unwrap();
        }
        let path = dir.join("houses.csv");
        std::fs::write(&path, csv).unwrap();
        path
    }

    fn config(dir: &Path) -> TrainConfig {
        TrainConfig {
            forest: ForestConfig {
                n_trees: 8,
                tree: TreeConfig {
                    max_depth: 10,
                    ..Default::default()
                },
                bootstrap: true,
            },
            artifact_dir: dir.join("model"),
            report_dir: dir.join("reports"),
            write_plot: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_training_run_writes_bundle_and_report() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), 40);

        let outcome = Trainer::new(config(dir.path())).run(&dataset).unwrap();

        assert_eq!(outcome.dropped_columns, vec!["Street Number"]);
        assert_eq!(
            outcome.split,
            SplitSizes {
                train: 28,
                validation: 6,
                test: 6
            }
        );
        assert_eq!(outcome.manifest.tree_count, 8);
        assert_eq!(outcome.manifest.feature_count, 3);
        assert!(outcome.validation.r2.is_finite());
        assert!(outcome.test.rmse >= 0.0);

        let report = std::fs::read_to_string(&outcome.error_report_path).unwrap();
        assert_eq!(report.lines().count(), 1 + 6);

        let bundle = ArtifactStore::new(dir.path().join("model")).load().unwrap();
        assert_eq!(bundle.schema().columns(), ["Area", "Bedrooms", "City"]);
        assert!(bundle.encoder().is_categorical("City"));
        assert!(!bundle.schema().contains("Street Number"));
    }

    #[test]
    fn test_same_seed_same_model() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let dataset = write_dataset(dir_a.path(), 30);

        Trainer::new(config(dir_a.path())).run(&dataset).unwrap();
        Trainer::new(config(dir_b.path())).run(&dataset).unwrap();

        let a = std::fs::read(dir_a.path().join("model").join(MODEL_FILE)).unwrap();
        let b = std::fs::read(dir_b.path().join("model").join(MODEL_FILE)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_failed_run_leaves_existing_bundle() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), 30);
        Trainer::new(config(dir.path())).run(&dataset).unwrap();
        let manifest_path = dir.path().join("model").join(MANIFEST_FILE);
        let before = std::fs::read(&manifest_path).unwrap();

        let bad = TrainConfig {
            target_column: "Price".to_string(),
            ..config(dir.path())
        };
        let err = Trainer::new(bad).run(&dataset).unwrap_err();
        assert!(matches!(err, TrainError::Dataset(DatasetError::MissingTarget(_))));
        assert_eq!(std::fs::read(&manifest_path).unwrap(), before);
    }

    #[test]
    fn test_failed_commit_keeps_previous_report() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), 30);
        let shared = TrainConfig {
            report_dir: dir.path().join("model"),
            ..config(dir.path())
        };
        let outcome = Trainer::new(shared.clone()).run(&dataset).unwrap();
        let report_before = std::fs::read(&outcome.error_report_path).unwrap();

        // Block the manifest staging path so the bundle commit fails
        std::fs::create_dir(dir.path().join("model").join(format!("{}.tmp", MANIFEST_FILE))).unwrap();
        let reseeded = TrainConfig { seed: 7, ..shared };
        let err = Trainer::new(reseeded).run(&dataset).unwrap_err();
        assert!(matches!(err, TrainError::Bundle(_)));

        assert_eq!(std::fs::read(&outcome.error_report_path).unwrap(), report_before);
        assert!(ArtifactStore::new(dir.path().join("model")).load().is_ok());
    }

    #[test]
    fn test_too_few_rows() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), 3);
        let err = Trainer::new(config(dir.path())).run(&dataset).unwrap_err();
        assert!(matches!(
            err,
            TrainError::Dataset(DatasetError::InsufficientRows { rows: 3 })
        ));
        assert!(!dir.path().join("model").exists());
    }

    #[test]
    fn test_missing_dataset_file() {
        let dir = TempDir::new().unwrap();
        let err = Trainer::new(config(dir.path()))
            .run(&dir.path().join("nope.csv"))
            .unwrap_err();
        assert!(matches!(err, TrainError::Dataset(DatasetError::Csv(_))));
    }
}

//! Artifact bundle persistence
//!
//! The trainer writes, and the predictor reads, a directory holding:
//! - `model.json`: the fitted forest
//! - `encoders.json`: column name to label encoder
//! - `model_columns.json`: schema as a JSON array
//! - `manifest.json`: metadata plus SHA256 checksums of the three files above
//!
//! Payload files are staged as `*.tmp` and renamed into place only once all
//! of them are on disk; the manifest is committed last. A bundle without a
//! manifest, or whose checksums disagree, is refused on load.

use crate::encoding::{CategoricalEncoders, ColumnSchema, EncodeError, FeatureEncoder};
use crate::forest::{ForestError, RandomForest, Regressor, RANDOM_FOREST_KIND};
use crate::models::{EvaluationMetrics, SplitSizes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MODEL_FILE: &str = "model.json";
pub const ENCODERS_FILE: &str = "encoders.json";
pub const COLUMNS_FILE: &str = "model_columns.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current on-disk layout version
pub const FORMAT_VERSION: u32 = 1;

/// Errors raised while saving or loading a bundle
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {0} not found")]
    MissingArtifact(PathBuf),

    #[error("failed to (de)serialize {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("manifest has no checksum for {0}")]
    MissingChecksum(String),

    #[error("unsupported bundle format version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported model kind '{0}'")]
    UnsupportedModel(String),

    #[error("model expects {model} features but schema has {schema}")]
    FeatureCountMismatch { model: usize, schema: usize },

    #[error(transparent)]
    Encoding(#[from] EncodeError),

    #[error(transparent)]
    Forest(#[from] ForestError),
}

/// Metadata written alongside the payload files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub model_kind: String,
    pub target_column: String,
    pub trained_at: DateTime<Utc>,
    pub feature_count: usize,
    pub tree_count: usize,
    pub split: SplitSizes,
    pub validation: EvaluationMetrics,
    pub test: EvaluationMetrics,
    /// File name to hex SHA256 digest
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

impl BundleManifest {
    /// Manifest for a freshly fitted forest; checksums are filled in on save
    pub fn for_forest(
        forest: &RandomForest,
        target_column: impl Into<String>,
        split: SplitSizes,
        validation: EvaluationMetrics,
        test: EvaluationMetrics,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model_kind: RANDOM_FOREST_KIND.to_string(),
            target_column: target_column.into(),
            trained_at: Utc::now(),
            feature_count: forest.n_features(),
            tree_count: forest.n_trees(),
            split,
            validation,
            test,
            checksums: BTreeMap::new(),
        }
    }
}

/// Immutable {model, encoders, schema} triple used for serving
pub struct ModelBundle {
    model: Arc<dyn Regressor>,
    encoder: FeatureEncoder,
    manifest: Option<BundleManifest>,
}

impl ModelBundle {
    pub fn new(model: Arc<dyn Regressor>, encoder: FeatureEncoder) -> Result<Self, BundleError> {
        if model.n_features() != encoder.schema().len() {
            return Err(BundleError::FeatureCountMismatch {
                model: model.n_features(),
                schema: encoder.schema().len(),
            });
        }
        Ok(Self {
            model,
            encoder,
            manifest: None,
        })
    }

    pub fn with_manifest(mut self, manifest: BundleManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn schema(&self) -> &ColumnSchema {
        self.encoder.schema()
    }

    pub fn manifest(&self) -> Option<&BundleManifest> {
        self.manifest.as_ref()
    }
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("model_kind", &self.model.kind())
            .field("schema", self.encoder.schema())
            .field("manifest", &self.manifest)
            .finish()
    }
}

/// Reads and writes bundles in one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a bundle. Returns the manifest with checksums filled in.
    pub fn save(
        &self,
        forest: &RandomForest,
        encoder: &FeatureEncoder,
        mut manifest: BundleManifest,
    ) -> Result<BundleManifest, BundleError> {
        let payloads = [
            (MODEL_FILE, to_json(MODEL_FILE, forest, false)?),
            (ENCODERS_FILE, to_json(ENCODERS_FILE, encoder.encoders(), true)?),
            (COLUMNS_FILE, to_json(COLUMNS_FILE, encoder.schema(), false)?),
        ];

        manifest.checksums = payloads
            .iter()
            .map(|(name, bytes)| (name.to_string(), compute_checksum(bytes)))
            .collect();
        let manifest_bytes = to_json(MANIFEST_FILE, &manifest, true)?;

        fs::create_dir_all(&self.dir).map_err(|source| BundleError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // Stage everything, manifest included, before touching the live bundle
        let mut files: Vec<(&str, &[u8])> = payloads
            .iter()
            .map(|(name, bytes)| (*name, bytes.as_slice()))
            .collect();
        files.push((MANIFEST_FILE, manifest_bytes.as_slice()));

        let mut staged = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            match self.stage(name, bytes) {
                Ok(temp_path) => staged.push((temp_path, self.dir.join(name))),
                Err(e) => {
                    discard(&staged);
                    return Err(e);
                }
            }
        }

        // The manifest is last in `staged`, so it only lands once every payload has
        for (idx, (temp_path, final_path)) in staged.iter().enumerate() {
            if let Err(source) = fs::rename(temp_path, final_path) {
                discard(&staged[idx..]);
                return Err(BundleError::Io {
                    path: final_path.clone(),
                    source,
                });
            }
        }

        info!(
            dir = %self.dir.display(),
            trees = manifest.tree_count,
            features = manifest.feature_count,
            "Artifact bundle written"
        );

        Ok(manifest)
    }

    /// Read and validate the manifest only
    pub fn read_manifest(&self) -> Result<BundleManifest, BundleError> {
        let bytes = self.read(MANIFEST_FILE)?;
        let manifest: BundleManifest = from_json(MANIFEST_FILE, &bytes)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(BundleError::UnsupportedVersion(manifest.format_version));
        }
        if manifest.model_kind != RANDOM_FOREST_KIND {
            return Err(BundleError::UnsupportedModel(manifest.model_kind));
        }
        Ok(manifest)
    }

    /// Load and verify a complete bundle
    pub fn load(&self) -> Result<ModelBundle, BundleError> {
        let manifest = self.read_manifest()?;

        let forest: RandomForest = from_json(MODEL_FILE, &self.read_verified(MODEL_FILE, &manifest)?)?;
        let encoders: CategoricalEncoders =
            from_json(ENCODERS_FILE, &self.read_verified(ENCODERS_FILE, &manifest)?)?;
        let schema: ColumnSchema = from_json(COLUMNS_FILE, &self.read_verified(COLUMNS_FILE, &manifest)?)?;

        forest.validate()?;
        let encoder = FeatureEncoder::new(schema, encoders)?;

        debug!(
            dir = %self.dir.display(),
            trees = forest.n_trees(),
            "Artifact bundle verified"
        );

        Ok(ModelBundle::new(Arc::new(forest), encoder)?.with_manifest(manifest))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, BundleError> {
        let path = self.dir.join(name);
        fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                BundleError::MissingArtifact(path)
            } else {
                BundleError::Io { path, source }
            }
        })
    }

    fn read_verified(&self, name: &str, manifest: &BundleManifest) -> Result<Vec<u8>, BundleError> {
        let expected = manifest
            .checksums
            .get(name)
            .ok_or_else(|| BundleError::MissingChecksum(name.to_string()))?;
        let bytes = self.read(name)?;
        let actual = compute_checksum(&bytes);
        if &actual != expected {
            warn!(file = name, "Artifact checksum mismatch");
            return Err(BundleError::ChecksumMismatch {
                file: name.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(bytes)
    }

    /// Write `bytes` to `<name>.tmp` and sync it
    fn stage(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, BundleError> {
        let temp_path = self.dir.join(format!("{}.tmp", name));
        let io_err = |source| BundleError::Io {
            path: temp_path.clone(),
            source,
        };
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(temp_path)
    }
}

/// Remove staged temp files; best effort
fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (temp_path, _) in staged {
        let _ = fs::remove_file(temp_path);
    }
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn to_json<T: Serialize + ?Sized>(file: &str, value: &T, pretty: bool) -> Result<Vec<u8>, BundleError> {
    let result = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    result.map_err(|source| BundleError::Json {
        file: file.to_string(),
        source,
    })
}

fn from_json<T: for<'de> Deserialize<'de>>(file: &str, bytes: &[u8]) -> Result<T, BundleError> {
    serde_json::from_slice(bytes).map_err(|source| BundleError::Json {
        file: file.to_string(),
        source,
    })
}

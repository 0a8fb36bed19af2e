//! Fitted artifact bundle and its on-disk store.
//!
//! A bundle is created once per training run and never mutated; a new
//! training run writes a wholly new bundle over the old file. Writes go
//! to a temporary sibling first and are renamed into place, so readers
//! only ever see a complete bundle.

use crate::{
    balancer::ClassCounts,
    encoder::CategoryEncoder,
    error::{PipelineError, PipelineResult},
    evaluation::EvaluationReport,
    features::FeatureFrame,
    gbdt::GbdtClassifier,
    matrix::Matrix,
    schema::FeatureSchema,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use uuid::Uuid;

/// Bump when the bundle layout changes incompatibly.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub rows:               usize,
    pub class_counts:       ClassCounts,
    pub train_rows:         usize,
    pub holdout_rows:       usize,
    pub balanced_counts:    ClassCounts,
    pub synthetic_rows:     usize,
    pub seed:               u64,
    pub feature_names:      Vec<String>,
    pub holdout:            Option<EvaluationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub format_version:    u32,
    pub bundle_id:         Uuid,
    pub created_at:        DateTime<Utc>,
    pub schema:            FeatureSchema,
    pub encoder:           CategoryEncoder,
    pub classifier:        GbdtClassifier,
    /// Encoded columns kept by feature selection, ascending.
    pub selected_features: Option<Vec<usize>>,
    pub summary:           TrainingSummary,
}

impl ArtifactBundle {
    pub fn new(
        schema: FeatureSchema,
        encoder: CategoryEncoder,
        classifier: GbdtClassifier,
        selected_features: Option<Vec<usize>>,
        summary: TrainingSummary,
    ) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            bundle_id: Uuid::new_v4(),
            created_at: Utc::now(),
            schema,
            encoder,
            classifier,
            selected_features,
            summary,
        }
    }

    /// Encode a frame exactly as the classifier saw it at training time:
    /// schema check, one-hot encoding, then the selected column subset.
    pub fn encode(&self, frame: &FeatureFrame) -> PipelineResult<Matrix> {
        self.schema.ensure_compatible(&frame.schema)?;
        let encoded = self.encoder.transform(frame)?;
        Ok(match &self.selected_features {
            Some(cols) => encoded.select_columns(cols),
            None => encoded,
        })
    }

    /// Cancellation probability for every row of `frame`.
    pub fn predict_proba(&self, frame: &FeatureFrame) -> PipelineResult<Vec<f64>> {
        let x = self.encode(frame)?;
        self.classifier.predict_proba(&x)
    }

    /// Names of the columns the classifier consumes, in order.
    pub fn model_feature_names(&self) -> Vec<String> {
        let names = self.encoder.feature_names();
        match &self.selected_features {
            Some(cols) => cols.iter().map(|&c| names[c].clone()).collect(),
            None => names.to_vec(),
        }
    }

    fn check_consistency(&self) -> Result<(), String> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(format!(
                "bundle format version {} is not supported (expected {})",
                self.format_version, BUNDLE_FORMAT_VERSION
            ));
        }
        if !self.encoder.is_consistent() {
            return Err("encoder blocks, categories and output columns disagree".into());
        }
        let width = self.encoder.width();
        let model_width = match &self.selected_features {
            Some(cols) => {
                if let Some(bad) = cols.iter().find(|&&c| c >= width) {
                    return Err(format!("selected feature index {bad} exceeds encoded width {width}"));
                }
                if cols.windows(2).any(|w| w[0] >= w[1]) {
                    return Err("selected feature indices are not strictly ascending".into());
                }
                cols.len()
            }
            None => width,
        };
        if model_width != self.classifier.n_features() {
            return Err(format!(
                "classifier expects {} features but the encoder/selection yields {model_width}",
                self.classifier.n_features()
            ));
        }
        if !self.classifier.is_consistent() {
            return Err("classifier trees reference invalid nodes or features".into());
        }
        Ok(())
    }
}

/// A single named location for the current bundle.
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `bundle`, replacing whatever is stored. All-or-nothing.
    pub fn save(&self, bundle: &ArtifactBundle) -> PipelineResult<()> {
        let json = serde_json::to_vec(bundle)?;
        write_atomically(&self.path, &json)?;
        log::info!(
            "artifact: saved bundle {} ({} bytes) to {}",
            bundle.bundle_id, json.len(), self.path.display()
        );
        Ok(())
    }

    /// Load the stored bundle. Any failure is `ArtifactUnavailable`;
    /// there is no fallback model.
    pub fn load(&self) -> PipelineResult<ArtifactBundle> {
        let unavailable = |reason: String| PipelineError::ArtifactUnavailable {
            path: self.path.display().to_string(),
            reason,
        };

        let bytes = fs::read(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let bundle: ArtifactBundle = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("corrupt bundle: {e}")))?;
        bundle.check_consistency().map_err(unavailable)?;

        log::info!(
            "artifact: loaded bundle {} created_at={} from {}",
            bundle.bundle_id, bundle.created_at, self.path.display()
        );
        Ok(bundle)
    }
}

/// A fully written temporary sibling of its destination, not yet visible
/// under the destination name. Dropping it without `commit` removes it.
#[derive(Debug)]
pub struct StagedFile {
    tmp:       PathBuf,
    dest:      PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Write `bytes` to a temporary sibling of `dest` and fsync it.
    pub fn write(dest: &Path, bytes: &[u8]) -> PipelineResult<Self> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file_name = dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".into());
        let tmp = dest.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
        let staged = Self { tmp, dest: dest.to_path_buf(), committed: false };

        let mut f = fs::File::create(&staged.tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        Ok(staged)
    }

    /// Rename the staged file over its destination.
    pub fn commit(mut self) -> PipelineResult<()> {
        fs::rename(&self.tmp, &self.dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Write `bytes` to a temporary sibling of `path`, fsync, then rename over `path`.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    StagedFile::write(path, bytes)?.commit()
}

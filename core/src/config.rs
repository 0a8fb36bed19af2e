use crate::{
    balancer::BalancerConfig,
    error::{PipelineError, PipelineResult},
    gbdt::GbdtConfig,
    schema,
    selector::SelectionConfig,
    threshold::Cutoff,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Every tunable of a training or scoring run. Loaded from one JSON file;
/// any field left out takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed. Split, balancing, selection and boosting each derive
    /// their own stream from it.
    pub seed:                u64,
    pub cutoff:              Cutoff,
    /// Columns to one-hot encode. Must name exactly the categorical
    /// features of the schema.
    pub categorical_columns: Vec<String>,
    /// Share of labelled rows held out for evaluation (0 disables).
    pub holdout_fraction:    f64,
    pub balancer:            BalancerConfig,
    /// `None` disables recursive feature elimination.
    pub feature_selection:   Option<SelectionConfig>,
    pub classifier:          GbdtConfig,
    pub artifact_path:       PathBuf,
    pub export_path:         PathBuf,
    /// Date durations and ages are measured against. `None` means today.
    pub reference_date:      Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed:                42,
            cutoff:              Cutoff::default(),
            categorical_columns: default_categorical_columns(),
            holdout_fraction:    0.2,
            balancer:            BalancerConfig::default(),
            feature_selection:   Some(SelectionConfig::default()),
            classifier:          GbdtConfig::default(),
            artifact_path:       PathBuf::from("models/churn_bundle.json"),
            export_path:         PathBuf::from("models/active_contracts_scored.csv"),
            reference_date:      None,
        }
    }
}

fn default_categorical_columns() -> Vec<String> {
    [
        schema::INSURANCE_TYPE,
        schema::GENDER,
        schema::EDUCATION,
        schema::SALES_CHANNEL,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl PipelineConfig {
    /// Load and validate the JSON config at `path`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()
            .map_err(|e| anyhow::anyhow!("Invalid config {path}: {e}"))?;
        Ok(config)
    }

    /// Small, fast configuration for tests.
    pub fn default_test() -> Self {
        Self {
            classifier: GbdtConfig {
                n_trees:          60,
                learning_rate:    0.1,
                max_depth:        3,
                min_samples_leaf: 3,
                log_every:        0,
                ..GbdtConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..0.5).contains(&self.holdout_fraction) {
            return Err(PipelineError::Config(format!(
                "holdout_fraction must be in [0, 0.5), got {}", self.holdout_fraction
            )));
        }
        if self.categorical_columns.is_empty() {
            return Err(PipelineError::Config("categorical_columns must not be empty".into()));
        }
        if self.balancer.k_neighbors == 0 {
            return Err(PipelineError::Config("balancer.k_neighbors must be at least 1".into()));
        }
        if let Some(selection) = &self.feature_selection {
            if selection.target_features == 0 {
                return Err(PipelineError::Config(
                    "feature_selection.target_features must be at least 1".into(),
                ));
            }
        }
        self.classifier.validate()
    }

    pub fn cutoff(&self) -> Cutoff {
        self.cutoff
    }
}

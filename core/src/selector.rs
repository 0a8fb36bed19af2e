//! Recursive feature elimination.
//!
//! Repeatedly fit a proxy GBDT on the surviving columns, drop the single
//! least important one, and stop when `target_features` remain. Among
//! equally unimportant columns the one furthest right in the encoded
//! layout is dropped first. The proxy is refitted from the same seed at
//! every step, so a fixed seed always yields the same index set.

use crate::{
    error::{PipelineError, PipelineResult},
    gbdt::{GbdtClassifier, GbdtConfig},
    matrix::Matrix,
    rng::{PipelineRng, RngSlot},
    types::Label,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub target_features: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { target_features: 10 }
    }
}

pub struct FeatureSelector {
    target: usize,
    proxy:  GbdtConfig,
    seed:   u64,
}

impl FeatureSelector {
    pub fn new(config: &SelectionConfig, classifier: &GbdtConfig, seed: u64) -> PipelineResult<Self> {
        if config.target_features == 0 {
            return Err(PipelineError::Config(
                "feature_selection.target_features must be at least 1".into(),
            ));
        }
        Ok(Self { target: config.target_features, proxy: classifier.proxy(), seed })
    }

    /// Indices (into the columns of `x`) of the retained features,
    /// ascending, so applying them preserves encoded column order.
    pub fn select(&self, x: &Matrix, y: &[Label]) -> PipelineResult<Vec<usize>> {
        let mut remaining: Vec<usize> = (0..x.n_cols()).collect();
        if self.target >= remaining.len() {
            log::info!(
                "select: target={} >= available={}; keeping every column",
                self.target, remaining.len()
            );
            return Ok(remaining);
        }

        while remaining.len() > self.target {
            let sub = x.select_columns(&remaining);
            let mut rng = PipelineRng::for_slot(self.seed, RngSlot::Selector);
            let proxy = GbdtClassifier::fit(&self.proxy, &sub, y, &mut rng)?;
            let importance = proxy.feature_importances();

            let weakest = weakest_position(&importance);
            let dropped = remaining.remove(weakest);
            log::debug!(
                "select: dropped column {dropped} (importance={:.6}), {} remain",
                importance[weakest], remaining.len()
            );
        }

        Ok(remaining)
    }
}

/// Position of the minimum importance; the last one wins ties.
fn weakest_position(importance: &[f64]) -> usize {
    let mut weakest = 0;
    for (i, &v) in importance.iter().enumerate() {
        if v <= importance[weakest] {
            weakest = i;
        }
    }
    weakest
}

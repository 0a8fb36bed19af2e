//! Gradient-boosted decision-tree binary classifier.
//!
//! Logistic loss, Newton leaf values, shrinkage, and per-tree row
//! subsampling drawn from the classifier's deterministic RNG stream.
//! Every `fit` starts from scratch; there is no incremental update.

mod tree;

pub use tree::{Node, RegressionTree, TreeBuilder, TreeConfig};

use crate::{
    error::{PipelineError, PipelineResult},
    evaluation,
    matrix::Matrix,
    rng::PipelineRng,
    types::Label,
};
use serde::{Deserialize, Serialize};

/// GBDT training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub n_trees:           usize,
    pub learning_rate:     f64,
    pub max_depth:         usize,
    pub min_samples_leaf:  usize,
    pub l2_regularization: f64,
    pub min_split_gain:    f64,
    /// Fraction of rows drawn (without replacement) for each tree.
    pub subsample:         f64,
    /// Log training loss every this many trees (0 = never).
    pub log_every:         usize,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_trees:           200,
            learning_rate:     0.05,
            max_depth:         4,
            min_samples_leaf:  5,
            l2_regularization: 1.0,
            min_split_gain:    1e-9,
            subsample:         0.8,
            log_every:         50,
        }
    }
}

impl GbdtConfig {
    /// A smaller, faster model used to rank features during selection.
    pub fn proxy(&self) -> Self {
        Self {
            n_trees:   (self.n_trees / 4).max(10),
            max_depth: self.max_depth.min(3),
            log_every: 0,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.n_trees == 0 {
            return Err(PipelineError::Config("classifier.n_trees must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(PipelineError::Config(format!(
                "classifier.learning_rate must be in (0, 1], got {}", self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(PipelineError::Config(format!(
                "classifier.subsample must be in (0, 1], got {}", self.subsample
            )));
        }
        if self.l2_regularization < 0.0 {
            return Err(PipelineError::Config("classifier.l2_regularization must be >= 0".into()));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth:         self.max_depth,
            min_samples_leaf:  self.min_samples_leaf,
            l2_regularization: self.l2_regularization,
            min_split_gain:    self.min_split_gain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtClassifier {
    config:      GbdtConfig,
    n_features:  usize,
    /// Initial log-odds of the positive class.
    base_score:  f64,
    trees:       Vec<RegressionTree>,
    /// Total split gain per feature over all trees.
    gain:        Vec<f64>,
}

impl GbdtClassifier {
    /// Fit a new model on `x` / `y`.
    pub fn fit(
        config: &GbdtConfig,
        x: &Matrix,
        y: &[Label],
        rng: &mut PipelineRng,
    ) -> PipelineResult<Self> {
        config.validate()?;
        if x.n_rows() != y.len() {
            return Err(PipelineError::Config(format!(
                "classifier got {} rows but {} labels", x.n_rows(), y.len()
            )));
        }
        if x.is_empty() {
            return Err(PipelineError::DataUnavailable("cannot fit classifier on 0 rows".into()));
        }

        let n = x.n_rows();
        let targets: Vec<f64> = y.iter().map(|&l| l as f64).collect();
        let positive_rate = (targets.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (positive_rate / (1.0 - positive_rate)).ln();

        let rows: Vec<&[f64]> = x.rows().collect();
        let tree_config = config.tree_config();
        let mut raw = vec![base_score; n];
        let mut gradients = vec![0.0; n];
        let mut hessians = vec![0.0; n];
        let mut trees = Vec::with_capacity(config.n_trees);
        let mut gain = vec![0.0; x.n_cols()];

        for round in 0..config.n_trees {
            for i in 0..n {
                let p = sigmoid(raw[i]);
                gradients[i] = p - targets[i];
                hessians[i] = (p * (1.0 - p)).max(1e-16);
            }

            let sample = draw_sample(n, config.subsample, rng);
            let (tree, tree_gain) = TreeBuilder::new(&tree_config, &rows, &gradients, &hessians)
                .build(&sample);

            for (i, row) in rows.iter().enumerate() {
                raw[i] += config.learning_rate * tree.predict(row);
            }
            for (total, g) in gain.iter_mut().zip(tree_gain) {
                *total += g;
            }
            trees.push(tree);

            if config.log_every > 0 && (round + 1) % config.log_every == 0 {
                let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
                log::debug!(
                    "classifier: trees={} train_logloss={:.5}",
                    round + 1,
                    evaluation::log_loss(y, &probs)
                );
            }
        }

        let model = Self { config: config.clone(), n_features: x.n_cols(), base_score, trees, gain };

        let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
        log::info!(
            "classifier: fitted trees={} max_depth={} rows={} features={} train_logloss={:.5} train_f1={:.4}",
            model.trees.len(),
            model.trees.iter().map(RegressionTree::depth).max().unwrap_or(0),
            n,
            model.n_features,
            evaluation::log_loss(y, &probs),
            evaluation::f1_at(y, &probs, 0.5),
        );

        Ok(model)
    }

    /// Probability of the positive ("will cancel") class for each row.
    pub fn predict_proba(&self, x: &Matrix) -> PipelineResult<Vec<f64>> {
        if x.n_cols() != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "classifier expects {} features, matrix has {}", self.n_features, x.n_cols()
            )));
        }
        Ok(x.rows().map(|row| self.predict_row(row)).collect())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let raw = self.trees.iter()
            .fold(self.base_score, |acc, t| acc + self.config.learning_rate * t.predict(row));
        sigmoid(raw)
    }

    pub fn n_features(&self) -> usize { self.n_features }

    /// Split-gain importance per feature, normalized to sum to 1
    /// (all zeros if the model never split).
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.gain.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.gain.len()];
        }
        self.gain.iter().map(|g| g / total).collect()
    }

    /// Every split references a feature the model was fitted on, and its
    /// children come after it in the node list, so traversal always ends.
    pub(crate) fn is_consistent(&self) -> bool {
        self.gain.len() == self.n_features
            && self.trees.iter().all(|t| {
                let n = t.nodes.len();
                n > 0
                    && t.nodes.iter().enumerate().all(|(idx, node)| match node {
                        Node::Split { feature, left, right, .. } => {
                            *feature < self.n_features
                                && (idx + 1..n).contains(left)
                                && (idx + 1..n).contains(right)
                        }
                        Node::Leaf { value } => value.is_finite(),
                    })
            })
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Row indices for one tree, in ascending order.
fn draw_sample(n: usize, fraction: f64, rng: &mut PipelineRng) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..n).collect();
    }
    let take = ((n as f64 * fraction).round() as usize).clamp(1, n);
    let mut all: Vec<usize> = (0..n).collect();
    rng.shuffle(&mut all);
    all.truncate(take);
    all.sort_unstable();
    all
}

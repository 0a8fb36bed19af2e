//! Class balancer: SMOTE-style minority oversampling.
//!
//! RULE: Only ever applied to the training partition. Held-out rows
//! must stay real.
//!
//! For each synthetic row: pick a minority row at random, pick one of
//! its `k` nearest minority neighbours at random, and interpolate at a
//! random point on the segment between them. Synthetic rows are
//! appended after the original rows, so the original rows keep their
//! indices.
//!
//! Missing values: distances only use dimensions present in both rows;
//! an interpolated dimension missing on either side keeps the base
//! row's value.

use crate::{
    error::{PipelineError, PipelineResult},
    matrix::Matrix,
    rng::PipelineRng,
    types::Label,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Nearest same-class neighbours considered for interpolation.
    pub k_neighbors: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self { k_neighbors: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    pub fn of(labels: &[Label]) -> Self {
        let positive = labels.iter().filter(|&&l| l == 1).count();
        Self { negative: labels.len() - positive, positive }
    }

    pub fn total(&self) -> usize {
        self.negative + self.positive
    }
}

#[derive(Debug)]
pub struct Balanced {
    pub features:  Matrix,
    pub labels:    Vec<Label>,
    pub synthetic: usize,
}

pub struct ClassBalancer {
    config: BalancerConfig,
}

impl ClassBalancer {
    pub fn new(config: BalancerConfig) -> Self {
        Self { config }
    }

    /// Oversample the minority class until both classes have the same count.
    pub fn balance(
        &self,
        x: &Matrix,
        y: &[Label],
        rng: &mut PipelineRng,
    ) -> PipelineResult<Balanced> {
        if x.n_rows() != y.len() {
            return Err(PipelineError::Config(format!(
                "balancer got {} rows but {} labels", x.n_rows(), y.len()
            )));
        }
        if self.config.k_neighbors == 0 {
            return Err(PipelineError::Config("k_neighbors must be at least 1".into()));
        }

        let counts = ClassCounts::of(y);
        let minority_label: Label = if counts.positive <= counts.negative { 1 } else { 0 };
        let (minority, majority) = if minority_label == 1 {
            (counts.positive, counts.negative)
        } else {
            (counts.negative, counts.positive)
        };

        if minority == majority {
            log::info!("balance: classes already balanced ({minority}/{majority})");
            return Ok(Balanced { features: x.clone(), labels: y.to_vec(), synthetic: 0 });
        }

        let required = self.config.k_neighbors + 1;
        if minority < required {
            return Err(PipelineError::InsufficientMinority { minority, required });
        }

        let minority_rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == minority_label).collect();
        let neighbours: Vec<Vec<usize>> = minority_rows.iter()
            .map(|&i| self.nearest(x, i, &minority_rows))
            .collect();

        let to_make = majority - minority;
        let mut features = x.clone();
        let mut labels = y.to_vec();
        let mut synthetic = vec![0.0; x.n_cols()];

        for _ in 0..to_make {
            let pick = rng.next_index(minority_rows.len());
            let base = x.row(minority_rows[pick]);
            let neighbour = x.row(neighbours[pick][rng.next_index(neighbours[pick].len())]);
            let gap = rng.next_f64();

            for (j, slot) in synthetic.iter_mut().enumerate() {
                let (b, n) = (base[j], neighbour[j]);
                *slot = if b.is_nan() || n.is_nan() { b } else { b + gap * (n - b) };
            }
            features.push_row(&synthetic);
            labels.push(minority_label);
        }

        let after = ClassCounts::of(&labels);
        log::info!(
            "balance: before={}/{} after={}/{} synthetic={to_make} (negative/positive)",
            counts.negative, counts.positive, after.negative, after.positive
        );

        Ok(Balanced { features, labels, synthetic: to_make })
    }

    /// The `k` nearest rows of `candidates` to row `i`, excluding `i`.
    /// Ties are broken by row index so the result is stable.
    fn nearest(&self, x: &Matrix, i: usize, candidates: &[usize]) -> Vec<usize> {
        let origin = x.row(i);
        let mut scored: Vec<(f64, usize)> = candidates.iter()
            .filter(|&&c| c != i)
            .map(|&c| (distance(origin, x.row(c)), c))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(self.config.k_neighbors);
        scored.into_iter().map(|(_, c)| c).collect()
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

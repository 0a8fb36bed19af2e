//! Regression tree fitted to logistic-loss gradients.
//!
//! Exact-greedy CART: every distinct feature value is a split candidate
//! (`x <= threshold` goes left). Missing values follow a per-node default
//! direction learned from the data. Candidate evaluation order is fixed
//! (feature ascending, threshold ascending, missing-left before
//! missing-right) and only a strictly better gain replaces the current
//! best, so ties always resolve the same way.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature:      usize,
        threshold:    f64,
        missing_left: bool,
        left:         usize,
        right:        usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    /// Raw leaf value for one row.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, missing_left, left, right } => {
                    let v = row[*feature];
                    let go_left = if v.is_nan() { *missing_left } else { v <= *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

/// Training parameters for a single tree.
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth:        usize,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    pub min_split_gain:   f64,
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature:      usize,
    threshold:    f64,
    missing_left: bool,
    gain:         f64,
}

/// Builds one tree over a fixed set of rows.
pub struct TreeBuilder<'a> {
    config:     &'a TreeConfig,
    rows:       &'a [&'a [f64]],
    gradients:  &'a [f64],
    hessians:   &'a [f64],
    /// Total gain contributed by each feature's splits.
    importance: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        config: &'a TreeConfig,
        rows: &'a [&'a [f64]],
        gradients: &'a [f64],
        hessians: &'a [f64],
    ) -> Self {
        assert_eq!(rows.len(), gradients.len());
        assert_eq!(rows.len(), hessians.len());
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        Self { config, rows, gradients, hessians, importance: vec![0.0; n_features] }
    }

    /// Build over `sample` (row indices) and return the tree plus the
    /// per-feature split gain it accumulated.
    pub fn build(mut self, sample: &[usize]) -> (RegressionTree, Vec<f64>) {
        let mut nodes = Vec::new();
        self.build_node(sample, 0, &mut nodes);
        (RegressionTree { nodes }, self.importance)
    }

    fn build_node(&mut self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current = nodes.len();
        let (g, h) = self.sums(indices);
        let leaf = Node::Leaf { value: self.leaf_value(g, h) };

        if depth >= self.config.max_depth || indices.len() < 2 * self.config.min_samples_leaf {
            nodes.push(leaf);
            return current;
        }

        let split = match self.find_best_split(indices, g, h) {
            Some(s) => s,
            None => {
                nodes.push(leaf);
                return current;
            }
        };

        let (left_rows, right_rows) = self.partition(indices, &split);
        self.importance[split.feature] += split.gain;

        // Reserve the slot, fill in children once they exist.
        nodes.push(leaf);
        let left = self.build_node(&left_rows, depth + 1, nodes);
        let right = self.build_node(&right_rows, depth + 1, nodes);
        nodes[current] = Node::Split {
            feature:      split.feature,
            threshold:    split.threshold,
            missing_left: split.missing_left,
            left,
            right,
        };
        current
    }

    fn find_best_split(&self, indices: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let n_features = self.importance.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent_score = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        let mut present: Vec<(f64, usize)> = Vec::with_capacity(indices.len());
        for feature in 0..n_features {
            present.clear();
            let (mut g_missing, mut h_missing, mut n_missing) = (0.0, 0.0, 0usize);
            for &i in indices {
                let v = self.rows[i][feature];
                if v.is_nan() {
                    g_missing += self.gradients[i];
                    h_missing += self.hessians[i];
                    n_missing += 1;
                } else {
                    present.push((v, i));
                }
            }
            if present.len() < 2 {
                continue;
            }
            present.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for k in 0..present.len() - 1 {
                let (value, row) = present[k];
                g_left += self.gradients[row];
                h_left += self.hessians[row];
                if present[k + 1].0 == value {
                    continue;
                }
                let n_left = k + 1;
                let n_right = present.len() - n_left;

                for missing_left in [true, false] {
                    let (gl, hl, nl, gr, hr, nr) = if missing_left {
                        (g_left + g_missing, h_left + h_missing, n_left + n_missing,
                         g_total - g_left - g_missing, h_total - h_left - h_missing, n_right)
                    } else {
                        (g_left, h_left, n_left,
                         g_total - g_left, h_total - h_left, n_right + n_missing)
                    };
                    if nl < min_leaf || nr < min_leaf {
                        continue;
                    }
                    let gain = self.score(gl, hl) + self.score(gr, hr) - parent_score;
                    if gain <= self.config.min_split_gain {
                        continue;
                    }
                    if best.as_ref().map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate { feature, threshold: value, missing_left, gain });
                    }
                }
            }
        }
        best
    }

    fn partition(&self, indices: &[usize], split: &SplitCandidate) -> (Vec<usize>, Vec<usize>) {
        indices.iter().copied().partition(|&i| {
            let v = self.rows[i][split.feature];
            if v.is_nan() { split.missing_left } else { v <= split.threshold }
        })
    }

    fn sums(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| (g + self.gradients[i], h + self.hessians[i]))
    }

    /// G² / (H + λ)
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.l2_regularization)
    }

    /// Newton step: -G / (H + λ)
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.l2_regularization;
        if denom <= 0.0 { 0.0 } else { -g / denom }
    }
}

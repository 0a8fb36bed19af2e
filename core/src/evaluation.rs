//! Hold-out split and classification metrics.

use crate::{rng::PipelineRng, threshold::Cutoff, types::Label};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive:  usize,
    pub false_positive: usize,
    pub true_negative:  usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn at(labels: &[Label], probabilities: &[f64], cutoff: f64) -> Self {
        let mut m = Self::default();
        for (&y, &p) in labels.iter().zip(probabilities) {
            match (y == 1, p >= cutoff) {
                (true, true)   => m.true_positive += 1,
                (false, true)  => m.false_positive += 1,
                (false, false) => m.true_negative += 1,
                (true, false)  => m.false_negative += 1,
            }
        }
        m
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(
            self.true_positive + self.true_negative,
            self.true_positive + self.true_negative + self.false_positive + self.false_negative,
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows:      usize,
    pub cutoff:    f64,
    pub confusion: ConfusionMatrix,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub accuracy:  f64,
    /// None when only one class is present.
    pub roc_auc:   Option<f64>,
    pub log_loss:  f64,
}

impl EvaluationReport {
    pub fn compute(labels: &[Label], probabilities: &[f64], cutoff: Cutoff) -> Self {
        let confusion = ConfusionMatrix::at(labels, probabilities, cutoff.value());
        Self {
            rows: labels.len(),
            cutoff: cutoff.value(),
            confusion,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            accuracy: confusion.accuracy(),
            roc_auc: roc_auc(labels, probabilities),
            log_loss: log_loss(labels, probabilities),
        }
    }
}

/// Mean binary cross-entropy, probabilities clipped away from 0 and 1.
pub fn log_loss(labels: &[Label], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels.iter().zip(probabilities).map(|(&y, &p)| {
        let p = p.clamp(1e-15, 1.0 - 1e-15);
        if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
    }).sum();
    total / labels.len() as f64
}

pub fn f1_at(labels: &[Label], probabilities: &[f64], cutoff: f64) -> f64 {
    ConfusionMatrix::at(labels, probabilities, cutoff).f1()
}

/// Area under the ROC curve via the rank-sum statistic (ties get average rank).
pub fn roc_auc(labels: &[Label], probabilities: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Stratified train / hold-out split. Each class keeps its share in
/// both partitions; at least one row of each class stays in training.
/// Returns (train, holdout) row indices, each ascending.
pub fn stratified_split(
    labels: &[Label],
    holdout_fraction: f64,
    rng: &mut PipelineRng,
) -> (Vec<usize>, Vec<usize>) {
    if holdout_fraction <= 0.0 {
        return ((0..labels.len()).collect(), Vec::new());
    }

    let mut train = Vec::new();
    let mut holdout = Vec::new();
    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        rng.shuffle(&mut members);
        let take = ((members.len() as f64 * holdout_fraction).round() as usize)
            .min(members.len().saturating_sub(1));
        holdout.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    train.sort_unstable();
    holdout.sort_unstable();
    (train, holdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngSlot;

    #[test]
    fn auc_of_perfect_ranking_is_one() {
        let labels = [0, 0, 1, 1];
        let probs = [0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc(&labels, &probs), Some(1.0));
    }

    #[test]
    fn auc_of_constant_scores_is_one_half() {
        let labels = [0, 1, 0, 1];
        let probs = [0.5; 4];
        assert_eq!(roc_auc(&labels, &probs), Some(0.5));
    }

    #[test]
    fn stratified_split_keeps_class_shares() {
        let labels: Vec<Label> = (0..100).map(|i| u8::from(i < 10)).collect();
        let mut rng = PipelineRng::for_slot(42, RngSlot::Split);
        let (train, holdout) = stratified_split(&labels, 0.2, &mut rng);

        assert_eq!(train.len() + holdout.len(), 100);
        assert_eq!(holdout.iter().filter(|&&i| labels[i] == 1).count(), 2);
        assert_eq!(holdout.iter().filter(|&&i| labels[i] == 0).count(), 18);
        assert!(train.iter().all(|i| !holdout.contains(i)));
    }

    #[test]
    fn confusion_counts_at_cutoff() {
        let labels = [1, 1, 0, 0];
        let probs = [0.9, 0.3, 0.4, 0.1];
        let m = ConfusionMatrix::at(&labels, &probs, 0.35);
        assert_eq!(m, ConfusionMatrix { true_positive: 1, false_positive: 1, true_negative: 1, false_negative: 1 });
        assert_eq!(m.f1(), 0.5);
    }
}

//! Threshold decision: probability to binary "will cancel" flag.
//!
//! The cutoff is always supplied by the caller. The default sits below
//! 0.5 because a missed cancellation costs more than a false alarm.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CUTOFF: f64 = 0.4;

/// A probability cutoff strictly inside (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Cutoff(f64);

impl Cutoff {
    pub fn new(value: f64) -> PipelineResult<Self> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(PipelineError::Config(format!("cutoff must be in (0, 1), got {value}")))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// 1 if `probability >= cutoff`, else 0.
    pub fn decide(&self, probability: f64) -> u8 {
        u8::from(probability >= self.0)
    }
}

impl Default for Cutoff {
    fn default() -> Self {
        Self(DEFAULT_CUTOFF)
    }
}

impl TryFrom<f64> for Cutoff {
    type Error = PipelineError;

    fn try_from(value: f64) -> PipelineResult<Self> {
        Self::new(value)
    }
}

impl From<Cutoff> for f64 {
    fn from(c: Cutoff) -> f64 {
        c.0
    }
}

/// Apply `cutoff` to every probability.
pub fn decide(probabilities: &[f64], cutoff: Cutoff) -> Vec<u8> {
    probabilities.iter().map(|&p| cutoff.decide(p)).collect()
}

//! Seeded random streams for the churn pipeline.
//!
//! The train/hold-out split, SMOTE interpolation, tree row sampling,
//! feature elimination and the synthetic portfolio each draw from their
//! own `PipelineRng`, keyed by `RngSlot` and the configured seed. Two runs
//! with the same seed therefore shuffle, interpolate and sample the same
//! way, and a stage that draws more or fewer numbers never shifts another
//! stage's stream.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Deterministic RNG owned by one pipeline stage.
pub struct PipelineRng {
    inner: Pcg64Mcg,
}

impl PipelineRng {
    pub fn for_slot(seed: u64, slot: RngSlot) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(mix(seed, slot as u64)) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll an index in [0, n).
    pub fn next_index(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform float in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Approximately normal draw (Irwin-Hall, 12 uniforms).
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let sum: f64 = (0..12).map(|_| self.next_f64()).sum();
        mean + std * (sum - 6.0)
    }

    /// In-place Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

/// SplitMix64 finalizer over seed and slot index.
fn mix(seed: u64, slot_index: u64) -> u64 {
    let mut z = seed.wrapping_add(slot_index.wrapping_add(1).wrapping_mul(0xbf58_476d_1ce4_e5b9));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Pipeline stages that draw random numbers. Discriminants are fixed;
/// new stages take the next free value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngSlot {
    Split = 0,
    Balancer = 1,
    Classifier = 2,
    Selector = 3,
    Synthetic = 4,
}

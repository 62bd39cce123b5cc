//! Strategies for sampling indices from a dataset.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU64, Ordering};

/// A trait for determining the order of data access.
pub trait Sampler: Send + Sync {
    /// Returns the indices of one epoch.
    ///
    /// # Arguments
    ///
    /// * `len`: The length of the dataset.
    fn sample(&self, len: usize) -> Vec<usize>;
}

/// Samples elements sequentially, always in the same order.
pub struct SequentialSampler;

impl Sampler for SequentialSampler {
    fn sample(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}

/// Samples elements randomly (without replacement).
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn sample(&self, len: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = rand::rng();
        indices.shuffle(&mut rng);
        indices
    }
}

/// Reproducible shuffling.
///
/// Each call to `sample` is one epoch; epoch `k` of two samplers built from the same seed
/// yields the same permutation, while consecutive epochs differ.
pub struct SeededSampler {
    seed: u64,
    epoch: AtomicU64,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            epoch: AtomicU64::new(0),
        }
    }

    /// Number of epochs sampled so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }
}

impl Sampler for SeededSampler {
    fn sample(&self, len: usize) -> Vec<usize> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = StdRng::seed_from_u64(mix_seed(self.seed, epoch, 0));
        indices.shuffle(&mut rng);
        indices
    }
}

/// Combines a base seed with an epoch and a stream id into one RNG seed.
pub(crate) fn mix_seed(seed: u64, epoch: u64, stream: u64) -> u64 {
    // splitmix64 finalizer over the combined words
    let mut z = seed
        ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ stream.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

//! Prior distribution sampling.
//!
//! The generative model learns to map noise to molecules. Every training sample is paired
//! with a draw from that noise ("prior") distribution of matching shape:
//!
//! - `zx ~ N(0, 1)`, `[n, F]`: atom features.
//! - `zcharges ~ N(0, 1)`, `[n, 1]`: charges.
//! - `zpos ~ N(0, 1)`, `[n, 3]`, then shifted to zero center of mass.
//!
//! Positions (real and prior) are always zero-centered so the model never has to learn
//! translations.
//!
//! For evaluation there is no real molecule to pair with; the node count itself is drawn
//! from the empirical [`NodeHistogram`] of the training set.

use crate::tensor::{Tensor, TensorError};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::{Error as WeightError, WeightedIndex};
use thiserror::Error;

/// Slack added to the histogram length when sizing the adjacency table.
pub const NODE_MARGIN: usize = 10;

#[derive(Error, Debug)]
pub enum PriorError {
    #[error("Node histogram is empty")]
    EmptyHistogram,
    #[error("Node histogram weight at {index} is invalid: {weight}")]
    InvalidWeight { index: usize, weight: f64 },
    #[error("Node histogram has no positive weight")]
    ZeroHistogram,
    #[error("Node histogram weights overflow")]
    WeightOverflow,
    #[error("Node histogram weights rejected: {0}")]
    Weights(WeightError),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, PriorError>;

/// Shifts `pos` so that every column has zero mean over the nodes.
///
/// ```rust
/// use molgen_data::prior::remove_mean;
/// use molgen_data::tensor::Tensor;
///
/// let pos = Tensor::<f32, 2>::new(vec![0.0, 0.0, 0.0, 2.0, 4.0, 6.0], [2, 3]).unwrap();
/// let centered = remove_mean(&pos).unwrap();
/// assert_eq!(centered.data(), &[-1.0, -2.0, -3.0, 1.0, 2.0, 3.0]);
/// ```
pub fn remove_mean(pos: &Tensor<f32, 2>) -> std::result::Result<Tensor<f32, 2>, TensorError> {
    pos.center_rows()
}

/// One draw from the prior for a graph of `n` nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorSample {
    pub zx: Tensor<f32, 2>,
    pub zcharges: Tensor<f32, 2>,
    pub zpos: Tensor<f32, 2>,
}

impl PriorSample {
    /// Samples prior fields for `n` nodes with `num_features` feature columns.
    pub fn sample<R: Rng + ?Sized>(n: usize, num_features: usize, rng: &mut R) -> Result<Self> {
        let zx = Tensor::randn([n, num_features], rng);
        let zcharges = Tensor::randn([n, 1], rng);
        let zpos = remove_mean(&Tensor::randn([n, 3], rng))?;
        Ok(Self { zx, zcharges, zpos })
    }

    pub fn num_nodes(&self) -> usize {
        self.zpos.rows()
    }
}

/// Empirical distribution of graph sizes: `weights[k]` is the (unnormalized) frequency of
/// graphs with `k` nodes.
#[derive(Clone, Debug)]
pub struct NodeHistogram {
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl NodeHistogram {
    /// # Errors
    ///
    /// Rejects empty histograms, negative or non-finite weights, weights whose sum
    /// overflows, and histograms whose weights are all zero.
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(PriorError::EmptyHistogram);
        }
        if let Some((index, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(PriorError::InvalidWeight { index, weight });
        }
        let total: f64 = weights.iter().sum();
        if !total.is_finite() {
            return Err(PriorError::WeightOverflow);
        }
        let index = WeightedIndex::new(&weights).map_err(|e| match e {
            WeightError::InsufficientNonZero => PriorError::ZeroHistogram,
            WeightError::Overflow => PriorError::WeightOverflow,
            other => PriorError::Weights(other),
        })?;
        Ok(Self { weights, index })
    }

    /// Builds a histogram by counting the node counts of a dataset.
    pub fn from_node_counts<I>(counts: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut weights = Vec::new();
        for n in counts {
            if weights.len() <= n {
                weights.resize(n + 1, 0.0);
            }
            weights[n] += 1.0;
        }
        Self::new(weights)
    }

    /// Number of bins (largest representable node count + 1).
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Size of the dense adjacency table needed for this histogram.
    pub fn max_n_nodes(&self) -> usize {
        self.weights.len() + NODE_MARGIN
    }

    /// Normalized probabilities, summing to one.
    pub fn probabilities(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().sum();
        self.weights.iter().map(|w| w / total).collect()
    }

    /// Draws a node count with probability proportional to its weight.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.index.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_prior_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let prior = PriorSample::sample(7, 5, &mut rng).unwrap();
        assert_eq!(prior.zx.shape(), &[7, 5]);
        assert_eq!(prior.zcharges.shape(), &[7, 1]);
        assert_eq!(prior.zpos.shape(), &[7, 3]);
        assert_eq!(prior.num_nodes(), 7);

        let mean = prior.zpos.mean_rows().unwrap();
        assert!(mean.data().iter().all(|m| m.abs() < 1e-5));
    }

    #[test]
    fn test_prior_empty_graph() {
        let mut rng = StdRng::seed_from_u64(0);
        let prior = PriorSample::sample(0, 5, &mut rng).unwrap();
        assert_eq!(prior.zx.shape(), &[0, 5]);
        assert_eq!(prior.zpos.size(), 0);
    }

    #[test]
    fn test_histogram_validation() {
        assert!(matches!(
            NodeHistogram::new(vec![]),
            Err(PriorError::EmptyHistogram)
        ));
        assert!(matches!(
            NodeHistogram::new(vec![0.0, 0.0]),
            Err(PriorError::ZeroHistogram)
        ));
        assert!(matches!(
            NodeHistogram::new(vec![1.0, -1.0]),
            Err(PriorError::InvalidWeight { index: 1, .. })
        ));
        assert!(matches!(
            NodeHistogram::new(vec![f64::NAN]),
            Err(PriorError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn test_histogram_weight_overflow() {
        let err = NodeHistogram::new(vec![f64::MAX, f64::MAX]).unwrap_err();
        assert!(matches!(err, PriorError::WeightOverflow));
        assert_eq!(err.to_string(), "Node histogram weights overflow");
    }

    #[test]
    fn test_histogram_sizes() {
        let hist = NodeHistogram::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(hist.len(), 8);
        assert_eq!(hist.max_n_nodes(), 18);

        let probs = hist.probabilities();
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(probs[0], 0.0);
        assert_eq!(probs[3], 0.2);
    }

    #[test]
    fn test_histogram_sampling_respects_support() {
        let hist = NodeHistogram::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let n = hist.sample(&mut rng);
            assert!((3..8).contains(&n));
        }
    }

    #[test]
    fn test_histogram_from_counts() {
        let hist = NodeHistogram::from_node_counts([3, 5, 5, 9]).unwrap();
        assert_eq!(hist.len(), 10);
        assert_eq!(hist.weights()[5], 2.0);
        assert_eq!(hist.weights()[4], 0.0);
    }
}

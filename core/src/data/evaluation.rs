//! Evaluation loader: graphs sampled from the prior alone.

use super::Result;
use super::batch::{GraphBatch, GraphCollate};
use super::loader::Collate;
use super::sampler::mix_seed;
use super::transform::{GraphSample, PriorTransform};
use crate::chem::NUM_ATOM_TYPES;
use crate::graph::DenseAdjacency;
use crate::prior::NodeHistogram;
use crate::tensor::Device;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_EVAL_BATCH_SIZE: usize = 4;

/// Yields batches of prior-only graphs.
///
/// Node counts are drawn from the training histogram, so generated molecules follow the
/// size distribution of the data. Every epoch draws fresh samples; with a seed, a given
/// epoch is reproducible.
pub struct EvaluationLoader {
    transform: Arc<PriorTransform>,
    histogram: NodeHistogram,
    data_num: usize,
    batch_size: usize,
    seed: Option<u64>,
    epoch: AtomicU64,
}

impl EvaluationLoader {
    /// Builds a loader yielding `data_num` samples per epoch.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn new(
        data_num: usize,
        histogram: &NodeHistogram,
        batch_size: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        let max_n_nodes = histogram.max_n_nodes();
        let adjacency = Arc::new(DenseAdjacency::build(max_n_nodes)?);
        let batch_size = batch_size.max(1);

        tracing::info!(
            samples = data_num,
            batch_size,
            max_n_nodes,
            "built evaluation loader"
        );

        Ok(Self {
            transform: Arc::new(PriorTransform::new(adjacency, Device::Cpu)),
            histogram: histogram.clone(),
            data_num,
            batch_size,
            seed,
            epoch: AtomicU64::new(0),
        })
    }

    /// Same as [`EvaluationLoader::new`] with [`DEFAULT_EVAL_BATCH_SIZE`].
    pub fn with_default_batch_size(
        data_num: usize,
        histogram: &NodeHistogram,
        seed: Option<u64>,
    ) -> Result<Self> {
        Self::new(data_num, histogram, DEFAULT_EVAL_BATCH_SIZE, seed)
    }

    /// Samples per epoch.
    pub fn data_num(&self) -> usize {
        self.data_num
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_n_nodes(&self) -> usize {
        self.transform.adjacency().max_n_nodes()
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.data_num.div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new epoch.
    pub fn iter(&self) -> EvaluationIter<'_> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        EvaluationIter {
            loader: self,
            epoch,
            cursor: 0,
            batch: 0,
        }
    }
}

impl<'a> IntoIterator for &'a EvaluationLoader {
    type Item = Result<GraphBatch>;
    type IntoIter = EvaluationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One epoch of [`EvaluationLoader`].
pub struct EvaluationIter<'a> {
    loader: &'a EvaluationLoader,
    epoch: u64,
    cursor: usize,
    batch: usize,
}

impl EvaluationIter<'_> {
    fn draw(&self, position: usize) -> Result<GraphSample> {
        let mut rng = match self.loader.seed {
            Some(seed) => StdRng::seed_from_u64(mix_seed(seed, self.epoch, position as u64 + 1)),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let n = self.loader.histogram.sample(&mut rng);
        self.loader
            .transform
            .prior_only(n, NUM_ATOM_TYPES, &mut rng)
    }
}

impl Iterator for EvaluationIter<'_> {
    type Item = Result<GraphBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.loader.data_num {
            return None;
        }
        let take = (self.loader.data_num - self.cursor).min(self.loader.batch_size);
        let range = self.cursor..self.cursor + take;
        self.cursor += take;

        let batch = range
            .map(|i| self.draw(i))
            .collect::<Result<Vec<_>>>()
            .and_then(<GraphCollate as Collate<GraphSample>>::collate);
        if let Ok(batch) = &batch {
            tracing::debug!(
                epoch = self.epoch,
                batch = self.batch,
                graphs = batch.num_graphs(),
                nodes = batch.num_nodes(),
                "drew evaluation batch"
            );
        }
        self.batch += 1;
        Some(batch)
    }
}

//! DataLoader implementation.

use super::{Dataset, RandomSampler, Sampler, SeededSampler, SequentialSampler};
use rayon::prelude::*;
use std::sync::Arc;

/// Trait for collating a list of items into a batch.
pub trait Collate<T> {
    /// The type of the batched output (e.g., `Vec<T>`, `Result<GraphBatch>`).
    type Output;

    /// Collates a vector of items into a single batch.
    fn collate(batch: Vec<T>) -> Self::Output;
}

/// A default collator that just returns the `Vec<T>`.
pub struct DefaultCollate;

impl<T> Collate<T> for DefaultCollate {
    type Output = Vec<T>;

    fn collate(batch: Vec<T>) -> Self::Output {
        batch
    }
}

/// Data loader.
///
/// Combines a dataset and a sampler, and provides an iterable over batches of the dataset.
///
/// # Type Parameters
///
/// * `D`: The dataset type.
/// * `T`: The item type returned by the dataset.
/// * `C`: The collator type (defaults to `DefaultCollate`).
pub struct DataLoader<D, T, C = DefaultCollate>
where
    D: Dataset<T>,
    C: Collate<T>,
{
    dataset: Arc<D>,
    batch_size: usize,
    sampler: Box<dyn Sampler>,
    drop_last: bool,
    parallel: bool,
    _marker: std::marker::PhantomData<(T, C)>,
}

impl<D, T> DataLoader<D, T, DefaultCollate>
where
    D: Dataset<T> + 'static,
{
    /// Creates a new DataLoader with default collation.
    pub fn new(dataset: D, batch_size: usize) -> Self {
        Self::with_collate(dataset, batch_size)
    }
}

impl<D, T, C> DataLoader<D, T, C>
where
    D: Dataset<T> + 'static,
    C: Collate<T>,
{
    /// Creates a new DataLoader with the collator `C`.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn with_collate(dataset: D, batch_size: usize) -> Self {
        Self {
            dataset: Arc::new(dataset),
            batch_size: batch_size.max(1),
            sampler: Box::new(SequentialSampler),
            drop_last: false,
            parallel: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Sets the sampler to use.
    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    /// Sets whether to shuffle the data (uses `RandomSampler`).
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        if shuffle {
            self.sampler = Box::new(RandomSampler);
        } else {
            self.sampler = Box::new(SequentialSampler);
        }
        self
    }

    /// Shuffles reproducibly from `seed` (uses `SeededSampler`).
    pub fn shuffle_seeded(self, seed: u64) -> Self {
        self.with_sampler(SeededSampler::new(seed))
    }

    /// Sets whether to drop the last incomplete batch.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Sets whether items of a batch are fetched on the rayon pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches one epoch yields.
    pub fn len(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over one epoch.
    pub fn iter(&self) -> DataLoaderIter<D, T, C> {
        let indices = self.sampler.sample(self.dataset.len());
        DataLoaderIter {
            dataset: self.dataset.clone(),
            indices,
            batch_size: self.batch_size,
            current_idx: 0,
            drop_last: self.drop_last,
            parallel: self.parallel,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<D, T, C> IntoIterator for DataLoader<D, T, C>
where
    D: Dataset<T> + 'static,
    T: Send,
    C: Collate<T>,
{
    type Item = C::Output;
    type IntoIter = DataLoaderIter<D, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator for DataLoader.
pub struct DataLoaderIter<D, T, C>
where
    D: Dataset<T>,
    C: Collate<T>,
{
    dataset: Arc<D>,
    indices: Vec<usize>,
    batch_size: usize,
    current_idx: usize,
    drop_last: bool,
    parallel: bool,
    _marker: std::marker::PhantomData<(T, C)>,
}

impl<D, T, C> DataLoaderIter<D, T, C>
where
    D: Dataset<T>,
    T: Send,
    C: Collate<T>,
{
    /// Like [`Iterator::next`], but also returns the dataset indices the batch was built from.
    pub fn next_with_indices(&mut self) -> Option<(Vec<usize>, C::Output)> {
        if self.current_idx >= self.indices.len() {
            return None;
        }

        let remaining = self.indices.len() - self.current_idx;
        if self.drop_last && remaining < self.batch_size {
            return None;
        }

        let take = remaining.min(self.batch_size);
        let batch_indices = self.indices[self.current_idx..self.current_idx + take].to_vec();
        self.current_idx += take;

        let dataset = &self.dataset;
        let batch: Vec<T> = if self.parallel {
            batch_indices
                .par_iter()
                .map(|&idx| dataset.get(idx))
                .collect()
        } else {
            batch_indices.iter().map(|&idx| dataset.get(idx)).collect()
        };

        Some((batch_indices, C::collate(batch)))
    }
}

impl<D, T, C> Iterator for DataLoaderIter<D, T, C>
where
    D: Dataset<T>,
    T: Send,
    C: Collate<T>,
{
    type Item = C::Output;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_with_indices().map(|(_, batch)| batch)
    }
}

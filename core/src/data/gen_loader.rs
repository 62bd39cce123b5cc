//! The training loader.
//!
//! [`GenLoader`] ties the pieces together: it sizes the [`DenseAdjacency`] table from the
//! node histogram, shares it with a [`PriorTransform`], and turns the molecule batches of
//! a [`DataLoader`] into [`GraphBatch`]es.
//!
//! # Example
//!
//! ```rust
//! use molgen_data::chem::{AtomType, Molecule};
//! use molgen_data::config::LoaderConfig;
//! use molgen_data::data::{GenLoader, InMemoryDataset};
//!
//! let water = Molecule::from_atoms(
//!     &[AtomType::O, AtomType::H, AtomType::H],
//!     &[[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
//!     &[8.0, 1.0, 1.0],
//! )
//! .unwrap();
//! let dataset = InMemoryDataset::from_molecules(vec![water; 4]).unwrap();
//! let histogram = dataset.node_histogram().unwrap();
//!
//! let config = LoaderConfig::default().with_batch_size(2).with_seed(7);
//! let loader = GenLoader::new(dataset, &histogram, config).unwrap();
//! assert_eq!(loader.max_n_nodes(), histogram.len() + 10);
//!
//! for batch in loader.iter() {
//!     let batch = batch.unwrap();
//!     assert_eq!(batch.num_graphs(), 2);
//!     assert_eq!(batch.num_edges(), 2 * 6);
//! }
//! ```

use super::batch::GraphBatch;
use super::in_memory::InMemoryDataset;
use super::loader::{DataLoader, DataLoaderIter, DefaultCollate};
use super::sampler::mix_seed;
use super::transform::{GraphSample, PriorTransform};
use super::{Dataset, Result};
use crate::chem::{Molecule, NUM_ATOM_TYPES};
use crate::config::{DEBUG_SUBSET, LoaderConfig};
use crate::graph::{DenseAdjacency, GraphError};
use crate::prior::NodeHistogram;
use crate::tensor::TensorError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Training loader over an [`InMemoryDataset`].
pub struct GenLoader {
    loader: DataLoader<InMemoryDataset, Molecule>,
    transform: Arc<PriorTransform>,
    config: LoaderConfig,
    epoch: AtomicU64,
}

impl GenLoader {
    /// Builds the loader.
    ///
    /// `max_n_nodes` is `histogram.len() + NODE_MARGIN`; the adjacency table is built once
    /// at that size. In debug mode the dataset is cut to its first [`DEBUG_SUBSET`]
    /// molecules.
    ///
    /// # Errors
    ///
    /// - `DataError::Config` if the configuration is invalid.
    /// - `DataError::Tensor` if `config.device` has no backend.
    /// - `DataError::Graph` if a molecule has more nodes than `max_n_nodes`.
    pub fn new(
        dataset: InMemoryDataset,
        histogram: &NodeHistogram,
        config: LoaderConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !config.device.is_cpu() {
            return Err(TensorError::Unsupported(format!(
                "no backend for device {}",
                config.device
            ))
            .into());
        }

        let dataset = if config.debug && dataset.len() > DEBUG_SUBSET {
            tracing::warn!(
                len = dataset.len(),
                kept = DEBUG_SUBSET,
                "debug mode, truncating dataset"
            );
            dataset.truncate(DEBUG_SUBSET)
        } else {
            dataset
        };

        let max_n_nodes = histogram.max_n_nodes();
        let largest = dataset.max_num_nodes();
        if largest > max_n_nodes {
            return Err(GraphError::NodeCountExceeded {
                n: largest,
                max: max_n_nodes,
            }
            .into());
        }

        let adjacency = Arc::new(DenseAdjacency::build(max_n_nodes)?);
        let transform = Arc::new(PriorTransform::new(adjacency, config.device.clone()));

        let len = dataset.len();
        let loader = DataLoader::new(dataset, config.batch_size).drop_last(config.drop_last);
        let loader = match (config.shuffle, config.seed) {
            (true, Some(seed)) => loader.shuffle_seeded(seed),
            (shuffle, _) => loader.shuffle(shuffle),
        };

        tracing::info!(
            split = config.split.as_str(),
            samples = len,
            batches = loader.len(),
            batch_size = config.batch_size,
            max_n_nodes,
            shuffle = config.shuffle,
            "built training loader"
        );

        Ok(Self {
            loader,
            transform,
            config,
            epoch: AtomicU64::new(0),
        })
    }

    /// Loads `<datadir>/<split>.safetensors` for the split named in `config`.
    pub fn from_dir<P: AsRef<Path>>(
        datadir: P,
        histogram: &NodeHistogram,
        config: LoaderConfig,
    ) -> Result<Self> {
        let path = datadir
            .as_ref()
            .join(format!("{}.safetensors", config.split.as_str()));
        let dataset = InMemoryDataset::load(&path)?;
        Self::new(dataset, histogram, config)
    }

    /// Width of the atom feature matrix.
    pub fn num_atom_types(&self) -> usize {
        NUM_ATOM_TYPES
    }

    pub fn max_n_nodes(&self) -> usize {
        self.transform.adjacency().max_n_nodes()
    }

    pub fn adjacency(&self) -> &Arc<DenseAdjacency> {
        self.transform.adjacency()
    }

    pub fn dataset(&self) -> &InMemoryDataset {
        self.loader.dataset()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        self.loader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loader.is_empty()
    }

    /// Starts a new epoch.
    pub fn iter(&self) -> GenLoaderIter {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        GenLoaderIter {
            inner: self.loader.iter(),
            transform: self.transform.clone(),
            seed: self.config.seed,
            epoch,
            parallel: self.config.parallel,
            batch: 0,
        }
    }
}

impl<'a> IntoIterator for &'a GenLoader {
    type Item = Result<GraphBatch>;
    type IntoIter = GenLoaderIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One epoch of [`GenLoader`].
pub struct GenLoaderIter {
    inner: DataLoaderIter<InMemoryDataset, Molecule, DefaultCollate>,
    transform: Arc<PriorTransform>,
    seed: Option<u64>,
    epoch: u64,
    parallel: bool,
    batch: usize,
}

impl GenLoaderIter {
    /// `position` is the molecule's index in the dataset, so every sample of an epoch gets
    /// its own stream.
    fn transform_one(&self, molecule: Molecule, position: usize) -> Result<GraphSample> {
        let mut rng = match self.seed {
            // stream 0 belongs to the sampler
            Some(seed) => {
                StdRng::seed_from_u64(mix_seed(seed, self.epoch, position as u64 + 1))
            }
            None => StdRng::from_rng(&mut rand::rng()),
        };
        self.transform.apply(molecule, &mut rng)
    }
}

impl Iterator for GenLoaderIter {
    type Item = Result<GraphBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let (indices, molecules) = self.inner.next_with_indices()?;

        let this = &*self;
        let samples: Result<Vec<GraphSample>> = if this.parallel {
            indices
                .into_par_iter()
                .zip(molecules)
                .map(|(i, m)| this.transform_one(m, i))
                .collect()
        } else {
            indices
                .into_iter()
                .zip(molecules)
                .map(|(i, m)| this.transform_one(m, i))
                .collect()
        };

        let batch = samples.and_then(GraphBatch::collate);
        if let Ok(batch) = &batch {
            tracing::debug!(
                epoch = self.epoch,
                batch = self.batch,
                graphs = batch.num_graphs(),
                nodes = batch.num_nodes(),
                edges = batch.num_edges(),
                "collated batch"
            );
        }
        self.batch += 1;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::AtomType;
    use crate::config::Split;
    use crate::data::DataError;
    use crate::tensor::Device;

    fn chain(n: usize) -> Molecule {
        let atoms = vec![AtomType::C; n];
        let coords: Vec<[f32; 3]> = (0..n).map(|i| [i as f32 * 1.5, 0.0, 0.0]).collect();
        Molecule::from_atoms(&atoms, &coords, &vec![6.0; n]).unwrap()
    }

    fn dataset(sizes: &[usize]) -> InMemoryDataset {
        InMemoryDataset::from_molecules(sizes.iter().map(|&n| chain(n)).collect()).unwrap()
    }

    #[test]
    fn test_batches_cover_dataset() {
        let ds = dataset(&[2, 3, 4, 5, 6]);
        let hist = ds.node_histogram().unwrap();
        let config = LoaderConfig::default()
            .with_batch_size(2)
            .with_shuffle(false);
        let loader = GenLoader::new(ds, &hist, config).unwrap();
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.num_atom_types(), 5);
        assert_eq!(loader.max_n_nodes(), 7 + 10);

        let batches: Vec<GraphBatch> = loader.iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].idx, vec![Some(0), Some(1)]);
        assert_eq!(batches[0].num_edges(), 2 + 6);
        assert_eq!(batches[2].num_graphs(), 1);
        assert_eq!(batches[2].num_edges(), 30);
    }

    #[test]
    fn test_seeded_epochs_reproducible() {
        let config = LoaderConfig::default().with_batch_size(3).with_seed(17);
        let build = || {
            let ds = dataset(&[2, 3, 4, 5, 6, 3, 2]);
            let hist = ds.node_histogram().unwrap();
            GenLoader::new(ds, &hist, config.clone()).unwrap()
        };
        let a = build();
        let b = build();
        let a0: Vec<_> = a.iter().map(|r| r.unwrap()).collect();
        let b0: Vec<_> = b.iter().map(|r| r.unwrap()).collect();
        assert_eq!(a0, b0);

        let a1: Vec<_> = a.iter().map(|r| r.unwrap()).collect();
        assert_ne!(a0, a1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let config = LoaderConfig::default()
            .with_batch_size(4)
            .with_seed(3)
            .with_shuffle(false);
        let ds = dataset(&[2, 3, 4, 5, 6, 3, 2, 8]);
        let hist = ds.node_histogram().unwrap();
        let seq = GenLoader::new(ds.clone(), &hist, config.clone()).unwrap();
        let par = GenLoader::new(ds, &hist, config.with_parallel(true)).unwrap();
        let a: Vec<_> = seq.iter().map(|r| r.unwrap()).collect();
        let b: Vec<_> = par.iter().map(|r| r.unwrap()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_idx_gets_distinct_priors() {
        let mol = chain(4).with_idx(5);
        let ds = InMemoryDataset::from_molecules(vec![mol.clone(), mol]).unwrap();
        let hist = ds.node_histogram().unwrap();
        let config = LoaderConfig::default()
            .with_batch_size(2)
            .with_seed(8)
            .with_shuffle(false);
        let loader = GenLoader::new(ds, &hist, config).unwrap();
        let batch = loader.iter().next().unwrap().unwrap();
        assert_eq!(batch.num_graphs(), 2);

        let first = batch.graph_nodes(0).unwrap();
        let second = batch.graph_nodes(1).unwrap();
        assert_ne!(
            batch.zpos.slice_rows(first.start, first.end).unwrap(),
            batch.zpos.slice_rows(second.start, second.end).unwrap()
        );
        assert_ne!(
            batch.zx.slice_rows(first.start, first.end).unwrap(),
            batch.zx.slice_rows(second.start, second.end).unwrap()
        );
    }

    #[test]
    fn test_debug_truncation() {
        let ds = dataset(&vec![3; 200]);
        let hist = ds.node_histogram().unwrap();
        let config = LoaderConfig::default().with_debug(true).with_batch_size(64);
        let loader = GenLoader::new(ds, &hist, config).unwrap();
        assert_eq!(loader.dataset().len(), DEBUG_SUBSET);
        assert_eq!(loader.len(), 3);
    }

    #[test]
    fn test_rejects_oversized_molecule() {
        // histogram of length 4 sizes the table to 14 nodes
        let hist = NodeHistogram::new(vec![0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(GenLoader::new(dataset(&[3, 14]), &hist, LoaderConfig::default()).is_ok());

        let err = GenLoader::new(dataset(&[3, 15]), &hist, LoaderConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DataError::Graph(GraphError::NodeCountExceeded { n: 15, max: 14 })
        ));
    }

    #[test]
    fn test_rejects_bad_config() {
        let ds = dataset(&[3]);
        let hist = ds.node_histogram().unwrap();
        let err = GenLoader::new(ds.clone(), &hist, LoaderConfig::default().with_batch_size(0))
            .err()
            .unwrap();
        assert!(matches!(err, DataError::Config(_)));

        let err = GenLoader::new(ds, &hist, LoaderConfig::default().with_device(Device::Cuda(0)))
            .err()
            .unwrap();
        assert!(matches!(err, DataError::Tensor(TensorError::Unsupported(_))));
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset(&[2, 4, 3]);
        ds.save(dir.path().join("valid.safetensors")).unwrap();
        let hist = ds.node_histogram().unwrap();

        let mut config = LoaderConfig::default().with_shuffle(false);
        config.split = Split::Valid;
        let loader = GenLoader::from_dir(dir.path(), &hist, config).unwrap();
        assert_eq!(loader.dataset(), &ds);

        config = LoaderConfig::default();
        assert!(matches!(
            GenLoader::from_dir(dir.path(), &hist, config),
            Err(DataError::Io(_))
        ));
    }
}

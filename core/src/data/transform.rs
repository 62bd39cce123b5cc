//! Per-sample prior augmentation.

use super::Result;
use crate::chem::Molecule;
use crate::graph::{DenseAdjacency, EdgeIndex};
use crate::prior::{PriorSample, remove_mean};
use crate::tensor::{Device, Tensor};
use rand::Rng;
use std::sync::Arc;

/// A molecule paired with its prior draw and dense edge index.
///
/// `data` is `None` for samples that only exist in the prior (evaluation), in which case
/// `num_nodes` was drawn from a node histogram. Edge attributes are never present: the
/// graph is fully connected and edges carry no features.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphSample {
    /// The real molecule with zero-centered positions.
    pub data: Option<Molecule>,
    pub prior: PriorSample,
    pub edge_index: EdgeIndex,
    pub num_nodes: usize,
}

/// Turns molecules into [`GraphSample`]s.
///
/// Holds the shared adjacency table; cloning the transform clones the `Arc`, not the table.
#[derive(Clone, Debug)]
pub struct PriorTransform {
    adjacency: Arc<DenseAdjacency>,
    device: Device,
}

impl PriorTransform {
    pub fn new(adjacency: Arc<DenseAdjacency>, device: Device) -> Self {
        Self { adjacency, device }
    }

    pub fn adjacency(&self) -> &Arc<DenseAdjacency> {
        &self.adjacency
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Zero-centers the molecule, samples prior fields of matching shape and attaches the
    /// dense edge index for its node count.
    ///
    /// # Errors
    ///
    /// Fails with `GraphError::NodeCountExceeded` if the molecule is larger than the
    /// adjacency table, and with `TensorError::Unsupported` if the device has no backend.
    pub fn apply<R: Rng + ?Sized>(&self, molecule: Molecule, rng: &mut R) -> Result<GraphSample> {
        let n = molecule.num_nodes();
        let edge_index = self.adjacency.slice(n)?;

        let idx = molecule.idx();
        let num_features = molecule.num_features();
        let (pos, x, charges) = molecule.into_parts();
        let pos = self.place(remove_mean(&pos)?)?;
        let mut data = Molecule::new(pos, self.place(x)?, self.place(charges)?)?;
        if let Some(idx) = idx {
            data = data.with_idx(idx);
        }

        let prior = self.sample_prior(n, num_features, rng)?;
        Ok(GraphSample {
            data: Some(data),
            prior,
            edge_index: self.place_edges(edge_index)?,
            num_nodes: n,
        })
    }

    /// Builds a sample with prior fields only, for a graph of `n` nodes.
    pub fn prior_only<R: Rng + ?Sized>(
        &self,
        n: usize,
        num_features: usize,
        rng: &mut R,
    ) -> Result<GraphSample> {
        let edge_index = self.adjacency.slice(n)?;
        let prior = self.sample_prior(n, num_features, rng)?;
        Ok(GraphSample {
            data: None,
            prior,
            edge_index: self.place_edges(edge_index)?,
            num_nodes: n,
        })
    }

    fn sample_prior<R: Rng + ?Sized>(
        &self,
        n: usize,
        num_features: usize,
        rng: &mut R,
    ) -> Result<PriorSample> {
        let PriorSample { zx, zcharges, zpos } = PriorSample::sample(n, num_features, rng)?;
        Ok(PriorSample {
            zx: self.place(zx)?,
            zcharges: self.place(zcharges)?,
            zpos: self.place(zpos)?,
        })
    }

    fn place(&self, t: Tensor<f32, 2>) -> Result<Tensor<f32, 2>> {
        Ok(t.to_device(&self.device)?)
    }

    fn place_edges(&self, edges: EdgeIndex) -> Result<EdgeIndex> {
        let tensor = edges.into_tensor().to_device(&self.device)?;
        Ok(EdgeIndex::from_tensor(tensor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::{AtomType, NUM_ATOM_TYPES};
    use crate::data::DataError;
    use crate::graph::GraphError;
    use crate::tensor::TensorError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn methanol() -> Molecule {
        let atoms = [AtomType::C, AtomType::O, AtomType::H, AtomType::H];
        let coords = [
            [1.0, 1.0, 1.0],
            [2.4, 1.0, 1.0],
            [0.6, 2.0, 1.0],
            [0.6, 0.2, 1.8],
        ];
        Molecule::from_atoms(&atoms, &coords, &[6.0, 8.0, 1.0, 1.0])
            .unwrap()
            .with_idx(3)
    }

    fn transform(max_n: usize) -> PriorTransform {
        PriorTransform::new(Arc::new(DenseAdjacency::build(max_n).unwrap()), Device::Cpu)
    }

    #[test]
    fn test_apply_shapes_and_centering() {
        let mut rng = StdRng::seed_from_u64(1);
        let sample = transform(10).apply(methanol(), &mut rng).unwrap();
        assert_eq!(sample.num_nodes, 4);
        assert_eq!(sample.edge_index.num_edges(), 12);

        let data = sample.data.as_ref().unwrap();
        assert_eq!(data.idx(), Some(3));
        assert_eq!(data.x(), methanol().x());
        assert_eq!(data.charges(), methanol().charges());
        let mean = data.pos().mean_rows().unwrap();
        assert!(mean.data().iter().all(|m| m.abs() < 1e-5));

        assert_eq!(sample.prior.zx.shape(), &[4, NUM_ATOM_TYPES]);
        assert_eq!(sample.prior.zcharges.shape(), &[4, 1]);
        assert_eq!(sample.prior.zpos.shape(), &[4, 3]);
    }

    #[test]
    fn test_apply_reproducible_with_seed() {
        let t = transform(10);
        let a = t.apply(methanol(), &mut StdRng::seed_from_u64(5)).unwrap();
        let b = t.apply(methanol(), &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_apply_too_large() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = transform(3).apply(methanol(), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            DataError::Graph(GraphError::NodeCountExceeded { n: 4, max: 3 })
        ));
    }

    #[test]
    fn test_apply_unsupported_device() {
        let t = PriorTransform::new(Arc::new(DenseAdjacency::build(8).unwrap()), Device::Cuda(0));
        let err = t
            .apply(methanol(), &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::Tensor(TensorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_prior_only() {
        let mut rng = StdRng::seed_from_u64(2);
        let sample = transform(10).prior_only(5, NUM_ATOM_TYPES, &mut rng).unwrap();
        assert!(sample.data.is_none());
        assert_eq!(sample.num_nodes, 5);
        assert_eq!(sample.edge_index.num_edges(), 20);
        assert_eq!(sample.prior.zx.shape(), &[5, NUM_ATOM_TYPES]);
    }
}

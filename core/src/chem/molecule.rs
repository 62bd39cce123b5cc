//! The molecule sample type and its record form.

use super::{AtomType, ChemError, NUM_ATOM_TYPES, Result};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A molecule as consumed by the loaders.
///
/// - `pos`: atom coordinates, `[n, 3]`.
/// - `x`: atom features, `[n, F]` (one-hot atom types for records, `F = NUM_ATOM_TYPES`).
/// - `charges`: per-atom charges, `[n, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Molecule {
    pos: Tensor<f32, 2>,
    x: Tensor<f32, 2>,
    charges: Tensor<f32, 2>,
    idx: Option<usize>,
}

impl Molecule {
    /// Creates a molecule after checking that every field describes the same atoms.
    ///
    /// # Errors
    ///
    /// Returns `ChemError::InvalidShape` if `pos` is not `[n, 3]` or `charges` is not `[n, 1]`,
    /// and `ChemError::LengthMismatch` if the fields disagree on `n`.
    pub fn new(pos: Tensor<f32, 2>, x: Tensor<f32, 2>, charges: Tensor<f32, 2>) -> Result<Self> {
        if pos.cols() != 3 {
            return Err(ChemError::InvalidShape {
                field: "pos",
                shape: pos.shape().to_vec(),
            });
        }
        if charges.cols() != 1 {
            return Err(ChemError::InvalidShape {
                field: "charges",
                shape: charges.shape().to_vec(),
            });
        }
        let n = pos.rows();
        for (field, rows) in [("x", x.rows()), ("charges", charges.rows())] {
            if rows != n {
                return Err(ChemError::LengthMismatch {
                    field,
                    expected: n,
                    got: rows,
                });
            }
        }
        Ok(Self {
            pos,
            x,
            charges,
            idx: None,
        })
    }

    /// Assembles a molecule from fields already known to be consistent.
    pub(crate) fn from_parts_unchecked(
        pos: Tensor<f32, 2>,
        x: Tensor<f32, 2>,
        charges: Tensor<f32, 2>,
        idx: Option<usize>,
    ) -> Self {
        debug_assert_eq!(pos.rows(), x.rows());
        debug_assert_eq!(pos.rows(), charges.rows());
        Self {
            pos,
            x,
            charges,
            idx,
        }
    }

    /// Builds a molecule from typed atoms, encoding `x` as one-hot atom types.
    pub fn from_atoms(atoms: &[AtomType], coordinates: &[[f32; 3]], charges: &[f32]) -> Result<Self> {
        let n = atoms.len();
        if coordinates.len() != n {
            return Err(ChemError::LengthMismatch {
                field: "coordinates",
                expected: n,
                got: coordinates.len(),
            });
        }
        if charges.len() != n {
            return Err(ChemError::LengthMismatch {
                field: "charges",
                expected: n,
                got: charges.len(),
            });
        }

        let pos = Tensor::new(coordinates.iter().flatten().copied().collect(), [n, 3])?;
        let x = Tensor::from_fn([n, NUM_ATOM_TYPES], |i| {
            if atoms[i / NUM_ATOM_TYPES].index() == i % NUM_ATOM_TYPES {
                1.0
            } else {
                0.0
            }
        });
        let charges = Tensor::new(charges.to_vec(), [n, 1])?;
        Self::new(pos, x, charges)
    }

    /// Converts a record, resolving element symbols through [`AtomType`].
    ///
    /// # Errors
    ///
    /// Fails with `ChemError::UnknownElement` for symbols outside the closed set and with
    /// `ChemError::MissingCharges` if the record carries no charges.
    pub fn from_record(record: &MoleculeRecord) -> Result<Self> {
        let atoms = record
            .elements
            .iter()
            .map(|s| AtomType::from_symbol(s))
            .collect::<Result<Vec<_>>>()?;
        let charges = record.charges.as_deref().ok_or(ChemError::MissingCharges)?;
        Self::from_atoms(&atoms, &record.coordinates, charges)
    }

    /// Attaches the dataset index the molecule was read from.
    pub fn with_idx(mut self, idx: usize) -> Self {
        self.idx = Some(idx);
        self
    }

    pub fn idx(&self) -> Option<usize> {
        self.idx
    }

    /// Number of atoms `n`.
    pub fn num_nodes(&self) -> usize {
        self.pos.rows()
    }

    /// Width `F` of the feature matrix.
    pub fn num_features(&self) -> usize {
        self.x.cols()
    }

    pub fn pos(&self) -> &Tensor<f32, 2> {
        &self.pos
    }

    pub fn x(&self) -> &Tensor<f32, 2> {
        &self.x
    }

    pub fn charges(&self) -> &Tensor<f32, 2> {
        &self.charges
    }

    /// Returns `(pos, x, charges)`.
    pub fn into_parts(self) -> (Tensor<f32, 2>, Tensor<f32, 2>, Tensor<f32, 2>) {
        (self.pos, self.x, self.charges)
    }
}

/// A molecule as written in JSON record files.
///
/// ```json
/// {"coordinates": [[0.0, 0.0, 0.0], [1.1, 0.0, 0.0]], "elements": ["C", "O"], "charges": [6.0, 8.0]}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeRecord {
    pub coordinates: Vec<[f32; 3]>,
    pub elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charges: Option<Vec<f32>>,
}

/// Reads a JSON array of [`MoleculeRecord`]s.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<MoleculeRecord>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let records: Vec<MoleculeRecord> = serde_json::from_str(&content)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        count = records.len(),
        "read molecule records"
    );
    Ok(records)
}

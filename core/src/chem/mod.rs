//! Chemistry-facing types: atom types and molecules.

pub mod atom;
pub mod molecule;

pub use atom::{AtomType, NUM_ATOM_TYPES};
pub use molecule::{Molecule, MoleculeRecord, read_records};

use crate::tensor::TensorError;
use thiserror::Error;

/// Error type for molecule construction and record parsing.
#[derive(Error, Debug)]
pub enum ChemError {
    /// The element symbol is not part of the supported atom types.
    #[error("Unknown element symbol: {0:?}")]
    UnknownElement(String),
    /// Two per-atom fields disagree on the number of atoms.
    #[error("Length mismatch for {field}: expected {expected} atoms, got {got}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    /// A per-atom tensor has the wrong width.
    #[error("Invalid shape for {field}: {shape:?}")]
    InvalidShape {
        field: &'static str,
        shape: Vec<usize>,
    },
    /// The record has no charges.
    #[error("Record has no charges")]
    MissingCharges,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid record JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, ChemError>;

//! Atom types.

use super::ChemError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of atom types a sample's one-hot feature matrix encodes.
pub const NUM_ATOM_TYPES: usize = 5;

/// The closed set of element symbols accepted in molecule records.
///
/// The discriminant is the one-hot column of the element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomType {
    C = 0,
    O = 1,
    N = 2,
    Cl = 3,
    H = 4,
}

impl AtomType {
    pub const ALL: [AtomType; NUM_ATOM_TYPES] =
        [AtomType::C, AtomType::O, AtomType::N, AtomType::Cl, AtomType::H];

    /// Parses an element symbol. Symbols are case-sensitive (`"Cl"`, not `"CL"`).
    ///
    /// # Errors
    ///
    /// Returns `ChemError::UnknownElement` for any symbol outside the closed set.
    pub fn from_symbol(symbol: &str) -> Result<Self, ChemError> {
        match symbol {
            "C" => Ok(AtomType::C),
            "O" => Ok(AtomType::O),
            "N" => Ok(AtomType::N),
            "Cl" => Ok(AtomType::Cl),
            "H" => Ok(AtomType::H),
            other => Err(ChemError::UnknownElement(other.to_string())),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AtomType::C => "C",
            AtomType::O => "O",
            AtomType::N => "N",
            AtomType::Cl => "Cl",
            AtomType::H => "H",
        }
    }

    /// One-hot column index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`AtomType::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl FromStr for AtomType {
    type Err = ChemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s)
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

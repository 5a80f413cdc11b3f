//! Aggregate types
//!
//! Composite types built from other [`Type`] values:
//! - `ArrayType`: a fixed-size array of elements.
//! - `StructType`: an ordered sequence of fields.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::Type;

/// Array type
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArrayType {
    pub ty: Box<Type>,
    pub num_elements: u64,
}

impl ArrayType {
    pub fn new(ty: impl Into<Type>, num_elements: u64) -> Self {
        Self {
            ty: Box::new(ty.into()),
            num_elements,
        }
    }
}

impl std::fmt::Display for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[ {} x {} ]", self.num_elements, self.ty)
    }
}

/// Structure type
///
/// Fields are laid out in declaration order, each aligned to its natural
/// alignment under the active data layout.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StructType {
    pub element_types: Vec<Type>,
}

impl std::fmt::Display for StructType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ ")?;
        let mut first = true;
        for ty in &self.element_types {
            if first {
                first = false;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, " }}")
    }
}

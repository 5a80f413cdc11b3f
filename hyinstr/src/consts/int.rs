#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::primary::IType;

/// Represents an integer constant with a specific type and value.
///
/// Notice that integer constants cannot exceed 64 bits in value, for
/// simplicity. Wider types are allowed but only their low 64 bits can be set.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IConst {
    pub ty: IType,
    pub value: u64,
}

impl IConst {
    #[inline]
    pub const fn verify(&self) -> bool {
        match self.ty.max_value() {
            Some(max) => self.value <= max,
            None => true, // No limit for integers larger than 64 bits
        }
    }

    /// Build a constant, returning `None` when `value` does not fit in `ty`.
    #[inline]
    pub const fn new(ty: IType, value: u64) -> Option<Self> {
        let constant = Self { ty, value };
        if constant.verify() {
            Some(constant)
        } else {
            None
        }
    }
}

impl From<bool> for IConst {
    fn from(value: bool) -> Self {
        Self {
            ty: IType::I1,
            value: value as u64,
        }
    }
}

impl From<u8> for IConst {
    fn from(value: u8) -> Self {
        Self {
            ty: IType::I8,
            value: value.into(),
        }
    }
}

impl From<u16> for IConst {
    fn from(value: u16) -> Self {
        Self {
            ty: IType::I16,
            value: value.into(),
        }
    }
}

impl From<u32> for IConst {
    fn from(value: u32) -> Self {
        Self {
            ty: IType::I32,
            value: value.into(),
        }
    }
}

impl From<u64> for IConst {
    fn from(value: u64) -> Self {
        Self {
            ty: IType::I64,
            value,
        }
    }
}

impl std::fmt::Display for IConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.ty, self.value)
    }
}

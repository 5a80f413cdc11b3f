//! Floating-point constants used as immediate operands.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::primary::FType;

/// A floating-point literal paired with its `FType`.
///
/// The payload is the raw IEEE bit pattern (right-aligned), so two constants
/// are equal exactly when their encodings are. `0.0` and `-0.0` are distinct
/// constants, and so are NaNs with different payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FConst {
    pub ty: FType,
    pub bits: u128,
}

impl FConst {
    pub fn new(ty: FType, bits: u128) -> Self {
        Self { ty, bits }
    }
}

impl From<f32> for FConst {
    fn from(value: f32) -> Self {
        Self {
            ty: FType::Fp32,
            bits: value.to_bits() as u128,
        }
    }
}

impl From<f64> for FConst {
    fn from(value: f64) -> Self {
        Self {
            ty: FType::Fp64,
            bits: value.to_bits() as u128,
        }
    }
}

impl std::fmt::Display for FConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ty {
            FType::Fp32 => write!(f, "{} {:e}", self.ty, f32::from_bits(self.bits as u32)),
            FType::Fp64 => write!(f, "{} {:e}", self.ty, f64::from_bits(self.bits as u64)),
            _ => write!(f, "{} 0x{:x}", self.ty, self.bits),
        }
    }
}

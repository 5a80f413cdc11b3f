//! Target data layout: primitive sizes and alignments.
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{Type, primary::FType};

/// Byte order of the target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Describes how values are laid out in memory on the target.
///
/// Integers are stored in the smallest power-of-two number of bytes that
/// holds them and aligned to that size (capped at `max_int_align`), unless an
/// explicit entry in `int_alignments` overrides it. Floating-point values are
/// aligned to their storage size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataLayout {
    pub endianness: Endianness,
    /// Pointer width in bytes.
    pub pointer_size: u64,
    /// Pointer alignment in bytes.
    pub pointer_align: u64,
    /// Largest natural alignment assigned to an integer, in bytes.
    pub max_int_align: u64,
    /// Bit width -> alignment (bytes) overrides.
    pub int_alignments: BTreeMap<u32, u64>,
}

impl Default for DataLayout {
    /// 64-bit little-endian target.
    fn default() -> Self {
        Self {
            endianness: Endianness::Little,
            pointer_size: 8,
            pointer_align: 8,
            max_int_align: 8,
            int_alignments: BTreeMap::new(),
        }
    }
}

impl DataLayout {
    /// 32-bit little-endian target.
    pub fn ilp32() -> Self {
        Self {
            pointer_size: 4,
            pointer_align: 4,
            max_int_align: 4,
            ..Default::default()
        }
    }

    fn int_store_size(num_bits: u32) -> u64 {
        let bytes = ((num_bits as u64) + 7) / 8;
        bytes.next_power_of_two()
    }

    fn float_store_size(ty: FType) -> u64 {
        match ty {
            FType::X86Fp80 => 16,
            other => (other.num_bits() / 8) as u64,
        }
    }

    /// Width of a value of type `ty` in bits, as seen by a register.
    pub fn size_in_bits(&self, ty: &Type) -> u64 {
        match ty {
            Type::Int(itype) => itype.num_bits() as u64,
            Type::Float(ftype) => ftype.num_bits() as u64,
            Type::Ptr(_) => self.pointer_size * 8,
            _ => self.size_of(ty) * 8,
        }
    }

    /// Alignment of `ty` in bytes.
    pub fn align_of(&self, ty: &Type) -> u64 {
        match ty {
            Type::Int(itype) => match self.int_alignments.get(&itype.num_bits()) {
                Some(align) => *align,
                None => Self::int_store_size(itype.num_bits()).min(self.max_int_align),
            },
            Type::Float(ftype) => Self::float_store_size(*ftype),
            Type::Ptr(_) => self.pointer_align,
            Type::Array(array) => self.align_of(&array.ty),
            Type::Struct(structure) => structure
                .element_types
                .iter()
                .map(|ty| self.align_of(ty))
                .max()
                .unwrap_or(1),
        }
    }

    /// Allocation size of `ty` in bytes, including trailing padding.
    pub fn size_of(&self, ty: &Type) -> u64 {
        match ty {
            Type::Int(itype) => Self::int_store_size(itype.num_bits()),
            Type::Float(ftype) => Self::float_store_size(*ftype),
            Type::Ptr(_) => self.pointer_size,
            Type::Array(array) => self.size_of(&array.ty) * array.num_elements,
            Type::Struct(structure) => {
                let mut offset = 0u64;
                for field in &structure.element_types {
                    offset = Self::align_to(offset, self.align_of(field));
                    offset += self.size_of(field);
                }
                Self::align_to(offset, self.align_of(ty))
            }
        }
    }

    #[inline]
    fn align_to(value: u64, align: u64) -> u64 {
        if align <= 1 {
            value
        } else {
            (value + align - 1) / align * align
        }
    }
}

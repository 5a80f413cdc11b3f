//! Types module
//!
//! This module contains the canonical representation of types used by the
//! `hyinstr` crate. It exposes a small type system built on two layers:
//!
//! - Primary types: integers, floating-point values and opaque pointers (see `primary.rs`).
//! - Aggregate types: arrays and structures (see `aggregate.rs`).
//!
//! Types are plain values compared structurally, so two modules built
//! independently agree on what `i32` or `{ i8, ptr }` is. Sizes and
//! alignments are not intrinsic to a type; they come from the target
//! [`layout::DataLayout`].
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumTryAs};

use crate::types::{
    aggregate::{ArrayType, StructType},
    primary::{FType, IType, PtrType},
};

pub mod aggregate;
pub mod layout;
pub mod primary;

/// A sum-type representing any first-class type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    Int(IType),
    Float(FType),
    Ptr(PtrType),

    /// An array type: element type + element count.
    ///
    /// Notice that the number of elements MUST be known at compile time.
    Array(ArrayType),

    /// A structure type: an ordered list of element types.
    Struct(StructType),
}

impl From<IType> for Type {
    fn from(value: IType) -> Self {
        Type::Int(value)
    }
}

impl From<FType> for Type {
    fn from(value: FType) -> Self {
        Type::Float(value)
    }
}

impl From<PtrType> for Type {
    fn from(value: PtrType) -> Self {
        Type::Ptr(value)
    }
}

impl From<ArrayType> for Type {
    fn from(value: ArrayType) -> Self {
        Type::Array(value)
    }
}

impl From<StructType> for Type {
    fn from(value: StructType) -> Self {
        Type::Struct(value)
    }
}

impl Type {
    /// Shorthand for the opaque pointer type.
    pub const PTR: Type = Type::Ptr(PtrType);

    /// Shorthand for the boolean type (`i1`).
    pub const BOOL: Type = Type::Int(IType::I1);
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int(itype) => itype.fmt(f),
            Type::Float(ftype) => ftype.fmt(f),
            Type::Ptr(ptr) => ptr.fmt(f),
            Type::Array(array) => array.fmt(f),
            Type::Struct(structure) => structure.fmt(f),
        }
    }
}

//! Memory operations
//!
//! Load and store instructions with alignment, volatility, and optional
//! atomic ordering semantics compatible with common language memory models
//! (C++/Java), plus stack allocation and address computation.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    modules::{
        instructions::{Instruction, InstructionFlags},
        operand::{Name, Operand},
    },
    types::Type,
};

/// Ordering for atomic memory operations.
///
/// See LLVM's documentation on [Ordering](https://llvm.org/docs/LangRef.html#atomic-memory-ordering) for more details.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemoryOrdering {
    Unordered,
    Monotonic,
    Acq,
    Rel,
    AcqRel,
    SeqCst,
}

impl MemoryOrdering {
    pub fn to_str(&self) -> &'static str {
        match self {
            MemoryOrdering::Unordered => "unordered",
            MemoryOrdering::Monotonic => "monotonic",
            MemoryOrdering::Acq => "acquire",
            MemoryOrdering::Rel => "release",
            MemoryOrdering::AcqRel => "acq_rel",
            MemoryOrdering::SeqCst => "seq_cst",
        }
    }
}

/// Load from memory into a destination SSA name.
///
/// When `volatile` is true, the operation is prevented from being removed or
/// merged by typical optimizations.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MLoad {
    pub dest: Name,
    pub ty: Type,
    pub addr: Operand,
    pub alignment: Option<u32>,
    pub ordering: Option<MemoryOrdering>,
    pub volatile: bool,
}

impl Instruction for MLoad {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::MEMORY
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.addr)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.addr)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn destination_type(&self) -> Option<Type> {
        Some(self.ty.clone())
    }
}

/// Store a value to memory.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MStore {
    pub addr: Operand,
    pub value: Operand,
    pub alignment: Option<u32>,
    pub ordering: Option<MemoryOrdering>,
    pub volatile: bool,
}

impl Instruction for MStore {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::MEMORY
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.addr, &self.value].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.addr, &mut self.value].into_iter()
    }
}

/// Reserve `count` elements of `ty` in the current frame; yields a pointer.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MAlloca {
    pub dest: Name,
    pub ty: Type,
    pub count: Operand,
    pub alignment: Option<u32>,
}

impl Instruction for MAlloca {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::MEMORY
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.count)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.count)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn destination_type(&self) -> Option<Type> {
        Some(Type::PTR)
    }
}

/// Address computation: `base` indexed by `indices` through `ty`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MGetElementPtr {
    pub dest: Name,
    pub ty: Type,
    pub base: Operand,
    pub indices: Vec<Operand>,
}

impl Instruction for MGetElementPtr {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.base).chain(self.indices.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.base).chain(self.indices.iter_mut())
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn destination_type(&self) -> Option<Type> {
        Some(Type::PTR)
    }
}

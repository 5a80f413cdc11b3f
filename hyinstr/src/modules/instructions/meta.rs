//! Meta instructions
//!
//! Verification-only constructs. They never appear in executable code and
//! are stripped before a module is handed to an executor.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::modules::{
    instructions::{Instruction, InstructionFlags},
    operand::Operand,
};

/// Assertion instruction
///
/// `!assert %cond` states that `%cond` holds at this program point.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetaAssert {
    pub condition: Operand,
}

impl Instruction for MetaAssert {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::META | InstructionFlags::SIMPLE
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.condition)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.condition)
    }
}

/// Assumption instruction
///
/// Assumptions indicate conditions that are expected to hold true at a
/// specific program point, without requiring a proof.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetaAssume {
    pub condition: Operand,
}

impl Instruction for MetaAssume {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::META | InstructionFlags::SIMPLE
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.condition)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.condition)
    }
}

//! Floating-point instructions
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::{
    modules::{
        instructions::{Instruction, InstructionFlags},
        operand::{Name, Operand},
    },
    types::{Type, primary::FType},
};

/// Floating-point comparison predicates. `O*` variants are false when either
/// operand is NaN, `U*` variants are true in that case.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FCmpVariant {
    Oeq,
    One,
    Ogt,
    Oge,
    Olt,
    Ole,
    Ord,
    Ueq,
    Une,
    Ugt,
    Uge,
    Ult,
    Ule,
    Uno,
}

impl FCmpVariant {
    pub fn to_str(&self) -> &'static str {
        match self {
            FCmpVariant::Oeq => "oeq",
            FCmpVariant::One => "one",
            FCmpVariant::Ogt => "ogt",
            FCmpVariant::Oge => "oge",
            FCmpVariant::Olt => "olt",
            FCmpVariant::Ole => "ole",
            FCmpVariant::Ord => "ord",
            FCmpVariant::Ueq => "ueq",
            FCmpVariant::Une => "une",
            FCmpVariant::Ugt => "ugt",
            FCmpVariant::Uge => "uge",
            FCmpVariant::Ult => "ult",
            FCmpVariant::Ule => "ule",
            FCmpVariant::Uno => "uno",
        }
    }
}

macro_rules! define_fp_binop {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            pub dest: Name,
            pub ty: FType,
            pub lhs: Operand,
            pub rhs: Operand,
        }

        impl Instruction for $name {
            fn flags(&self) -> InstructionFlags {
                InstructionFlags::SIMPLE | InstructionFlags::ARITHMETIC_FP
            }

            fn operands(&self) -> impl Iterator<Item = &Operand> {
                [&self.lhs, &self.rhs].into_iter()
            }

            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                [&mut self.lhs, &mut self.rhs].into_iter()
            }

            fn destination(&self) -> Option<Name> {
                Some(self.dest)
            }

            fn set_destination(&mut self, name: Name) {
                self.dest = name;
            }

            fn destination_type(&self) -> Option<Type> {
                Some(self.ty.into())
            }
        }
    };
}

define_fp_binop!(
    /// Floating-point addition
    FAdd
);
define_fp_binop!(
    /// Floating-point subtraction
    FSub
);
define_fp_binop!(
    /// Floating-point multiplication
    FMul
);
define_fp_binop!(
    /// Floating-point division
    FDiv
);

/// Floating-point comparison, producing an `i1`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FCmp {
    pub dest: Name,
    pub ty: FType,
    pub variant: FCmpVariant,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl Instruction for FCmp {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE | InstructionFlags::ARITHMETIC_FP
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.lhs, &self.rhs].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.lhs, &mut self.rhs].into_iter()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }

    fn destination_type(&self) -> Option<Type> {
        Some(Type::BOOL)
    }
}

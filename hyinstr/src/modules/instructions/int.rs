//! Integer instructions
//!
//! Arithmetic, comparisons, shifts, and bitwise operations over integer
//! values. Each instruction carries its destination `Name`, an `IType`, and
//! its input operands. Overflow and signedness where relevant are explicit
//! parameters of the instruction.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    modules::{
        instructions::{Instruction, InstructionFlags},
        operand::{Name, Operand},
    },
    types::{Type, primary::IType},
};

/// Additional signedness policy for overflow handling
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OverflowSignednessPolicy {
    /// Wrap (signedness does not matter for wrap)
    Wrap,

    /// Signed saturation (two's complement)
    SSat,

    /// Unsigned saturation
    USat,

    /// Signed trap (panic on overflow)
    STrap,

    /// Unsigned trap (panic on overflow)
    UTrap,
}

impl OverflowSignednessPolicy {
    /// Creates an [`OverflowSignednessPolicy`] from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        OverflowSignednessPolicy::iter().find(|op| op.to_str() == s)
    }

    /// Returns the string representation of the [`OverflowSignednessPolicy`].
    pub fn to_str(&self) -> &'static str {
        match self {
            OverflowSignednessPolicy::Wrap => "wrap",
            OverflowSignednessPolicy::SSat => "ssat",
            OverflowSignednessPolicy::USat => "usat",
            OverflowSignednessPolicy::STrap => "strap",
            OverflowSignednessPolicy::UTrap => "utrap",
        }
    }
}

/// Signedness for integer operations
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntegerSignedness {
    Signed,
    Unsigned,
}

impl IntegerSignedness {
    /// Returns the string representation of the [`IntegerSignedness`].
    pub fn to_str(&self) -> &'static str {
        match self {
            IntegerSignedness::Signed => "signed",
            IntegerSignedness::Unsigned => "unsigned",
        }
    }
}

/// Integer comparison operations
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ICmpVariant {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl ICmpVariant {
    /// Returns the string representation of the [`ICmpVariant`].
    pub fn to_str(&self) -> &'static str {
        match self {
            ICmpVariant::Eq => "eq",
            ICmpVariant::Ne => "ne",
            ICmpVariant::Ugt => "ugt",
            ICmpVariant::Uge => "uge",
            ICmpVariant::Ult => "ult",
            ICmpVariant::Ule => "ule",
            ICmpVariant::Sgt => "sgt",
            ICmpVariant::Sge => "sge",
            ICmpVariant::Slt => "slt",
            ICmpVariant::Sle => "sle",
        }
    }
}

/// Shift direction and fill behavior.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IShiftVariant {
    /// Shift left, filling with zeros.
    Shl,
    /// Logical shift right, filling with zeros.
    Lsr,
    /// Arithmetic shift right, filling with the sign bit.
    Asr,
}

impl IShiftVariant {
    pub fn to_str(&self) -> &'static str {
        match self {
            IShiftVariant::Shl => "shl",
            IShiftVariant::Lsr => "lsr",
            IShiftVariant::Asr => "asr",
        }
    }
}

macro_rules! define_int_binop {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$fmeta:meta])* $field:ident : $fty:ty ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            pub dest: Name,
            pub ty: IType,
            pub lhs: Operand,
            pub rhs: Operand,
            $( $(#[$fmeta])* pub $field: $fty, )*
        }

        impl Instruction for $name {
            fn flags(&self) -> InstructionFlags {
                InstructionFlags::SIMPLE | InstructionFlags::ARITHMETIC_INT
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

define_int_binop! {
    /// Integer addition
    IAdd { variant: OverflowSignednessPolicy }
}

define_int_binop! {
    /// Integer subtraction
    ISub { variant: OverflowSignednessPolicy }
}

define_int_binop! {
    /// Integer multiplication
    IMul { variant: OverflowSignednessPolicy }
}

define_int_binop! {
    /// Integer division. Division by zero traps.
    IDiv { signedness: IntegerSignedness }
}

define_int_binop! {
    /// Integer remainder. Division by zero traps.
    IRem { signedness: IntegerSignedness }
}

define_int_binop! {
    /// Bitwise and
    IAnd {}
}

define_int_binop! {
    /// Bitwise or
    IOr {}
}

define_int_binop! {
    /// Bitwise exclusive or
    IXor {}
}

/// Integer comparison. `ty` is the type of the compared operands; the result is `i1`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ICmp {
    pub dest: Name,
    pub ty: IType,
    pub variant: ICmpVariant,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl Instruction for ICmp {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE | InstructionFlags::ARITHMETIC_INT
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

/// Shift `value` by `amount` bits. Shifting by the bit width or more is an overshift.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ISht {
    pub dest: Name,
    pub ty: IType,
    pub variant: IShiftVariant,
    pub value: Operand,
    pub amount: Operand,
}

impl Instruction for ISht {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE | InstructionFlags::ARITHMETIC_INT
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.value, &self.amount].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.value, &mut self.amount].into_iter()
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

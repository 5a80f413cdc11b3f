use strum::EnumIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    consts::AnyConst,
    modules::{
        instructions::{Instruction, InstructionFlags},
        operand::{Label, Name, Operand},
        symbol::FunctionPointer,
    },
    types::Type,
};

/// Function call instruction
///
/// Functions cannot raise exceptions; control always continues with the next
/// instruction after the call completes. In case of errors, either use a
/// return code or never return from the function (e.g., abort).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Invoke {
    /// Should be a reference to a function pointer (either internal or external). We
    /// describe it as an `Operand` to allow dynamic function calls through
    /// function pointer tables. A call is *direct* when this is an immediate
    /// function address.
    pub function: Operand,

    /// The argument operands to pass to the function.
    pub args: Vec<Operand>,

    /// The destination SSA name for the return value, if any.
    pub dest: Option<Name>,

    /// The return type of the function being called. `None` for `void` functions.
    pub ty: Option<Type>,
}

impl Invoke {
    /// The statically known callee, if this is a direct call.
    pub fn direct_callee(&self) -> Option<FunctionPointer> {
        match &self.function {
            Operand::Imm(AnyConst::Func(ptr)) => Some(*ptr),
            _ => None,
        }
    }
}

impl Instruction for Invoke {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::MEMORY
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.function).chain(self.args.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.function).chain(self.args.iter_mut())
    }

    fn destination(&self) -> Option<Name> {
        self.dest
    }

    fn set_destination(&mut self, name: Name) {
        // Cannot change a void return to a non-void return
        if self.dest.is_some() {
            self.dest = Some(name);
        }
    }

    fn destination_type(&self) -> Option<Type> {
        self.dest.and(self.ty.clone())
    }
}

/// Phi instruction
///
/// This instruction selects a value based on control flow. It is used to merge
/// values coming from different basic blocks. It should always be placed at the
/// beginning of a basic block.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Phi {
    pub dest: Name,
    pub ty: Type,
    /// (predecessor block label, incoming value)
    pub values: Vec<(Label, Operand)>,
}

impl Instruction for Phi {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.values.iter().map(|(_, op)| op)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.values.iter_mut().map(|(_, op)| op)
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

/// Select instruction
///
/// This instruction selects one of two values based on a condition.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Select {
    pub dest: Name,
    pub condition: Operand,
    pub true_value: Operand,
    pub false_value: Operand,
    pub ty: Type,
}

impl Instruction for Select {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.condition, &self.true_value, &self.false_value].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [
            &mut self.condition,
            &mut self.true_value,
            &mut self.false_value,
        ]
        .into_iter()
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

/// Conversion performed by a [`Cast`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CastVariant {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

impl CastVariant {
    pub fn to_str(&self) -> &'static str {
        match self {
            CastVariant::Trunc => "trunc",
            CastVariant::ZExt => "zext",
            CastVariant::SExt => "sext",
            CastVariant::FpTrunc => "fptrunc",
            CastVariant::FpExt => "fpext",
            CastVariant::FpToUi => "fptoui",
            CastVariant::FpToSi => "fptosi",
            CastVariant::UiToFp => "uitofp",
            CastVariant::SiToFp => "sitofp",
            CastVariant::PtrToInt => "ptrtoint",
            CastVariant::IntToPtr => "inttoptr",
            CastVariant::Bitcast => "bitcast",
        }
    }
}

/// Convert `value` to `ty`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cast {
    pub dest: Name,
    pub ty: Type,
    pub variant: CastVariant,
    pub value: Operand,
}

impl Instruction for Cast {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::SIMPLE
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
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

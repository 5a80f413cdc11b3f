//! Instruction set
//!
//! Each instruction is a small data structure with public fields, making it
//! easy to construct and inspect. Submodules contain families of operations:
//!
//! - `int`: integer arithmetic, comparisons, shifts and bitwise ops
//! - `fp`: floating-point arithmetic and comparisons
//! - `mem`: loads, stores, stack allocation and address computation
//! - `misc`: calls, phi nodes, selects and casts
//! - `meta`: verification-only assertions and assumptions
//!
//! You typically manipulate instructions via the [`HyInstr`] enum which is a
//! tagged union of all concrete instruction forms.
use auto_enums::auto_enum;
use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIs, EnumTryAs};

use crate::{
    modules::operand::{Name, Operand},
    types::Type,
};

pub mod fp;
pub mod int;
pub mod mem;
pub mod meta;
pub mod misc;

bitflags! {
    /// Coarse classification of an instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct InstructionFlags: u32 {
        /// Verification-only; never executed.
        const META = 1 << 0;
        /// Pure function of its operands.
        const SIMPLE = 1 << 1;
        const ARITHMETIC = 1 << 2;
        const ARITHMETIC_INT = Self::ARITHMETIC.bits() | 1 << 3;
        const ARITHMETIC_FP = Self::ARITHMETIC.bits() | 1 << 4;
        /// Reads or writes memory, or may do so through a call.
        const MEMORY = 1 << 5;
    }
}

/// Common interface implemented by every instruction node.
///
/// This trait provides lightweight, zero-allocation iteration over an
/// instruction's input operands and exposes its optional destination SSA
/// name when present.
pub trait Instruction {
    fn flags(&self) -> InstructionFlags;

    /// Iterate over all input operands for this instruction.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Mutably iterate over all input operands for this instruction.
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand>;

    /// Return the destination SSA name if the instruction produces a result.
    fn destination(&self) -> Option<Name> {
        None
    }

    /// Update the destination SSA name for this instruction. No-op if the
    /// instruction does not produce a result.
    fn set_destination(&mut self, _name: Name) {}

    /// Type of the value written to [`Instruction::destination`].
    fn destination_type(&self) -> Option<Type> {
        None
    }

    /// Convenience iterator over referenced SSA names (i.e., register
    /// operands). Immediates are ignored.
    fn dependencies(&self) -> impl Iterator<Item = Name> {
        self.operands().filter_map(|op| match op {
            Operand::Reg(reg) => Some(*reg),
            _ => None,
        })
    }

    fn is_meta_instruction(&self) -> bool {
        self.flags().contains(InstructionFlags::META)
    }

    fn is_simple(&self) -> bool {
        self.flags().contains(InstructionFlags::SIMPLE)
    }
}

/// Discriminated union covering all public instruction kinds.
///
/// The generated `HyInstrOp` discriminant (via `strum`) can be helpful for
/// fast classification.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(HyInstrOp))]
#[strum_discriminants(derive(Hash, PartialOrd, Ord))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HyInstr {
    // Integer instructions
    IAdd(int::IAdd),
    ISub(int::ISub),
    IMul(int::IMul),
    IDiv(int::IDiv),
    IRem(int::IRem),
    ICmp(int::ICmp),
    ISht(int::ISht),

    // Bitwise instructions
    IAnd(int::IAnd),
    IOr(int::IOr),
    IXor(int::IXor),

    // Floating-point instructions
    FAdd(fp::FAdd),
    FSub(fp::FSub),
    FMul(fp::FMul),
    FDiv(fp::FDiv),
    FCmp(fp::FCmp),

    // Memory instructions
    MLoad(mem::MLoad),
    MStore(mem::MStore),
    MAlloca(mem::MAlloca),
    MGetElementPtr(mem::MGetElementPtr),

    // Miscellaneous instructions
    Invoke(misc::Invoke),
    Phi(misc::Phi),
    Select(misc::Select),
    Cast(misc::Cast),

    // Meta instructions
    MetaAssert(meta::MetaAssert),
    MetaAssume(meta::MetaAssume),
}

impl HyInstrOp {
    /// Mnemonic used by the textual form.
    pub fn opname(&self) -> &'static str {
        match self {
            HyInstrOp::IAdd => "add",
            HyInstrOp::ISub => "sub",
            HyInstrOp::IMul => "mul",
            HyInstrOp::IDiv => "div",
            HyInstrOp::IRem => "rem",
            HyInstrOp::ICmp => "icmp",
            HyInstrOp::ISht => "sht",
            HyInstrOp::IAnd => "and",
            HyInstrOp::IOr => "or",
            HyInstrOp::IXor => "xor",
            HyInstrOp::FAdd => "fadd",
            HyInstrOp::FSub => "fsub",
            HyInstrOp::FMul => "fmul",
            HyInstrOp::FDiv => "fdiv",
            HyInstrOp::FCmp => "fcmp",
            HyInstrOp::MLoad => "load",
            HyInstrOp::MStore => "store",
            HyInstrOp::MAlloca => "alloca",
            HyInstrOp::MGetElementPtr => "getelementptr",
            HyInstrOp::Invoke => "invoke",
            HyInstrOp::Phi => "phi",
            HyInstrOp::Select => "select",
            HyInstrOp::Cast => "cast",
            HyInstrOp::MetaAssert => "!assert",
            HyInstrOp::MetaAssume => "!assume",
        }
    }
}

impl HyInstr {
    #[inline]
    pub fn op(&self) -> HyInstrOp {
        self.into()
    }
}

macro_rules! define_instr_any_instr {
    (
        $($variant:ident),*
    ) => {
        impl Instruction for HyInstr {
            fn flags(&self) -> InstructionFlags {
                match self {
                    $(
                        HyInstr::$variant(instr) => instr.flags(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands(&self) -> impl Iterator<Item = &Operand> {
                match self {
                    $(
                        HyInstr::$variant(instr) => instr.operands(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                match self {
                    $(
                        HyInstr::$variant(instr) => instr.operands_mut(),
                    )*
                }
            }

            fn destination(&self) -> Option<Name> {
                match self {
                    $(
                        HyInstr::$variant(instr) => instr.destination(),
                    )*
                }
            }

            fn set_destination(&mut self, name: Name) {
                match self {
                    $(
                        HyInstr::$variant(instr) => instr.set_destination(name),
                    )*
                }
            }

            fn destination_type(&self) -> Option<Type> {
                match self {
                    $(
                        HyInstr::$variant(instr) => instr.destination_type(),
                    )*
                }
            }
        }
    };
}

define_instr_any_instr! {
    IAdd,
    ISub,
    IMul,
    IDiv,
    IRem,
    ICmp,
    ISht,
    IAnd,
    IOr,
    IXor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FCmp,
    MLoad,
    MStore,
    MAlloca,
    MGetElementPtr,
    Invoke,
    Phi,
    Select,
    Cast,
    MetaAssert,
    MetaAssume
}

macro_rules! define_hyinstr_from {
    ($typ:ty, $variant:ident) => {
        impl From<$typ> for HyInstr {
            fn from(inst: $typ) -> Self {
                HyInstr::$variant(inst)
            }
        }
    };
}

define_hyinstr_from!(int::IAdd, IAdd);
define_hyinstr_from!(int::ISub, ISub);
define_hyinstr_from!(int::IMul, IMul);
define_hyinstr_from!(int::IDiv, IDiv);
define_hyinstr_from!(int::IRem, IRem);
define_hyinstr_from!(int::ICmp, ICmp);
define_hyinstr_from!(int::ISht, ISht);
define_hyinstr_from!(int::IAnd, IAnd);
define_hyinstr_from!(int::IOr, IOr);
define_hyinstr_from!(int::IXor, IXor);

define_hyinstr_from!(fp::FAdd, FAdd);
define_hyinstr_from!(fp::FSub, FSub);
define_hyinstr_from!(fp::FMul, FMul);
define_hyinstr_from!(fp::FDiv, FDiv);
define_hyinstr_from!(fp::FCmp, FCmp);

define_hyinstr_from!(mem::MLoad, MLoad);
define_hyinstr_from!(mem::MStore, MStore);
define_hyinstr_from!(mem::MAlloca, MAlloca);
define_hyinstr_from!(mem::MGetElementPtr, MGetElementPtr);

define_hyinstr_from!(misc::Invoke, Invoke);
define_hyinstr_from!(misc::Phi, Phi);
define_hyinstr_from!(misc::Select, Select);
define_hyinstr_from!(misc::Cast, Cast);

define_hyinstr_from!(meta::MetaAssert, MetaAssert);
define_hyinstr_from!(meta::MetaAssume, MetaAssume);

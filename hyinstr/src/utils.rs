use strum::{EnumIs, EnumTryAs};
use thiserror::Error;
use uuid::Uuid;

use crate::modules::operand::{Label, Name};

/// Structural problems found while verifying a function or module.
#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// Two definitions share a destination name.
    #[error(
        "Multiple operations with shared destination target violate SSA requirements. The name `{duplicate}` is defined more than once within the same function."
    )]
    DuplicateSSAName { duplicate: Name },

    /// No basic block with the entrypoint label was found.
    #[error(
        "By convention, the entrypoint basic block of a function must have label `block_0`. No such basic block was found in function `{function}`."
    )]
    MissingEntryBlock { function: String },

    /// An operand refers to an unresolved name.
    #[error(
        "A operand refers to an undefined name: `{undefined}`. This name was never defined in the function."
    )]
    UndefinedSSAName { undefined: Name },

    /// Provided internal function is not defined within the module.
    #[error(
        "An instruction of function `{function}` refers to an internal function referenced by `{undefined}` that is not defined within the module."
    )]
    UndefinedInternalFunction { function: String, undefined: Uuid },

    /// Provided external function is not declared within the module.
    #[error(
        "An instruction of function `{function}` refers to an external function referenced by `{undefined}` that is not declared within the module."
    )]
    UndefinedExternalFunction { function: String, undefined: Uuid },

    /// A global address refers to no global of the module.
    #[error("`{function}` refers to global `{undefined}` that is not part of the module.")]
    UndefinedGlobal { function: String, undefined: Uuid },

    /// Phi instructions must be the first instructions or following other phi instructions in a basic block.
    #[error(
        "Phi instructions must be the first instructions in a basic block or follow other phi instructions. The basic block `{block}` contains a phi instruction that is not the first instruction."
    )]
    PhiNotFirstInstruction { block: Label },

    /// The basic block referenced cannot be found within the function.
    #[error(
        "The basic block `{label}` referenced in function `{function}` is not defined within the function."
    )]
    UndefinedBasicBlock { function: String, label: Label },

    /// A basic block is stored under a key that differs from its own label.
    #[error("Basic block `{found}` is stored under label `{expected}`.")]
    BlockLabelMismatch { expected: Label, found: Label },

    /// A basic block with the given label already exists in the function.
    #[error("A basic block with label `{0}` already exists in the function.")]
    BlockLabelAlreadyExists(Label),

    /// Integer literal does not fit its declared width.
    #[error("Integer constant `{value}` does not fit in `i{bits}`.")]
    IntegerConstantOutOfRange { value: u64, bits: u32 },
}

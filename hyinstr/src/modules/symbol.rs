//! Define external symbols and linkage information for modules.
//!
//! This module provides structures to represent symbols that a module
//! references without defining (functions and global variables), and the
//! pointer type used to reference functions from operands.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumDiscriminants;
use uuid::Uuid;

use crate::{
    consts::AnyConst,
    modules::{Linkage, operand::Operand},
    types::Type,
};

/// Defines an externally linked function
///
/// This struct represents a function that is declared by the current module
/// but defined somewhere else (another module, or the runtime itself).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExternalFunction {
    /// Unique identifier for the external function. This is used internally to
    /// reference the function within the module.
    pub uuid: Uuid,

    /// The name of the external function as it appears in the linking context.
    pub name: String,

    /// The parameter types of the external function.
    pub param_types: Vec<Type>,

    /// The return type of the external function. `None` indicates a `void` return type.
    pub return_type: Option<Type>,
}

impl ExternalFunction {
    pub fn new(name: impl Into<String>, param_types: Vec<Type>, return_type: Option<Type>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            param_types,
            return_type,
        }
    }
}

/// A reference to a function symbol, internal or external.
///
/// Internal functions are defined within the current module, while external
/// functions are declared but defined outside the module.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumDiscriminants)]
#[strum_discriminants(name(FunctionPointerType))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FunctionPointer {
    /// Reference to a function defined within the current module
    Internal(Uuid),

    /// Reference to an external function (ie., defined in `ExternalFunction`)
    External(Uuid),
}

impl FunctionPointer {
    /// Get the UUID of the function pointer, regardless of its type.
    pub fn uuid(&self) -> Uuid {
        match self {
            FunctionPointer::Internal(uuid) => *uuid,
            FunctionPointer::External(uuid) => *uuid,
        }
    }

    /// Immediate operand holding this function's address.
    pub fn into_operand(self) -> Operand {
        Operand::Imm(AnyConst::Func(self))
    }
}

impl std::fmt::Display for FunctionPointerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionPointerType::Internal => write!(f, "internal"),
            FunctionPointerType::External => write!(f, "external"),
        }
    }
}

/// A global variable, defined when it carries an initializer and merely
/// declared otherwise.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalVariable {
    pub uuid: Uuid,
    pub name: String,
    pub ty: Type,
    pub initializer: Option<AnyConst>,
    pub linkage: Linkage,
    /// Whether the storage is read-only.
    pub constant: bool,
}

impl GlobalVariable {
    /// Define a new externally visible global.
    pub fn define(name: impl Into<String>, ty: Type, initializer: AnyConst) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            ty,
            initializer: Some(initializer),
            linkage: Linkage::External,
            constant: false,
        }
    }

    /// Declare a global defined in another module.
    pub fn declare(name: impl Into<String>, ty: Type) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            ty,
            initializer: None,
            linkage: Linkage::External,
            constant: false,
        }
    }

    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.initializer.is_none()
    }
}

//! Anything a call instruction may invoke: a function defined in the
//! prepared module, or a declared function serviced outside of it.
use hyinstr::{
    modules::{Function, symbol::ExternalFunction, symbol::FunctionPointer},
    types::Type,
};
use strum::EnumIs;

use crate::lowering::LoweredFunction;

/// Parameter and return types of a callable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Option<Type>,
}

#[derive(Debug, Clone, Copy, EnumIs)]
pub enum Callable<'a> {
    Function {
        function: &'a Function,
        lowered: &'a LoweredFunction,
    },
    External(&'a ExternalFunction),
}

impl<'a> Callable<'a> {
    /// Symbol name; anonymous functions have none.
    pub fn name(&self) -> Option<&'a str> {
        match self {
            Callable::Function { function, .. } => function.name.as_deref(),
            Callable::External(external) => Some(&external.name),
        }
    }

    pub fn signature(&self) -> Signature {
        match self {
            Callable::Function { function, .. } => Signature {
                params: function.params.iter().map(|(_, ty)| ty.clone()).collect(),
                ret: function.return_type.clone(),
            },
            Callable::External(external) => Signature {
                params: external.param_types.clone(),
                ret: external.return_type.clone(),
            },
        }
    }

    /// The address operand designating this callable.
    pub fn value(&self) -> FunctionPointer {
        match self {
            Callable::Function { function, .. } => FunctionPointer::Internal(function.uuid),
            Callable::External(external) => FunctionPointer::External(external.uuid),
        }
    }

    /// Lowered form, for functions defined in the module.
    pub fn lowered(&self) -> Option<&'a LoweredFunction> {
        match self {
            Callable::Function { lowered, .. } => Some(lowered),
            Callable::External(_) => None,
        }
    }
}

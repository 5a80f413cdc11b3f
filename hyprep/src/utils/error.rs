use hyinstr::{modules::InstructionRef, types::Type};
use strum::EnumIs;
use thiserror::Error;
use uuid::Uuid;

/// Failures while merging modules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Entry point `{entry}` is not defined by any of the supplied modules")]
    EntryPointNotFound { entry: String },

    #[error("Symbol `{name}` is defined by more than one module")]
    DuplicateSymbol { name: String },

    #[error("The module is already prepared and can no longer be linked against")]
    AlreadyPrepared,
}

/// What is wrong with a prepared representation.
#[derive(Debug, Error, PartialEq, Eq, EnumIs)]
pub enum ValidationErrorKind {
    #[error("{0}")]
    Malformed(#[from] hyinstr::utils::Error),

    #[error("instruction `{opname}` cannot be interpreted")]
    UnsupportedInstruction { opname: &'static str },

    #[error("call to unknown function `{callee}`")]
    UnknownCallee { callee: Uuid },

    #[error("call to `{callee}` passes {found} argument(s), {expected} expected")]
    ArgumentCountMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of call to `{callee}` has type `{found}`, `{expected}` expected")]
    ArgumentTypeMismatch {
        callee: String,
        index: usize,
        expected: Type,
        found: Type,
    },

    #[error("call to `{callee}` expects return type {found:?}, callee returns {expected:?}")]
    ReturnTypeMismatch {
        callee: String,
        expected: Option<Type>,
        found: Option<Type>,
    },

    #[error("symbol `{name}` is declared but never defined")]
    UnresolvedSymbol { name: String },

    #[error("entry point `{entry}` is missing")]
    MissingEntryPoint { entry: String },

    #[error("register {register} is out of the frame")]
    UndefinedRegister { register: u32 },

    #[error("inconsistent repository: {0}")]
    InconsistentRepository(String),
}

/// A violated interpreter invariant, with the offending function and position.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("in `{function}`{}: {kind}", fmt_site(.site))]
pub struct ValidationError {
    pub function: String,
    pub site: Option<InstructionRef>,
    pub kind: ValidationErrorKind,
}

fn fmt_site(site: &Option<InstructionRef>) -> String {
    match site {
        Some(site) => format!(" at {}#{}", site.block, site.index),
        None => String::new(),
    }
}

impl ValidationError {
    pub fn new(function: impl Into<String>, site: Option<InstructionRef>, kind: ValidationErrorKind) -> Self {
        Self {
            function: function.into(),
            site,
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("Linking failed: {0}")]
    Link(#[from] LinkError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Pass `{pass}` failed: {reason}")]
    Pass { pass: String, reason: String },

    #[error("The repository is already prepared")]
    AlreadyPrepared,
}

pub type PrepResult<T> = Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_functions_convert_into_validation_errors() {
        let kind: ValidationErrorKind = hyinstr::utils::Error::MissingEntryBlock {
            function: "f".to_string(),
        }
        .into();
        assert!(kind.is_malformed());

        let err = ValidationError::new("f", None, kind);
        assert!(err.to_string().starts_with("in `f`: By convention"));
    }
}

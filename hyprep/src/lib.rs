//! Preparation core turning parsed program modules into the densely indexed
//! form a symbolic interpreter walks.
//!
//! The usual entry point is [`repository::ModuleRepository::prepare`], which
//! links the input modules around an entry point, runs the optimization and
//! instrumentation stages, lowers every function into flat instruction
//! arrays, pools constants, classifies functions and validates the result.
//! The returned repository is frozen and may be shared between workers.

pub mod callable;
pub mod classify;
pub mod constants;
pub mod info;
pub mod linker;
pub mod lowering;
pub mod magic;
pub mod manifest;
pub mod passes;
pub mod repository;
pub mod runtime;
pub mod stats;
pub mod utils;
pub mod validator;

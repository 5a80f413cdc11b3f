//! Program representation consumed by the preparation core.
//!
//! A [`modules::Module`] is a compilation unit made of functions (each a map of
//! basic blocks), declarations of symbols defined elsewhere, global variables
//! and the [`types::layout::DataLayout`] of the target. Everything here is plain
//! data with public fields; analyses and transformations live downstream.
#![allow(clippy::manual_is_multiple_of, clippy::manual_div_ceil)]

pub mod consts;
pub mod modules;
pub mod types;
pub mod utils;

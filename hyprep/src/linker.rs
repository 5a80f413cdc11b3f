//! Module linking.
//!
//! Merges input modules into a single target. With an entry point, only the
//! modules needed to resolve symbols transitively referenced from the base
//! are pulled in; without one every module is merged.
use hyinstr::modules::Module;
use log::{debug, info};

use crate::utils::error::LinkError;

fn check_duplicates(base: &Module, incoming: &Module) -> Result<(), LinkError> {
    let defined = base.defined_symbols();
    match incoming
        .defined_symbols()
        .into_iter()
        .find(|name| defined.contains(name))
    {
        Some(name) => Err(LinkError::DuplicateSymbol { name }),
        None => Ok(()),
    }
}

fn merge(target: &mut Module, incoming: Module) -> Result<(), LinkError> {
    check_duplicates(target, &incoming)?;
    debug!(
        "Merging module with {} function(s) and {} global(s)",
        incoming.functions.len(),
        incoming.globals.len()
    );
    target.absorb(incoming);
    Ok(())
}

/// Link `modules` into `target`.
///
/// When `target` is empty the base module is chosen among `modules`: the
/// one defining `entry` if given, the first one otherwise. Returns whether
/// any module was merged into the base.
pub fn link(
    target: &mut Module,
    modules: Vec<Module>,
    entry: Option<&str>,
) -> Result<bool, LinkError> {
    if modules.is_empty() {
        return Ok(false);
    }

    let mut pending = modules;
    if target.is_empty() {
        let base = match entry {
            Some(entry) => pending
                .iter()
                .position(|m| m.function_by_name(entry).is_some())
                .ok_or_else(|| LinkError::EntryPointNotFound {
                    entry: entry.to_string(),
                })?,
            None => 0,
        };
        *target = pending.remove(base);
    }

    let mut merged = 0usize;
    match entry {
        None => {
            for module in pending {
                merge(target, module)?;
                merged += 1;
            }
        }
        Some(_) => loop {
            let undefined = target.undefined_symbols();
            let Some(position) = pending.iter().position(|m| {
                m.defined_symbols()
                    .iter()
                    .any(|name| undefined.contains(name))
            }) else {
                break;
            };
            merge(target, pending.remove(position))?;
            merged += 1;
        },
    }

    info!(
        "Linked {} module(s); {} symbol(s) remain undefined",
        merged,
        target.undefined_symbols().len()
    );
    Ok(merged > 0)
}

//! Module transformation passes run before lowering.
//!
//! Passes are grouped in two stages: optimization first, instrumentation
//! second. Every pass sees the whole module and reports whether it changed
//! anything.
use std::collections::BTreeSet;

use hyinstr::modules::Module;
use log::{debug, info};

use crate::{
    magic::internal_function_names,
    utils::{conf::ModuleOptions, error::PrepResult},
};

pub mod dce;
pub mod guards;
pub mod strip_meta;

pub use dce::DeadFunctionElimination;
pub use guards::GuardInstrumentation;
pub use strip_meta::StripMeta;

/// A whole-module transformation.
pub trait ModulePass {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Transform `module`, returning whether it changed.
    fn run(&mut self, module: &mut Module) -> PrepResult<bool>;
}

/// Ordered list of passes applied by
/// [`crate::repository::ModuleRepository::optimise_and_prepare`].
#[derive(Default)]
pub struct PreparationPipeline {
    optimize: Vec<Box<dyn ModulePass>>,
    instrument: Vec<Box<dyn ModulePass>>,
}

impl PreparationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard pipeline for `opts`.
    ///
    /// Meta instructions are always stripped. Dead functions are removed
    /// when optimizing, keeping the entry point, every name in `preserved`
    /// and the runtime-support routines alive.
    pub fn from_options(opts: &ModuleOptions, preserved: &[String]) -> Self {
        let mut pipeline = Self::new();
        pipeline.add_optimization_pass(StripMeta);

        if opts.optimize {
            let mut roots: BTreeSet<String> = preserved.iter().cloned().collect();
            if let Some(entry) = opts.entry() {
                roots.insert(entry.to_string());
            }
            roots.extend(
                internal_function_names(opts.check_div_zero, opts.check_overshift)
                    .into_iter()
                    .map(str::to_string),
            );
            pipeline.add_optimization_pass(DeadFunctionElimination::new(roots));
        }

        pipeline.add_instrumentation_pass(GuardInstrumentation::new(
            opts.check_div_zero,
            opts.check_overshift,
        ));
        pipeline
    }

    pub fn add_optimization_pass(&mut self, pass: impl ModulePass + 'static) -> &mut Self {
        self.optimize.push(Box::new(pass));
        self
    }

    pub fn add_instrumentation_pass(&mut self, pass: impl ModulePass + 'static) -> &mut Self {
        self.instrument.push(Box::new(pass));
        self
    }

    pub fn len(&self) -> usize {
        self.optimize.len() + self.instrument.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every optimization pass, then every instrumentation pass.
    /// Returns the names of the passes that changed the module.
    pub fn run(&mut self, module: &mut Module) -> PrepResult<Vec<&'static str>> {
        let mut changed = Vec::new();
        for pass in self.optimize.iter_mut().chain(self.instrument.iter_mut()) {
            debug!("Running pass `{}`", pass.name());
            if pass.run(module)? {
                changed.push(pass.name());
            }
        }
        info!("Preparation pipeline done; changed by: {:?}", changed);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_follows_options() {
        let opts = ModuleOptions::default();
        assert_eq!(PreparationPipeline::from_options(&opts, &[]).len(), 2);

        let opts = ModuleOptions {
            optimize: true,
            ..Default::default()
        };
        assert_eq!(PreparationPipeline::from_options(&opts, &[]).len(), 3);
    }

    #[test]
    fn empty_module_is_left_alone() {
        let mut module = Module::default();
        let mut pipeline = PreparationPipeline::from_options(
            &ModuleOptions {
                optimize: true,
                ..Default::default()
            },
            &[],
        );
        assert!(pipeline.run(&mut module).unwrap().is_empty());
        assert!(module.is_empty());
    }
}

//! Function classification.
//!
//! A function *escapes* when its address is used as a value anywhere in the
//! program, i.e. anywhere other than the callee slot of a direct call. Any
//! indirect call may land on an escaping function and nowhere else.
//!
//! *Internal* functions are the runtime-support routines added during
//! preparation; they are excluded from coverage and statistics.
use std::collections::BTreeSet;

use hyinstr::{
    consts::AnyConst,
    modules::{Module, instructions::HyInstr, instructions::Instruction, operand::Operand},
};
use log::{debug, info};
use uuid::Uuid;

fn collect(operand: &Operand, into: &mut BTreeSet<Uuid>) {
    if let Operand::Imm(constant) = operand {
        collect_const(constant, into);
    }
}

fn collect_const(constant: &AnyConst, into: &mut BTreeSet<Uuid>) {
    into.extend(constant.function_refs().iter().map(|ptr| ptr.uuid()));
}

/// Add every function of `module` whose address escapes to `escaping`.
///
/// The set only grows, so running the analysis twice over the same module
/// yields the same set.
pub fn collect_escaping_functions(module: &Module, escaping: &mut BTreeSet<Uuid>) {
    let before = escaping.len();

    for function in &module.functions {
        for bb in function.body.values() {
            for instr in &bb.instructions {
                match instr {
                    HyInstr::Invoke(call) => {
                        if call.direct_callee().is_none() {
                            collect(&call.function, escaping);
                        }
                        for arg in &call.args {
                            collect(arg, escaping);
                        }
                    }
                    other => {
                        for operand in other.operands() {
                            collect(operand, escaping);
                        }
                    }
                }
            }
            for operand in bb.terminator.operands() {
                collect(operand, escaping);
            }
        }
    }

    for global in &module.globals {
        if let Some(init) = &global.initializer {
            collect_const(init, escaping);
        }
    }

    info!(
        "Escape analysis found {} escaping function(s) ({} new)",
        escaping.len(),
        escaping.len() - before
    );
}

/// Resolve `names` to the functions of `module` carrying them. Names that
/// the module neither defines nor declares are skipped.
pub fn collect_internal_functions<'a>(
    module: &Module,
    names: impl IntoIterator<Item = &'a str>,
    internal: &mut BTreeSet<Uuid>,
) {
    for name in names {
        if let Some(function) = module.function_by_name(name) {
            internal.insert(function.uuid);
        } else if let Some(external) = module.external_by_name(name) {
            internal.insert(external.uuid);
        } else {
            debug!("Internal function `{}` is not part of the module", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use hyinstr::{
        consts::int::IConst,
        modules::{
            builder::FunctionBuilder,
            instructions::mem::MStore,
            symbol::{ExternalFunction, GlobalVariable},
            terminator::Ret,
        },
        types::{Type, primary::IType},
    };

    use super::*;

    fn leaf(name: &str) -> hyinstr::modules::Function {
        let mut fb = FunctionBuilder::new(name).returns(IType::I32);
        fb.terminate(Ret {
            value: Some(IConst::from(0u32).into()),
        });
        fb.build().unwrap()
    }

    fn sample() -> (Module, Uuid, Uuid, Uuid) {
        let mut module = Module::default();
        let called = module.add_function(leaf("called"));
        let stored = module.add_function(leaf("stored"));
        let in_global = module.add_function(leaf("in_global"));
        let slot = module.add_global(GlobalVariable::define(
            "table",
            Type::PTR,
            AnyConst::Aggregate(vec![AnyConst::Func(in_global), AnyConst::Null]),
        ));

        let mut fb = FunctionBuilder::new("main").returns(IType::I32);
        fb.call(called, vec![], Some(IType::I32.into()));
        fb.push(MStore {
            addr: AnyConst::Global(slot).into(),
            value: stored.into_operand(),
            alignment: None,
            ordering: None,
            volatile: false,
        });
        fb.terminate(Ret {
            value: Some(IConst::from(0u32).into()),
        });
        module.add_function(fb.build().unwrap());

        (module, called.uuid(), stored.uuid(), in_global.uuid())
    }

    #[test]
    fn direct_calls_do_not_escape() {
        let (module, called, stored, in_global) = sample();
        let mut escaping = BTreeSet::new();
        collect_escaping_functions(&module, &mut escaping);
        assert!(!escaping.contains(&called));
        assert!(escaping.contains(&stored));
        assert!(escaping.contains(&in_global));
    }

    #[test]
    fn function_passed_as_argument_escapes() {
        let mut module = Module::default();
        let callback = module.add_function(leaf("callback"));
        let qsort = module.declare_function(ExternalFunction::new("qsort", vec![Type::PTR], None));
        let mut fb = FunctionBuilder::new("main");
        fb.call(qsort, vec![callback.into_operand()], None);
        fb.terminate(Ret { value: None });
        module.add_function(fb.build().unwrap());

        let mut escaping = BTreeSet::new();
        collect_escaping_functions(&module, &mut escaping);
        assert_eq!(escaping, BTreeSet::from([callback.uuid()]));
    }

    #[test]
    fn analysis_is_idempotent() {
        let (module, ..) = sample();
        let mut escaping = BTreeSet::new();
        collect_escaping_functions(&module, &mut escaping);
        let first = escaping.clone();
        collect_escaping_functions(&module, &mut escaping);
        assert_eq!(escaping, first);
    }

    #[test]
    fn missing_internal_names_are_skipped() {
        let mut module = Module::default();
        let check = module.add_function(leaf("hy_div_zero_check"));
        let alloc = module.declare_function(ExternalFunction::new("__rust_alloc", vec![], None));

        let mut internal = BTreeSet::new();
        collect_internal_functions(
            &module,
            ["hy_div_zero_check", "hy_overshift_check", "__rust_alloc"],
            &mut internal,
        );
        assert_eq!(internal, BTreeSet::from([check.uuid(), alloc.uuid()]));
    }
}

//! Final checks over a prepared repository.
//!
//! The interpreter relies on every invariant checked here without
//! re-checking it, so the first violation aborts preparation.
use std::collections::BTreeMap;

use hyinstr::{
    modules::{
        Function, InstructionRef,
        instructions::{HyInstr, Instruction, misc::Invoke},
        operand::{Name, Operand},
    },
    types::Type,
};
use log::{debug, info};

use crate::{
    lowering::{LoweredFunction, OperandSlot},
    magic::{SPECIAL_FUNCTIONS, internal_function_names},
    repository::ModuleRepository,
    utils::error::{ValidationError, ValidationErrorKind},
};

type Check = Result<(), ValidationError>;

/// Check `repository`, returning the first violation found.
///
/// In order: structural verification of every function, instruction
/// support, direct call signatures, unresolved declarations, the entry
/// point and the internal consistency of the lowered form.
pub fn validate(repository: &ModuleRepository) -> Check {
    let module = repository.module();

    for function in &module.functions {
        function
            .verify()
            .map_err(|e| ValidationError::new(function.display_name(), None, e.into()))?;
        check_instructions(function)?;
        check_calls(repository, function)?;
    }
    check_declarations(repository)?;
    check_entry_point(repository)?;
    check_lowered(repository)?;

    info!("Validated {} function(s)", module.functions.len());
    Ok(())
}

fn check_instructions(function: &Function) -> Check {
    for (site, instr) in function.iter_instructions() {
        if instr.is_meta_instruction() {
            return Err(ValidationError::new(
                function.display_name(),
                Some(site),
                ValidationErrorKind::UnsupportedInstruction {
                    opname: instr.op().opname(),
                },
            ));
        }
    }
    Ok(())
}

/// Types of every register of `function`, where known.
fn register_types(function: &Function) -> BTreeMap<Name, Type> {
    let mut types: BTreeMap<Name, Type> = function.params.iter().cloned().collect();
    for (_, instr) in function.iter_instructions() {
        if let (Some(dest), Some(ty)) = (instr.destination(), instr.destination_type()) {
            types.insert(dest, ty);
        }
    }
    types
}

fn check_call(
    repository: &ModuleRepository,
    function: &Function,
    types: &BTreeMap<Name, Type>,
    site: InstructionRef,
    call: &Invoke,
) -> Check {
    let Some(callee) = call.direct_callee() else {
        return Ok(());
    };
    let fail = |kind| Err(ValidationError::new(function.display_name(), Some(site), kind));

    let Some(callable) = repository.callable(&callee) else {
        return fail(ValidationErrorKind::UnknownCallee {
            callee: callee.uuid(),
        });
    };
    let name = callable
        .name()
        .map_or_else(|| callee.uuid().to_string(), str::to_string);
    let signature = callable.signature();

    if signature.params.len() != call.args.len() {
        return fail(ValidationErrorKind::ArgumentCountMismatch {
            callee: name,
            expected: signature.params.len(),
            found: call.args.len(),
        });
    }

    for (index, (arg, expected)) in call.args.iter().zip(&signature.params).enumerate() {
        let found = match arg {
            Operand::Reg(name) => types.get(name).cloned(),
            Operand::Imm(constant) => constant.ty(),
        };
        if let Some(found) = found {
            if &found != expected {
                return fail(ValidationErrorKind::ArgumentTypeMismatch {
                    callee: name,
                    index,
                    expected: expected.clone(),
                    found,
                });
            }
        }
    }

    // a call site may discard the result, never invent one
    if call.ty.is_some() && call.ty != signature.ret {
        return fail(ValidationErrorKind::ReturnTypeMismatch {
            callee: name,
            expected: signature.ret,
            found: call.ty.clone(),
        });
    }
    Ok(())
}

fn check_calls(repository: &ModuleRepository, function: &Function) -> Check {
    let types = register_types(function);
    for (site, instr) in function.iter_instructions() {
        if let HyInstr::Invoke(call) = instr {
            check_call(repository, function, &types, site, call)?;
        }
    }
    Ok(())
}

fn check_declarations(repository: &ModuleRepository) -> Check {
    let module = repository.module();
    let options = repository.options();
    let internal = internal_function_names(options.check_div_zero, options.check_overshift);

    for external in module.external_functions.values() {
        let name = external.name.as_str();
        if SPECIAL_FUNCTIONS.iter().chain(&internal).any(|known| *known == name) {
            debug!("Declaration `{}` is serviced by the interpreter", name);
            continue;
        }
        return Err(ValidationError::new(
            name,
            None,
            ValidationErrorKind::UnresolvedSymbol {
                name: name.to_string(),
            },
        ));
    }

    if let Some(global) = module.globals.iter().find(|g| g.is_declaration()) {
        return Err(ValidationError::new(
            global.name.as_str(),
            None,
            ValidationErrorKind::UnresolvedSymbol {
                name: global.name.clone(),
            },
        ));
    }
    Ok(())
}

fn check_entry_point(repository: &ModuleRepository) -> Check {
    let Some(entry) = repository.options().entry() else {
        return Ok(());
    };
    match repository.module().function_by_name(entry) {
        Some(function) if function.entry().is_some() => Ok(()),
        _ => Err(ValidationError::new(
            entry,
            None,
            ValidationErrorKind::MissingEntryPoint {
                entry: entry.to_string(),
            },
        )),
    }
}

fn inconsistent(function: &str, reason: String) -> ValidationError {
    ValidationError::new(
        function,
        None,
        ValidationErrorKind::InconsistentRepository(reason),
    )
}

fn check_lowered_function(
    repository: &ModuleRepository,
    function: &Function,
    lowered: &LoweredFunction,
) -> Check {
    let name = function.display_name();
    if lowered.instructions.len() != lowered.num_instructions as usize {
        return Err(inconsistent(
            &name,
            format!(
                "{} instruction(s) stored, {} announced",
                lowered.instructions.len(),
                lowered.num_instructions
            ),
        ));
    }
    if lowered.num_args as usize != function.params.len() {
        return Err(inconsistent(&name, "argument count differs from source".into()));
    }

    let mut previous: Option<u32> = None;
    for (label, offset) in &lowered.block_entry {
        if previous.is_some_and(|p| p >= *offset) || *offset >= lowered.num_instructions {
            return Err(inconsistent(
                &name,
                format!("offset {} of {} is out of order or range", offset, label),
            ));
        }
        previous = Some(*offset);
    }
    let last = lowered
        .block_entry
        .iter()
        .next_back()
        .and_then(|(label, offset)| Some(*offset as usize + function.body.get(label)?.len()));
    if last != Some(lowered.num_instructions as usize) {
        return Err(inconsistent(
            &name,
            "last block does not end the instruction array".into(),
        ));
    }

    let table_len = repository.constant_table().len();
    for instr in &lowered.instructions {
        let registers = instr.dest.into_iter().chain(instr.operands.iter().filter_map(|slot| {
            match slot {
                OperandSlot::Register(r) => Some(*r),
                OperandSlot::Constant(_) => None,
            }
        }));
        for register in registers {
            if register >= lowered.num_registers {
                return Err(ValidationError::new(
                    name,
                    Some(instr.site),
                    ValidationErrorKind::UndefinedRegister { register },
                ));
            }
        }
        for slot in &instr.operands {
            if let OperandSlot::Constant(id) = slot {
                if *id as usize >= table_len {
                    return Err(ValidationError::new(
                        name,
                        Some(instr.site),
                        ValidationErrorKind::InconsistentRepository(format!(
                            "constant {} is missing from the table",
                            id
                        )),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_lowered(repository: &ModuleRepository) -> Check {
    let module = repository.module();
    if repository.functions().len() != module.functions.len() {
        return Err(inconsistent(
            "<module>",
            format!(
                "{} function(s) lowered out of {}",
                repository.functions().len(),
                module.functions.len()
            ),
        ));
    }
    if repository.constant_table().len() != repository.constants().len() {
        return Err(inconsistent(
            "<module>",
            "constant table is out of date".into(),
        ));
    }

    for (index, function) in module.functions.iter().enumerate() {
        let lowered = match repository.function_index(function.uuid) {
            Some(i) if i == index => &repository.functions()[i],
            _ => {
                return Err(inconsistent(
                    &function.display_name(),
                    "function lookup does not match definition order".into(),
                ));
            }
        };
        if lowered.uuid != function.uuid || lowered.source != index {
            return Err(inconsistent(
                &function.display_name(),
                "lowered function points to another source".into(),
            ));
        }
        check_lowered_function(repository, function, lowered)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hyinstr::{
        consts::int::IConst,
        modules::{
            Module, builder::FunctionBuilder, instructions::meta::MetaAssert,
            symbol::ExternalFunction, terminator::Ret,
        },
        types::primary::IType,
    };

    use super::*;
    use crate::{passes::PreparationPipeline, utils::conf::ModuleOptions};

    fn prepared(module: Module) -> ModuleRepository {
        let mut repository = ModuleRepository::new(ModuleOptions::default());
        repository.link(vec![module], Some("main")).unwrap();
        repository.optimise_and_prepare(&[]).unwrap();
        repository
    }

    fn main_calling(callee: ExternalFunction, args: Vec<Operand>, ret: Option<Type>) -> Module {
        let mut module = Module::default();
        let ptr = module.declare_function(callee);
        let mut fb = FunctionBuilder::new("main").returns(IType::I32);
        fb.call(ptr, args, ret);
        fb.terminate(Ret {
            value: Some(IConst::from(0u32).into()),
        });
        module.add_function(fb.build().unwrap());
        module
    }

    #[test]
    fn special_declarations_are_accepted() {
        let module = main_calling(
            ExternalFunction::new("abort", vec![], None),
            vec![],
            None,
        );
        prepared(module).check_module().unwrap();
    }

    #[test]
    fn argument_count_is_checked() {
        let module = main_calling(
            ExternalFunction::new("exit", vec![IType::I32.into()], None),
            vec![],
            None,
        );
        let err = prepared(module).check_module().unwrap_err();
        assert_eq!(err.function, "main");
        assert!(err.site.is_some());
        assert_eq!(
            err.kind,
            ValidationErrorKind::ArgumentCountMismatch {
                callee: "exit".into(),
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn argument_types_are_checked() {
        let module = main_calling(
            ExternalFunction::new("exit", vec![IType::I32.into()], None),
            vec![IConst::from(1u64).into()],
            None,
        );
        let err = prepared(module).check_module().unwrap_err();
        assert!(err.kind.is_argument_type_mismatch());
    }

    #[test]
    fn return_types_are_checked() {
        let module = main_calling(
            ExternalFunction::new("abort", vec![], None),
            vec![],
            Some(IType::I32.into()),
        );
        let err = prepared(module).check_module().unwrap_err();
        assert!(err.kind.is_return_type_mismatch());
    }

    #[test]
    fn leftover_meta_instructions_are_rejected() {
        let mut fb = FunctionBuilder::new("main");
        fb.push(MetaAssert {
            condition: IConst::from(true).into(),
        });
        fb.terminate(Ret { value: None });
        let mut module = Module::default();
        module.add_function(fb.build().unwrap());

        // a pipeline without the meta stripping pass
        let mut repository = ModuleRepository::new(ModuleOptions::default());
        repository.link(vec![module], Some("main")).unwrap();
        repository
            .optimise_and_prepare_with(&mut PreparationPipeline::new())
            .unwrap();
        let err = repository.check_module().unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::UnsupportedInstruction { opname: "!assert" }
        );
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let mut fb = FunctionBuilder::new("start");
        fb.terminate(Ret { value: None });
        let mut module = Module::default();
        module.add_function(fb.build().unwrap());

        let mut repository = ModuleRepository::new(ModuleOptions::default());
        repository.link(vec![module], None).unwrap();
        repository.optimise_and_prepare(&[]).unwrap();
        assert!(repository.check_module().unwrap_err().kind.is_missing_entry_point());
    }
}

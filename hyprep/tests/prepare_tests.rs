mod common;

use std::{collections::BTreeSet, sync::Arc, thread};

use common::*;
use hyinstr::{
    consts::{AnyConst, int::IConst},
    modules::{
        Module,
        builder::FunctionBuilder,
        instructions::HyInstr,
        operand::Operand,
        terminator::Ret,
    },
    types::primary::IType,
};
use hyprep::{
    constants::Cell,
    lowering::OperandSlot,
    magic::{ASSEMBLY_FILE_NAME, DIV_ZERO_CHECK_FN_NAME, INTRINSIC_LIB_NAME, MODULE_FILE_NAME},
    manifest::{DirectoryHandler, ModuleStorage},
    repository::ModuleRepository,
    utils::{
        conf::ModuleOptions,
        error::{PrepError, ValidationErrorKind},
    },
};

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("hyprep-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn linked_program() -> Arc<ModuleRepository> {
    ModuleRepository::prepare(
        vec![library("unused"), main_calling("halve"), library("halve")],
        ModuleOptions::default(),
        &[],
    )
    .unwrap()
}

#[test]
fn identical_constants_resolve_to_one_id() {
    let repository = linked_program();

    // `i32 2` is used by `halve`, `i32 10` by `main`
    let two: AnyConst = IConst::from(2u32).into();
    let id = repository.constants().id_of(&two).unwrap();
    assert_eq!(repository.find_constant(&two), Some(id));

    let mut uses = 0;
    for lowered in repository.functions() {
        for instr in &lowered.instructions {
            for slot in &instr.operands {
                if let OperandSlot::Constant(c) = slot {
                    if repository.get_constant(*c).unwrap().constant == two {
                        assert_eq!(*c, id);
                        uses += 1;
                    }
                }
            }
        }
    }
    assert_eq!(uses, 1);
}

#[test]
fn constant_ids_are_contiguous() {
    let repository = linked_program();
    let n = repository.constants().len();
    assert_eq!(repository.constant_table().len(), n);
    for id in 0..n as u32 {
        let record = repository.get_constant(id).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(
            repository.constant_value(id),
            Some(&Cell::evaluate(&record.constant, &repository.module().data_layout))
        );
    }
    assert!(repository.get_constant(n as u32).is_none());
}

#[test]
fn block_offsets_cover_every_function() {
    let repository = linked_program();
    for lowered in repository.functions() {
        let function = repository.source(lowered).unwrap();
        let offsets: Vec<_> = lowered.block_entry.iter().collect();
        for pair in offsets.windows(2) {
            assert!(pair[0].1 < pair[1].1);
        }
        let (label, offset) = offsets.last().unwrap();
        assert_eq!(
            **offset as usize + function.body[*label].len(),
            lowered.num_instructions as usize
        );
    }
}

#[test]
fn linking_a_complete_module_is_a_no_op() {
    let mut repository = ModuleRepository::new(ModuleOptions::default());
    assert!(!repository.link(vec![library("halve")], None).unwrap());
    assert_eq!(repository.module().functions.len(), 1);
}

#[test]
fn linking_pulls_in_required_symbols() {
    let mut repository = ModuleRepository::new(ModuleOptions::default());
    assert!(
        repository
            .link(vec![main_calling("halve"), library("halve")], Some("main"))
            .unwrap()
    );
    assert!(repository.module().undefined_symbols().is_empty());
}

#[test]
fn missing_entry_point_fails_linking() {
    let result = ModuleRepository::prepare(vec![library("halve")], ModuleOptions::default(), &[]);
    assert!(matches!(result, Err(PrepError::Link(_))));
}

#[test]
fn stored_addresses_escape() {
    let repository =
        ModuleRepository::prepare(vec![storing_address("target", "direct")], ModuleOptions::default(), &[])
            .unwrap();
    let target = pointer_of(repository.module(), "target");
    let direct = pointer_of(repository.module(), "direct");

    assert!(repository.is_escaping(target.uuid()));
    assert!(!repository.is_escaping(direct.uuid()));
    let candidates: Vec<_> = repository
        .escaping_callables()
        .map(|callable| callable.value())
        .collect();
    assert_eq!(candidates, vec![target]);
}

#[test]
fn classification_is_idempotent() {
    let mut repository = ModuleRepository::new(ModuleOptions::default());
    repository
        .link(vec![storing_address("target", "direct")], Some("main"))
        .unwrap();
    repository.optimise_and_prepare(&[]).unwrap();

    let escaping = repository.escaping_functions().clone();
    let internal = repository.internal_functions().clone();
    repository.classify();
    assert_eq!(repository.escaping_functions(), &escaping);
    assert_eq!(repository.internal_functions(), &internal);
}

#[test]
fn unresolved_reference_is_rejected() {
    let result = ModuleRepository::prepare(vec![main_calling("nowhere")], ModuleOptions::default(), &[]);
    match result {
        Err(PrepError::Validation(err)) => assert_eq!(
            err.kind,
            ValidationErrorKind::UnresolvedSymbol {
                name: "nowhere".to_string()
            }
        ),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn optimization_keeps_preserved_symbols() {
    let mut module = main_calling("halve");
    module.add_function(halve("halve"));
    module.add_function(halve("exported"));
    module.add_function(halve("dropped"));
    module.resolve_declarations();

    let options = ModuleOptions {
        optimize: true,
        ..Default::default()
    };
    let repository =
        ModuleRepository::prepare(vec![module], options, &["exported".to_string()]).unwrap();
    let names: BTreeSet<_> = repository
        .module()
        .functions
        .iter()
        .filter_map(|f| f.name.clone())
        .collect();
    assert_eq!(
        names,
        BTreeSet::from(["main".to_string(), "halve".to_string(), "exported".to_string()])
    );
}

/// `main` dividing 10 by 5 through `divide`.
fn division_program() -> Module {
    let mut module = Module::default();
    let divide = module.add_function(divide("divide"));
    let mut fb = FunctionBuilder::new("main").returns(IType::I32);
    let r = fb.call(
        divide,
        vec![IConst::from(10u32).into(), IConst::from(5u32).into()],
        Some(IType::I32.into()),
    );
    fb.terminate(Ret {
        value: r.map(Operand::Reg),
    });
    module.add_function(fb.build().unwrap());
    module
}

#[test]
fn runtime_library_enables_guards() {
    let dir = temp_dir("libs");
    std::fs::write(
        dir.join(INTRINSIC_LIB_NAME),
        ModuleStorage::encode(&support_library()).unwrap(),
    )
    .unwrap();
    let options = ModuleOptions {
        library_dir: Some(dir.clone()),
        ..Default::default()
    };

    let repository = ModuleRepository::prepare(vec![division_program()], options, &[]).unwrap();
    let module = repository.module();
    let check = module.function_by_name(DIV_ZERO_CHECK_FN_NAME).unwrap();
    assert!(repository.is_internal(check.uuid));
    assert!(!repository.lowered(check.uuid).unwrap().track_coverage);

    let divide = module.function_by_name("divide").unwrap();
    let calls: Vec<_> = divide
        .iter_instructions()
        .filter_map(|(_, instr)| match instr {
            HyInstr::Invoke(call) => call.direct_callee(),
            _ => None,
        })
        .collect();
    assert_eq!(calls, vec![pointer_of(module, DIV_ZERO_CHECK_FN_NAME)]);

    // guard instructions inherit the division's location
    let lowered = repository.lowered(divide.uuid).unwrap();
    for instr in &lowered.instructions[..3] {
        assert_eq!(repository.infos().get(instr.info).unwrap().line, 4);
    }

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn missing_runtime_library_is_fatal() {
    let dir = temp_dir("empty");
    let options = ModuleOptions {
        library_dir: Some(dir.clone()),
        ..Default::default()
    };
    let result = ModuleRepository::prepare(vec![division_program()], options, &[]);
    assert!(matches!(result, Err(PrepError::Io(_))));
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn manifest_writes_enabled_artifacts() {
    let dir = temp_dir("manifest");
    let options = ModuleOptions {
        output_module: true,
        ..Default::default()
    };
    let repository = ModuleRepository::prepare(vec![division_program()], options, &[]).unwrap();
    repository.manifest(&DirectoryHandler::new(dir.clone()), false);

    let text = std::fs::read_to_string(dir.join(ASSEMBLY_FILE_NAME)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    for info in repository.infos().iter() {
        assert!(lines[info.assembly_line as usize - 1].starts_with("  "));
    }

    let decoded = ModuleStorage::load(&dir.join(MODULE_FILE_NAME)).unwrap();
    assert_eq!(&decoded, repository.module());

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn prepared_repository_is_shared_read_only() {
    let repository = linked_program();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let repository = Arc::clone(&repository);
            thread::spawn(move || {
                repository
                    .functions()
                    .iter()
                    .map(|f| f.num_instructions as usize)
                    .sum::<usize>()
            })
        })
        .collect();
    let expected = repository.infos().len();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

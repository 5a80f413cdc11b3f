use std::collections::BTreeSet;

use hyinstr::{
    consts::{AnyConst, int::IConst},
    modules::{
        Linkage, Module,
        builder::FunctionBuilder,
        instructions::{Instruction, int::{IAdd, OverflowSignednessPolicy}},
        operand::Operand,
        symbol::{ExternalFunction, FunctionPointer, GlobalVariable},
        terminator::Ret,
    },
    types::{Type, primary::IType},
};

fn library() -> Module {
    let mut module = Module::default();
    let mut fb = FunctionBuilder::new("add_one").returns(IType::I64);
    let x = fb.param(IType::I64);
    let dest = fb.fresh_name();
    fb.push(IAdd {
        dest,
        ty: IType::I64,
        lhs: x.into(),
        rhs: IConst::from(1u64).into(),
        variant: OverflowSignednessPolicy::Wrap,
    });
    fb.terminate(Ret {
        value: Some(dest.into()),
    });
    module.add_function(fb.build().unwrap());
    module
}

fn program() -> Module {
    let mut module = Module::default();
    let add_one = module.declare_function(ExternalFunction::new(
        "add_one",
        vec![IType::I64.into()],
        Some(IType::I64.into()),
    ));
    module.add_global(GlobalVariable::define(
        "callbacks",
        Type::PTR,
        AnyConst::Aggregate(vec![AnyConst::Func(add_one), AnyConst::Null]),
    ));

    let mut fb = FunctionBuilder::new("main").returns(IType::I64);
    let r = fb.call(add_one, vec![IConst::from(41u64).into()], Some(IType::I64.into()));
    fb.terminate(Ret {
        value: r.map(Operand::Reg),
    });
    module.add_function(fb.build().unwrap());
    module
}

#[test]
fn symbols_before_and_after_linking() {
    let mut main = program();
    assert_eq!(main.defined_symbols(), BTreeSet::from(["main".into(), "callbacks".into()]));
    assert_eq!(main.undefined_symbols(), BTreeSet::from(["add_one".into()]));

    main.absorb(library());
    assert!(main.undefined_symbols().is_empty());
    main.verify().unwrap();

    let add_one = main.function_by_name("add_one").unwrap().uuid;
    let init = main.global_by_name("callbacks").unwrap().initializer.clone();
    assert_eq!(
        init,
        Some(AnyConst::Aggregate(vec![
            AnyConst::Func(FunctionPointer::Internal(add_one)),
            AnyConst::Null,
        ]))
    );

    let main_fn = main.function_by_name("main").unwrap();
    let callees: Vec<_> = main_fn
        .iter_operands()
        .filter_map(|op| match op {
            Operand::Imm(AnyConst::Func(ptr)) => Some(*ptr),
            _ => None,
        })
        .collect();
    assert_eq!(callees, vec![FunctionPointer::Internal(add_one)]);
}

#[test]
fn private_definitions_do_not_satisfy_declarations() {
    let mut main = program();
    let mut lib = library();
    lib.functions[0].linkage = Linkage::Private;

    main.absorb(lib);
    assert_eq!(main.undefined_symbols(), BTreeSet::from(["add_one".into()]));
    assert_eq!(main.external_functions.len(), 1);
}

#[test]
fn destinations_are_typed() {
    let lib = library();
    let (_, instr) = lib.functions[0].iter_instructions().next().unwrap();
    assert_eq!(instr.destination_type(), Some(Type::from(IType::I64)));
}

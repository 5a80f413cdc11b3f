#![allow(dead_code)]

use hyinstr::{
    consts::{AnyConst, int::IConst},
    modules::{
        Function, Module,
        builder::FunctionBuilder,
        instructions::{
            int::{IDiv, IntegerSignedness},
            mem::MStore,
        },
        operand::Operand,
        symbol::{ExternalFunction, FunctionPointer, GlobalVariable},
        terminator::Ret,
    },
    types::{Type, primary::IType},
};
use hyprep::magic::DIV_ZERO_CHECK_FN_NAME;

/// `name(x: i32) -> i32 { ret x / 2 }`
pub fn halve(name: &str) -> Function {
    let mut fb = FunctionBuilder::new(name).returns(IType::I32);
    let x = fb.param(IType::I32);
    let q = fb.fresh_name();
    fb.push(IDiv {
        dest: q,
        ty: IType::I32,
        lhs: x.into(),
        rhs: IConst::from(2u32).into(),
        signedness: IntegerSignedness::Signed,
    });
    fb.terminate(Ret {
        value: Some(q.into()),
    });
    fb.build().unwrap()
}

/// `name(a: i32, b: i32) -> i32 { ret a / b }`, at `div.c:4`.
pub fn divide(name: &str) -> Function {
    let mut fb = FunctionBuilder::new(name)
        .returns(IType::I32)
        .defined_at("div.c", 3);
    let a = fb.param(IType::I32);
    let b = fb.param(IType::I32);
    let q = fb.fresh_name();
    fb.at("div.c", 4).push(IDiv {
        dest: q,
        ty: IType::I32,
        lhs: a.into(),
        rhs: b.into(),
        signedness: IntegerSignedness::Signed,
    });
    fb.terminate(Ret {
        value: Some(q.into()),
    });
    fb.build().unwrap()
}

/// `main` calling `callee(i32) -> i32` through a declaration.
pub fn main_calling(callee: &str) -> Module {
    let mut module = Module::default();
    let decl = module.declare_function(ExternalFunction::new(
        callee,
        vec![IType::I32.into()],
        Some(IType::I32.into()),
    ));
    let mut fb = FunctionBuilder::new("main")
        .returns(IType::I32)
        .defined_at("main.c", 1);
    let r = fb.call(decl, vec![IConst::from(10u32).into()], Some(IType::I32.into()));
    fb.terminate(Ret {
        value: r.map(Operand::Reg),
    });
    module.add_function(fb.build().unwrap());
    module
}

/// Module defining `name` as [`halve`].
pub fn library(name: &str) -> Module {
    let mut module = Module::default();
    module.add_function(halve(name));
    module
}

/// Runtime-support module providing the division check.
pub fn support_library() -> Module {
    let mut fb = FunctionBuilder::new(DIV_ZERO_CHECK_FN_NAME);
    fb.param(IType::I64);
    fb.terminate(Ret { value: None });
    let mut module = Module::default();
    module.add_function(fb.build().unwrap());
    module
}

/// Stores the address of `target` into a fresh global `slot`, and calls
/// `direct` directly.
pub fn storing_address(target: &str, direct: &str) -> Module {
    let mut module = Module::default();
    let target = module.add_function(halve(target));
    let direct = module.add_function(halve(direct));
    let slot = module.add_global(GlobalVariable::define(
        "slot",
        Type::PTR,
        AnyConst::Null,
    ));

    let mut fb = FunctionBuilder::new("main").returns(IType::I32);
    fb.push(MStore {
        addr: AnyConst::Global(slot).into(),
        value: target.into_operand(),
        alignment: None,
        ordering: None,
        volatile: false,
    });
    let r = fb.call(direct, vec![IConst::from(8u32).into()], Some(IType::I32.into()));
    fb.terminate(Ret {
        value: r.map(Operand::Reg),
    });
    module.add_function(fb.build().unwrap());
    module
}

pub fn pointer_of(module: &Module, name: &str) -> FunctionPointer {
    FunctionPointer::Internal(module.function_by_name(name).unwrap().uuid)
}

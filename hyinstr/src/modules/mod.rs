//! Instruction IR modules
//!
//! A [`Module`] is the unit handed around by front-ends and linkers: a list
//! of function bodies, the declarations of functions it expects someone else
//! to define, its global variables and the target [`DataLayout`].
//!
//! - `instructions`: the instruction set and the [`instructions::HyInstr`] union
//! - `terminator`: block terminators
//! - `operand`: shared operand and SSA name types
//! - `symbol`: external functions, globals and function pointers
//! - `builder`: incremental construction of functions
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    consts::AnyConst,
    modules::{
        instructions::{HyInstr, Instruction},
        operand::{Label, Name, Operand},
        symbol::{ExternalFunction, FunctionPointer, GlobalVariable},
        terminator::Terminator,
    },
    types::{Type, layout::DataLayout},
    utils::Error,
};

pub mod builder;
pub mod fmt;
pub mod instructions;
pub mod operand;
pub mod symbol;
pub mod terminator;

/// All Global Variables and Functions have one of the following types of linkage:
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Linkage {
    /// Only directly accessible by objects in the current module. Never
    /// visible to the linker.
    #[default]
    Private,

    /// Similar to `Linkage::Private`, but the value shows as a local symbol.
    ///
    /// This corresponds to the notion of the 'static' keyword in C.
    Internal,

    /// May be referenced by other modules, and resolves their declarations
    /// of the same name.
    External,
}

/// Position of an instruction inside a function body.
///
/// `index == block.instructions.len()` designates the terminator.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstructionRef {
    pub block: Label,
    pub index: usize,
}

/// Source position attached to a function or an instruction.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugLoc {
    pub file: String,
    pub line: u32,
}

/// A basic block within a function, containing a sequence of instructions
/// and ending with a control flow terminator.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub label: Label,
    pub instructions: Vec<HyInstr>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn new(label: Label, terminator: impl Into<Terminator>) -> Self {
        Self {
            label,
            instructions: Vec::new(),
            terminator: terminator.into(),
        }
    }

    /// Number of positions in the block, terminator included.
    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len() + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A function made of basic blocks and parameter metadata.
///
/// By convention the entrypoint is the basic block labelled [`Label::NIL`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub params: Vec<(Name, Type)>,
    pub return_type: Option<Type>,
    pub body: BTreeMap<Label, BasicBlock>,
    pub linkage: Linkage,
    /// Location of the function definition.
    pub debug: Option<DebugLoc>,
    /// Per-instruction locations; missing entries fall back to `debug`.
    pub locations: BTreeMap<InstructionRef, DebugLoc>,
}

impl Function {
    /// Name used in diagnostics; the UUID when the function is anonymous.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("@{}", self.uuid))
    }

    /// Whether other modules may resolve their declarations against this function.
    #[inline]
    pub fn is_exported(&self) -> bool {
        self.linkage == Linkage::External && self.name.is_some()
    }

    #[inline]
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.body.get(&Label::NIL)
    }

    /// Total number of positions (instructions and terminators).
    pub fn num_instructions(&self) -> usize {
        self.body.values().map(BasicBlock::len).sum()
    }

    /// Iterate the non-terminator instructions in layout order.
    pub fn iter_instructions(&self) -> impl Iterator<Item = (InstructionRef, &HyInstr)> {
        self.body.iter().flat_map(|(label, bb)| {
            bb.instructions.iter().enumerate().map(move |(index, instr)| {
                (
                    InstructionRef {
                        block: *label,
                        index,
                    },
                    instr,
                )
            })
        })
    }

    /// Every operand of the body, terminators included.
    pub fn iter_operands(&self) -> impl Iterator<Item = &Operand> {
        self.body.values().flat_map(|bb| {
            bb.instructions
                .iter()
                .flat_map(|instr| instr.operands())
                .chain(bb.terminator.operands())
        })
    }

    /// Mutable counterpart of [`Function::iter_operands`].
    pub fn iter_operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.body.values_mut().flat_map(|bb| {
            bb.instructions
                .iter_mut()
                .flat_map(|instr| instr.operands_mut())
                .chain(bb.terminator.operands_mut())
        })
    }

    /// Source location of the instruction at `site`.
    pub fn location(&self, site: InstructionRef) -> Option<&DebugLoc> {
        self.locations.get(&site).or(self.debug.as_ref())
    }

    /// Insert `instr` before position `index` of `block`, shifting the
    /// locations of the following instructions. Returns `false` when the
    /// block does not exist.
    pub fn insert_instruction(&mut self, block: Label, index: usize, instr: HyInstr) -> bool {
        let Some(bb) = self.body.get_mut(&block) else {
            return false;
        };
        let index = index.min(bb.instructions.len());
        bb.instructions.insert(index, instr);

        let shifted: Vec<_> = self
            .locations
            .range(InstructionRef { block, index }..=InstructionRef {
                block,
                index: usize::MAX,
            })
            .map(|(site, _)| *site)
            .collect();
        for site in shifted.into_iter().rev() {
            if let Some(loc) = self.locations.remove(&site) {
                self.locations.insert(
                    InstructionRef {
                        block,
                        index: site.index + 1,
                    },
                    loc,
                );
            }
        }
        true
    }

    /// Find next available [`Name`] for a new definition.
    pub fn next_available_name(&self) -> Name {
        let mut max_index = None;
        for (name, _) in &self.params {
            max_index = max_index.max(Some(name.0));
        }

        for bb in self.body.values() {
            for instr in &bb.instructions {
                if let Some(dest) = instr.destination() {
                    max_index = max_index.max(Some(dest.0));
                }
                for name in instr.dependencies() {
                    max_index = max_index.max(Some(name.0));
                }
            }
        }

        Name(max_index.map_or(0, |i| i + 1))
    }

    /// Verify SSA form:
    /// 1) Each operand refers to a defined name.
    /// 2) Each name is defined exactly once.
    pub fn check_ssa(&self) -> Result<(), Error> {
        let mut defined_names = BTreeSet::new();

        for (name, _) in self.params.iter() {
            if !defined_names.insert(*name) {
                return Err(Error::DuplicateSSAName { duplicate: *name });
            }
        }

        for bb in self.body.values() {
            for instr in &bb.instructions {
                if let Some(dest) = instr.destination() {
                    if !defined_names.insert(dest) {
                        return Err(Error::DuplicateSSAName { duplicate: dest });
                    }
                }
            }
        }

        for bb in self.body.values() {
            let deps = bb
                .instructions
                .iter()
                .flat_map(|instr| instr.dependencies())
                .chain(bb.terminator.dependencies());
            for name in deps {
                if !defined_names.contains(&name) {
                    return Err(Error::UndefinedSSAName { undefined: name });
                }
            }
        }

        Ok(())
    }

    /// Structural verification: entry block, block labels, SSA, branch
    /// targets, phi placement and integer literal widths.
    pub fn verify(&self) -> Result<(), Error> {
        if self.entry().is_none() {
            return Err(Error::MissingEntryBlock {
                function: self.display_name(),
            });
        }

        for (label, bb) in &self.body {
            if *label != bb.label {
                return Err(Error::BlockLabelMismatch {
                    expected: *label,
                    found: bb.label,
                });
            }

            let mut seen_non_phi = false;
            for instr in &bb.instructions {
                match instr {
                    HyInstr::Phi(phi) => {
                        if seen_non_phi {
                            return Err(Error::PhiNotFirstInstruction { block: *label });
                        }
                        for (pred, _) in &phi.values {
                            if !self.body.contains_key(pred) {
                                return Err(Error::UndefinedBasicBlock {
                                    function: self.display_name(),
                                    label: *pred,
                                });
                            }
                        }
                    }
                    _ => seen_non_phi = true,
                }
            }

            for target in bb.terminator.iter_targets() {
                if !self.body.contains_key(&target) {
                    return Err(Error::UndefinedBasicBlock {
                        function: self.display_name(),
                        label: target,
                    });
                }
            }
        }

        for op in self.iter_operands() {
            if let Operand::Imm(constant) = op {
                let mut result = Ok(());
                constant.visit(&mut |c| {
                    if let AnyConst::Int(iconst) = c {
                        if result.is_ok() && !iconst.verify() {
                            result = Err(Error::IntegerConstantOutOfRange {
                                value: iconst.value,
                                bits: iconst.ty.num_bits(),
                            });
                        }
                    }
                });
                result?;
            }
        }

        self.check_ssa()
    }
}

/// A module containing defined functions and references to external ones.
///
/// `Module` acts as the compilation unit boundary for symbol visibility.
/// Functions defined here appear in `functions`, in definition order;
/// references to functions not defined locally are listed in
/// `external_functions`. Globals without an initializer are declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    pub functions: Vec<Function>,
    pub external_functions: BTreeMap<Uuid, ExternalFunction>,
    pub globals: Vec<GlobalVariable>,
    pub data_layout: DataLayout,
}

impl Module {
    pub fn new(data_layout: DataLayout) -> Self {
        Self {
            data_layout,
            ..Default::default()
        }
    }

    /// Whether the module holds no symbol at all.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.external_functions.is_empty() && self.globals.is_empty()
    }

    /// Add a function definition and return a pointer to it.
    pub fn add_function(&mut self, function: Function) -> FunctionPointer {
        let uuid = function.uuid;
        self.functions.push(function);
        FunctionPointer::Internal(uuid)
    }

    /// Declare a function defined elsewhere. Declaring the same name twice
    /// returns the existing declaration.
    pub fn declare_function(&mut self, external: ExternalFunction) -> FunctionPointer {
        if let Some(existing) = self
            .external_functions
            .values()
            .find(|ext| ext.name == external.name)
        {
            return FunctionPointer::External(existing.uuid);
        }
        let uuid = external.uuid;
        self.external_functions.insert(uuid, external);
        FunctionPointer::External(uuid)
    }

    pub fn add_global(&mut self, global: GlobalVariable) -> Uuid {
        let uuid = global.uuid;
        self.globals.push(global);
        uuid
    }

    pub fn function(&self, uuid: Uuid) -> Option<&Function> {
        self.functions.iter().find(|f| f.uuid == uuid)
    }

    pub fn function_mut(&mut self, uuid: Uuid) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.uuid == uuid)
    }

    /// Look up a named function definition. Exported definitions win over
    /// private ones of the same name.
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        let mut candidates = self
            .functions
            .iter()
            .filter(|f| f.name.as_deref() == Some(name));
        let first = candidates.next()?;
        if first.is_exported() {
            return Some(first);
        }
        candidates.find(|f| f.is_exported()).or(Some(first))
    }

    pub fn external_by_name(&self, name: &str) -> Option<&ExternalFunction> {
        self.external_functions.values().find(|ext| ext.name == name)
    }

    pub fn global(&self, uuid: Uuid) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.uuid == uuid)
    }

    pub fn global_by_name(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Resolve the textual name of a function, declaration or global.
    pub fn symbol_name(&self, uuid: Uuid) -> Option<&str> {
        if let Some(function) = self.function(uuid) {
            return function.name.as_deref();
        }
        if let Some(external) = self.external_functions.get(&uuid) {
            return Some(&external.name);
        }
        self.global(uuid).map(|g| g.name.as_str())
    }

    /// Names this module makes available to other modules.
    pub fn defined_symbols(&self) -> BTreeSet<String> {
        let functions = self
            .functions
            .iter()
            .filter(|f| f.is_exported())
            .filter_map(|f| f.name.clone());
        let globals = self
            .globals
            .iter()
            .filter(|g| !g.is_declaration() && g.linkage == Linkage::External)
            .map(|g| g.name.clone());
        functions.chain(globals).collect()
    }

    /// Names this module references but does not define.
    pub fn undefined_symbols(&self) -> BTreeSet<String> {
        let defined = self.defined_symbols();
        let functions = self.external_functions.values().map(|ext| ext.name.clone());
        let globals = self
            .globals
            .iter()
            .filter(|g| g.is_declaration())
            .map(|g| g.name.clone());
        functions
            .chain(globals)
            .filter(|name| !defined.contains(name))
            .collect()
    }

    /// Visit every constant reachable from the module: instruction and
    /// terminator immediates, and global initializers. Aggregates are
    /// visited parents first.
    pub fn visit_constants_mut(&mut self, f: &mut impl FnMut(&mut AnyConst)) {
        for function in self.functions.iter_mut() {
            for op in function.iter_operands_mut() {
                if let Operand::Imm(constant) = op {
                    constant.visit_mut(f);
                }
            }
        }
        for global in self.globals.iter_mut() {
            if let Some(init) = global.initializer.as_mut() {
                init.visit_mut(f);
            }
        }
    }

    /// Move the content of `other` into this module and resolve the
    /// declarations that the union now defines.
    pub fn absorb(&mut self, other: Module) {
        if other.data_layout != self.data_layout {
            warn!(
                "Linking modules with different data layouts ({:?} vs {:?}); keeping the first one",
                self.data_layout.endianness, other.data_layout.endianness
            );
        }

        self.functions.extend(other.functions);
        self.external_functions.extend(other.external_functions);
        self.globals.extend(other.globals);
        self.resolve_declarations();
    }

    /// Bind declarations to definitions of the same name and merge
    /// duplicate declarations. References are rewritten in place.
    pub fn resolve_declarations(&mut self) {
        let mut fn_remap: BTreeMap<Uuid, FunctionPointer> = BTreeMap::new();
        let mut canonical_decl: BTreeMap<String, Uuid> = BTreeMap::new();

        for ext in self.external_functions.values() {
            if let Some(def) = self.function_by_name(&ext.name).filter(|f| f.is_exported()) {
                fn_remap.insert(ext.uuid, FunctionPointer::Internal(def.uuid));
            } else {
                match canonical_decl.get(&ext.name) {
                    Some(first) => {
                        fn_remap.insert(ext.uuid, FunctionPointer::External(*first));
                    }
                    None => {
                        canonical_decl.insert(ext.name.clone(), ext.uuid);
                    }
                }
            }
        }

        let mut global_remap: BTreeMap<Uuid, Uuid> = BTreeMap::new();
        let mut canonical_global: BTreeMap<String, Uuid> = BTreeMap::new();
        for global in self.globals.iter().filter(|g| !g.is_declaration()) {
            if global.linkage == Linkage::External {
                canonical_global.entry(global.name.clone()).or_insert(global.uuid);
            }
        }
        for global in self.globals.iter().filter(|g| g.is_declaration()) {
            match canonical_global.get(&global.name) {
                Some(target) => {
                    global_remap.insert(global.uuid, *target);
                }
                None => {
                    canonical_global.insert(global.name.clone(), global.uuid);
                }
            }
        }

        if fn_remap.is_empty() && global_remap.is_empty() {
            return;
        }
        debug!(
            "Resolving {} function and {} global declaration(s)",
            fn_remap.len(),
            global_remap.len()
        );

        self.visit_constants_mut(&mut |c| match c {
            AnyConst::Func(FunctionPointer::External(uuid)) => {
                if let Some(target) = fn_remap.get(&*uuid) {
                    *c = AnyConst::Func(*target);
                }
            }
            AnyConst::Global(uuid) => {
                if let Some(target) = global_remap.get(&*uuid) {
                    *uuid = *target;
                }
            }
            _ => {}
        });

        self.external_functions
            .retain(|uuid, _| !fn_remap.contains_key(uuid));
        self.globals.retain(|g| !global_remap.contains_key(&g.uuid));
    }

    /// Verify every function and check that every symbol reference points
    /// into this module.
    pub fn verify(&self) -> Result<(), Error> {
        for function in &self.functions {
            function.verify()?;

            for op in function.iter_operands() {
                let Operand::Imm(constant) = op else {
                    continue;
                };
                let mut result = Ok(());
                constant.visit(&mut |c| {
                    if result.is_err() {
                        return;
                    }
                    match c {
                        AnyConst::Func(FunctionPointer::Internal(uuid))
                            if self.function(*uuid).is_none() =>
                        {
                            result = Err(Error::UndefinedInternalFunction {
                                function: function.display_name(),
                                undefined: *uuid,
                            });
                        }
                        AnyConst::Func(FunctionPointer::External(uuid))
                            if !self.external_functions.contains_key(uuid) =>
                        {
                            result = Err(Error::UndefinedExternalFunction {
                                function: function.display_name(),
                                undefined: *uuid,
                            });
                        }
                        AnyConst::Global(uuid) if self.global(*uuid).is_none() => {
                            result = Err(Error::UndefinedGlobal {
                                function: function.display_name(),
                                undefined: *uuid,
                            });
                        }
                        _ => {}
                    }
                });
                result?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::int::IConst,
        modules::{
            builder::FunctionBuilder,
            instructions::misc::Invoke,
            terminator::Ret,
        },
        types::primary::IType,
    };

    fn caller_of(name: &str, callee: FunctionPointer) -> Function {
        let mut fb = FunctionBuilder::new(name).returns(IType::I32);
        let r = fb.call(callee, vec![], Some(IType::I32.into()));
        fb.terminate(Ret {
            value: r.map(Operand::Reg),
        });
        fb.build().unwrap()
    }

    fn constant_fn(name: &str, value: u32) -> Function {
        let mut fb = FunctionBuilder::new(name).returns(IType::I32);
        fb.terminate(Ret {
            value: Some(IConst::from(value).into()),
        });
        fb.build().unwrap()
    }

    #[test]
    fn absorb_binds_declaration_to_definition() {
        let mut a = Module::default();
        let decl = a.declare_function(ExternalFunction::new("g", vec![], Some(IType::I32.into())));
        a.add_function(caller_of("f", decl));
        assert_eq!(a.undefined_symbols(), BTreeSet::from(["g".to_string()]));

        let mut b = Module::default();
        let g = b.add_function(constant_fn("g", 4));

        a.absorb(b);
        assert!(a.external_functions.is_empty());
        assert!(a.undefined_symbols().is_empty());

        let f = a.function_by_name("f").unwrap();
        let callee = f
            .iter_instructions()
            .find_map(|(_, instr)| instr.try_as_invoke_ref().and_then(Invoke::direct_callee));
        assert_eq!(callee, Some(g));
        a.verify().unwrap();
    }

    #[test]
    fn duplicate_declarations_are_merged() {
        let mut a = Module::default();
        let first = ExternalFunction::new("puts", vec![Type::PTR], None);
        let first_uuid = first.uuid;
        a.external_functions.insert(first.uuid, first);
        let second = ExternalFunction::new("puts", vec![Type::PTR], None);
        let second_uuid = second.uuid;
        a.external_functions.insert(second.uuid, second);
        a.add_function(caller_of("f", FunctionPointer::External(second_uuid)));

        a.resolve_declarations();
        assert_eq!(a.external_functions.len(), 1);
        let kept = *a.external_functions.keys().next().unwrap();
        assert!(kept == first_uuid || kept == second_uuid);
        a.verify().unwrap();
    }

    #[test]
    fn global_declaration_resolves_to_definition() {
        let mut a = Module::default();
        let decl = a.add_global(GlobalVariable::declare("counter", IType::I32.into()));
        let mut table = GlobalVariable::define(
            "table",
            Type::PTR,
            AnyConst::Global(decl),
        );
        table.linkage = Linkage::Private;
        a.add_global(table);

        let mut b = Module::default();
        let def = b.add_global(GlobalVariable::define(
            "counter",
            IType::I32.into(),
            IConst::from(0u32).into(),
        ));

        a.absorb(b);
        assert_eq!(a.globals.len(), 2);
        assert_eq!(
            a.global_by_name("table").unwrap().initializer,
            Some(AnyConst::Global(def))
        );
    }

    #[test]
    fn private_functions_are_not_exported() {
        let mut m = Module::default();
        let mut hidden = constant_fn("helper", 1);
        hidden.linkage = Linkage::Private;
        m.add_function(hidden);
        m.add_function(constant_fn("main", 0));

        assert_eq!(m.defined_symbols(), BTreeSet::from(["main".to_string()]));
    }

    #[test]
    fn insert_instruction_shifts_locations() {
        let mut f = constant_fn("f", 0);
        let site = InstructionRef {
            block: Label::NIL,
            index: 0,
        };
        f.locations.insert(
            site,
            DebugLoc {
                file: "a.c".into(),
                line: 3,
            },
        );
        let assume = instructions::meta::MetaAssume {
            condition: IConst::from(true).into(),
        };
        assert!(f.insert_instruction(Label::NIL, 0, assume.into()));
        assert!(f.locations.get(&site).is_none());
        assert_eq!(
            f.location(InstructionRef {
                block: Label::NIL,
                index: 1
            })
            .map(|l| l.line),
            Some(3)
        );
    }

    #[test]
    fn missing_branch_target_is_rejected() {
        let mut f = constant_fn("f", 0);
        f.body.get_mut(&Label::NIL).unwrap().terminator = terminator::Jump {
            target: Label(7),
        }
        .into();
        assert!(matches!(
            f.verify(),
            Err(Error::UndefinedBasicBlock { label: Label(7), .. })
        ));
    }
}

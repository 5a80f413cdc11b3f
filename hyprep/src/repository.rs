//! The prepared program.
//!
//! A [`ModuleRepository`] owns the linked module together with everything
//! derived from it: lowered functions, the constant pool and its
//! materialized table, the instruction info table and the classification
//! sets. It is populated once and then shared read-only.
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use hyinstr::{
    consts::AnyConst,
    modules::{Function, Module, symbol::FunctionPointer},
};
use log::info;
use parking_lot::MappedRwLockReadGuard;
use uuid::Uuid;

use crate::{
    callable::Callable,
    classify::{collect_escaping_functions, collect_internal_functions},
    constants::{Cell, ConstantPool, ConstantRecord, InstructionSite},
    info::InstructionInfoTable,
    linker,
    lowering::{LoweredFunction, lower_function},
    magic::internal_function_names,
    manifest::{self, ReportHandler},
    passes::PreparationPipeline,
    runtime::load_runtime_libraries,
    utils::{
        conf::ModuleOptions,
        error::{LinkError, PrepError, PrepResult, ValidationError},
    },
    validator,
};

pub struct ModuleRepository {
    module: Module,
    options: ModuleOptions,
    functions: Vec<LoweredFunction>,
    function_map: BTreeMap<Uuid, usize>,
    escaping: BTreeSet<Uuid>,
    internal: BTreeSet<Uuid>,
    constants: ConstantPool,
    constant_table: Box<[Cell]>,
    infos: InstructionInfoTable,
    prepared: bool,
}

impl ModuleRepository {
    pub fn new(options: ModuleOptions) -> Self {
        Self {
            module: Module::default(),
            options,
            functions: Vec::new(),
            function_map: BTreeMap::new(),
            escaping: BTreeSet::new(),
            internal: BTreeSet::new(),
            constants: ConstantPool::new(),
            constant_table: Box::default(),
            infos: InstructionInfoTable::default(),
            prepared: false,
        }
    }

    /// Run the whole preparation: link `modules` around the configured entry
    /// point, merge the runtime-support libraries, prepare and validate.
    ///
    /// `preserved` names symbols that optimization must keep even when
    /// nothing references them.
    pub fn prepare(
        modules: Vec<Module>,
        options: ModuleOptions,
        preserved: &[String],
    ) -> PrepResult<Arc<Self>> {
        let mut repository = Self::new(options);

        let entry = repository.options.entry().map(str::to_string);
        repository.link(modules, entry.as_deref())?;

        let libraries = load_runtime_libraries(&repository.options)?;
        if !libraries.is_empty() {
            repository.link(libraries, None)?;
        }

        repository.optimise_and_prepare(preserved)?;
        repository.check_module()?;
        Ok(Arc::new(repository))
    }

    /// Link `modules` into the repository's module. See [`linker::link`].
    /// Fails once the repository is prepared.
    pub fn link(&mut self, modules: Vec<Module>, entry: Option<&str>) -> Result<bool, LinkError> {
        if self.prepared {
            return Err(LinkError::AlreadyPrepared);
        }
        linker::link(&mut self.module, modules, entry)
    }

    /// Run the standard pipeline for the repository's options, then lower
    /// and classify.
    pub fn optimise_and_prepare(&mut self, preserved: &[String]) -> PrepResult<()> {
        let mut pipeline = PreparationPipeline::from_options(&self.options, preserved);
        self.optimise_and_prepare_with(&mut pipeline)
    }

    /// Same as [`Self::optimise_and_prepare`] with a caller-built pipeline.
    ///
    /// Preparation happens once per repository; later calls fail with
    /// [`PrepError::AlreadyPrepared`] and leave the repository untouched.
    pub fn optimise_and_prepare_with(
        &mut self,
        pipeline: &mut PreparationPipeline,
    ) -> PrepResult<()> {
        if self.prepared {
            return Err(PrepError::AlreadyPrepared);
        }
        self.prepared = true;
        pipeline.run(&mut self.module)?;

        self.infos = InstructionInfoTable::new(&self.module);
        self.functions.clear();
        self.function_map.clear();
        for (index, function) in self.module.functions.iter().enumerate() {
            let lowered = lower_function(
                index,
                function,
                &self.constants,
                &self.infos,
                self.options.track_coverage,
            )?;
            self.function_map.insert(function.uuid, index);
            self.functions.push(lowered);
        }

        for global in &self.module.globals {
            if let Some(init) = &global.initializer {
                self.constants.register(init, None);
            }
        }
        self.constant_table = self.constants.materialize(&self.module.data_layout);

        self.classify();

        info!(
            "Prepared {} function(s), {} constant(s), {} escaping and {} internal function(s)",
            self.functions.len(),
            self.constants.len(),
            self.escaping.len(),
            self.internal.len()
        );
        Ok(())
    }

    /// Compute the escaping and internal sets. Repeated calls leave both
    /// sets unchanged.
    pub fn classify(&mut self) {
        collect_escaping_functions(&self.module, &mut self.escaping);

        let names =
            internal_function_names(self.options.check_div_zero, self.options.check_overshift);
        let mut internal = BTreeSet::new();
        collect_internal_functions(&self.module, names, &mut internal);
        for uuid in internal {
            self.add_internal_function(uuid);
        }
    }

    /// Mark `uuid` as a runtime-support routine, excluding it from coverage.
    pub fn add_internal_function(&mut self, uuid: Uuid) {
        if let Some(index) = self.function_map.get(&uuid) {
            self.functions[*index].track_coverage = false;
        }
        self.internal.insert(uuid);
    }

    /// Validate the prepared representation.
    pub fn check_module(&self) -> Result<(), ValidationError> {
        validator::validate(self)
    }

    /// Write the debugging artifacts enabled by the options through
    /// `handler`. Never fails; problems are logged.
    pub fn manifest(&self, handler: &dyn ReportHandler, force_source_output: bool) {
        manifest::write_artifacts(
            &self.module,
            handler,
            self.options.output_source || force_source_output,
            self.options.output_module,
        );
    }

    /// ID of `constant`, registering it if it was never seen. A constant
    /// registered after preparation gets its runtime value appended to
    /// [`Self::constant_table`].
    pub fn constant_id(&mut self, constant: &AnyConst, site: Option<InstructionSite>) -> u32 {
        let id = self.constants.register(constant, site);
        if self.prepared && id as usize == self.constant_table.len() {
            let mut table = std::mem::take(&mut self.constant_table).into_vec();
            table.push(Cell::evaluate(constant, &self.module.data_layout));
            self.constant_table = table.into_boxed_slice();
        }
        id
    }

    /// ID of an already registered constant.
    pub fn find_constant(&self, constant: &AnyConst) -> Option<u32> {
        self.constants.id_of(constant)
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn get_constant(&self, id: u32) -> Option<MappedRwLockReadGuard<'_, ConstantRecord>> {
        self.constants.get(id)
    }

    /// Runtime value of the constant with the given ID.
    pub fn constant_value(&self, id: u32) -> Option<&Cell> {
        self.constant_table.get(id as usize)
    }

    pub fn constant_table(&self) -> &[Cell] {
        &self.constant_table
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    pub fn functions(&self) -> &[LoweredFunction] {
        &self.functions
    }

    pub fn function_index(&self, uuid: Uuid) -> Option<usize> {
        self.function_map.get(&uuid).copied()
    }

    pub fn lowered(&self, uuid: Uuid) -> Option<&LoweredFunction> {
        self.function_index(uuid).map(|index| &self.functions[index])
    }

    /// Source function of a lowered function.
    pub fn source(&self, lowered: &LoweredFunction) -> Option<&Function> {
        self.module.functions.get(lowered.source)
    }

    pub fn infos(&self) -> &InstructionInfoTable {
        &self.infos
    }

    pub fn escaping_functions(&self) -> &BTreeSet<Uuid> {
        &self.escaping
    }

    pub fn internal_functions(&self) -> &BTreeSet<Uuid> {
        &self.internal
    }

    pub fn is_escaping(&self, uuid: Uuid) -> bool {
        self.escaping.contains(&uuid)
    }

    pub fn is_internal(&self, uuid: Uuid) -> bool {
        self.internal.contains(&uuid)
    }

    /// Resolve the target of a call.
    pub fn callable(&self, pointer: &FunctionPointer) -> Option<Callable<'_>> {
        match pointer {
            FunctionPointer::Internal(uuid) => {
                let index = self.function_index(*uuid)?;
                Some(Callable::Function {
                    function: self.module.functions.get(index)?,
                    lowered: &self.functions[index],
                })
            }
            FunctionPointer::External(uuid) => {
                self.module.external_functions.get(uuid).map(Callable::External)
            }
        }
    }

    /// Candidate targets of an indirect call.
    pub fn escaping_callables(&self) -> impl Iterator<Item = Callable<'_>> {
        self.escaping.iter().filter_map(|uuid| {
            self.callable(&FunctionPointer::Internal(*uuid))
                .or_else(|| self.callable(&FunctionPointer::External(*uuid)))
        })
    }
}

#[cfg(test)]
mod tests {
    use hyinstr::{
        consts::int::IConst,
        modules::{
            builder::FunctionBuilder,
            instructions::{
                HyInstr,
                int::{IDiv, IntegerSignedness},
            },
            symbol::ExternalFunction,
            terminator::Ret,
        },
        types::primary::IType,
    };

    use super::*;
    use crate::magic::DIV_ZERO_CHECK_FN_NAME;

    fn check_routine() -> Function {
        let mut fb = FunctionBuilder::new(DIV_ZERO_CHECK_FN_NAME);
        fb.param(IType::I64);
        fb.terminate(Ret { value: None });
        fb.build().unwrap()
    }

    fn program() -> Module {
        let mut module = Module::default();
        let check = module.add_function(check_routine());
        let mut fb = FunctionBuilder::new("main").returns(IType::I32);
        fb.call(check, vec![IConst::from(1u64).into()], None);
        fb.terminate(Ret {
            value: Some(IConst::from(0u32).into()),
        });
        module.add_function(fb.build().unwrap());
        module
    }

    #[test]
    fn internal_functions_lose_coverage() {
        let repository =
            ModuleRepository::prepare(vec![program()], ModuleOptions::default(), &[]).unwrap();

        let check = repository
            .module()
            .function_by_name(DIV_ZERO_CHECK_FN_NAME)
            .unwrap();
        let main = repository.module().function_by_name("main").unwrap();
        assert!(repository.is_internal(check.uuid));
        assert!(!repository.lowered(check.uuid).unwrap().track_coverage);
        assert!(repository.lowered(main.uuid).unwrap().track_coverage);
    }

    #[test]
    fn coverage_can_be_disabled() {
        let options = ModuleOptions {
            track_coverage: false,
            ..Default::default()
        };
        let repository = ModuleRepository::prepare(vec![program()], options, &[]).unwrap();
        assert!(repository.functions().iter().all(|f| !f.track_coverage));
    }

    #[test]
    fn callables_resolve_both_kinds() {
        let mut module = program();
        let puts = module.declare_function(ExternalFunction::new("puts", vec![], None));
        let mut repository = ModuleRepository::new(ModuleOptions::default());
        repository.link(vec![module], Some("main")).unwrap();
        repository.optimise_and_prepare(&[]).unwrap();

        let callable = repository.callable(&puts).unwrap();
        assert!(callable.is_external());
        assert_eq!(callable.name(), Some("puts"));

        let main = repository.module().function_by_name("main").unwrap().uuid;
        let callable = repository.callable(&FunctionPointer::Internal(main)).unwrap();
        assert_eq!(callable.value(), FunctionPointer::Internal(main));
        assert_eq!(callable.signature().ret, Some(IType::I32.into()));
        assert!(callable.lowered().is_some());
    }

    #[test]
    fn constants_are_shared_with_the_table() {
        let repository =
            ModuleRepository::prepare(vec![program()], ModuleOptions::default(), &[]).unwrap();
        let zero: AnyConst = IConst::from(0u32).into();
        let id = repository.constants().id_of(&zero).unwrap();
        assert_eq!(repository.find_constant(&zero), Some(id));
        assert_eq!(repository.get_constant(id).unwrap().constant, zero);
        assert_eq!(
            repository.constant_value(id),
            Some(&Cell::Int { width: 32, value: 0 })
        );
        assert_eq!(repository.constant_table().len(), repository.constants().len());
    }

    /// `main(a, b) = a / b` next to a defined division check.
    fn division() -> Module {
        let mut module = Module::default();
        module.add_function(check_routine());
        let mut fb = FunctionBuilder::new("main").returns(IType::I32);
        let a = fb.param(IType::I32);
        let b = fb.param(IType::I32);
        let q = fb.fresh_name();
        fb.push(IDiv {
            dest: q,
            ty: IType::I32,
            lhs: a.into(),
            rhs: b.into(),
            signedness: IntegerSignedness::Signed,
        });
        fb.terminate(Ret {
            value: Some(q.into()),
        });
        module.add_function(fb.build().unwrap());
        module
    }

    fn guard_calls(repository: &ModuleRepository) -> usize {
        let module = repository.module();
        let check = FunctionPointer::Internal(
            module.function_by_name(DIV_ZERO_CHECK_FN_NAME).unwrap().uuid,
        );
        module
            .function_by_name("main")
            .unwrap()
            .iter_instructions()
            .filter(|(_, instr)| match instr {
                HyInstr::Invoke(call) => call.direct_callee() == Some(check),
                _ => false,
            })
            .count()
    }

    #[test]
    fn preparation_runs_once() {
        let mut repository = ModuleRepository::new(ModuleOptions::default());
        repository.link(vec![division()], Some("main")).unwrap();
        repository.optimise_and_prepare(&[]).unwrap();
        assert!(repository.is_prepared());
        assert_eq!(guard_calls(&repository), 1);
        let constants = repository.constants().len();

        assert!(matches!(
            repository.optimise_and_prepare(&[]),
            Err(PrepError::AlreadyPrepared)
        ));
        assert_eq!(
            repository.link(vec![Module::default()], None),
            Err(LinkError::AlreadyPrepared)
        );
        assert_eq!(guard_calls(&repository), 1);
        assert_eq!(repository.constants().len(), constants);
        repository.check_module().unwrap();
    }

    #[test]
    fn lookups_keep_the_table_in_sync() {
        let repository =
            ModuleRepository::prepare(vec![program()], ModuleOptions::default(), &[]).unwrap();
        let unseen: AnyConst = IConst::from(12345u64).into();

        assert_eq!(repository.find_constant(&unseen), None);
        assert_eq!(repository.constants().id_of(&unseen), None);
        assert_eq!(repository.constant_table().len(), repository.constants().len());
        repository.check_module().unwrap();
    }

    #[test]
    fn late_registration_extends_the_table() {
        let mut repository = ModuleRepository::new(ModuleOptions::default());
        repository.link(vec![program()], Some("main")).unwrap();
        repository.optimise_and_prepare(&[]).unwrap();

        let unseen: AnyConst = IConst::from(12345u64).into();
        let before = repository.constants().len();
        let id = repository.constant_id(&unseen, None);
        assert_eq!(id as usize, before);
        assert_eq!(repository.constant_id(&unseen, None), id);
        assert_eq!(
            repository.constant_value(id),
            Some(&Cell::Int {
                width: 64,
                value: 12345
            })
        );
        assert_eq!(repository.constant_table().len(), repository.constants().len());
        repository.check_module().unwrap();
    }
}

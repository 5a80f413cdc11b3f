use std::collections::BTreeSet;

use hyinstr::{
    consts::AnyConst,
    modules::{Module, operand::Operand},
};
use log::{debug, info};
use petgraph::{graphmap::DiGraphMap, visit::Dfs};
use uuid::Uuid;

use crate::{passes::ModulePass, utils::error::PrepResult};

/// Removes functions, globals and declarations unreachable from a set of
/// root names.
pub struct DeadFunctionElimination {
    roots: BTreeSet<String>,
}

impl DeadFunctionElimination {
    pub fn new(roots: impl IntoIterator<Item = String>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    fn add_refs(graph: &mut DiGraphMap<Uuid, ()>, from: Uuid, constant: &AnyConst) {
        constant.visit(&mut |c| match c {
            AnyConst::Func(ptr) => {
                graph.add_edge(from, ptr.uuid(), ());
            }
            AnyConst::Global(uuid) => {
                graph.add_edge(from, *uuid, ());
            }
            _ => {}
        });
    }

    /// Reference graph over every symbol of `module`.
    fn reference_graph(module: &Module) -> DiGraphMap<Uuid, ()> {
        let mut graph = DiGraphMap::new();
        for function in &module.functions {
            graph.add_node(function.uuid);
            for operand in function.iter_operands() {
                if let Operand::Imm(constant) = operand {
                    Self::add_refs(&mut graph, function.uuid, constant);
                }
            }
        }
        for uuid in module.external_functions.keys() {
            graph.add_node(*uuid);
        }
        for global in &module.globals {
            graph.add_node(global.uuid);
            if let Some(init) = &global.initializer {
                Self::add_refs(&mut graph, global.uuid, init);
            }
        }
        graph
    }

    fn root_symbols(&self, module: &Module) -> Vec<Uuid> {
        let mut roots = Vec::new();
        for name in &self.roots {
            roots.extend(
                module
                    .functions
                    .iter()
                    .filter(|f| f.name.as_deref() == Some(name.as_str()))
                    .map(|f| f.uuid),
            );
            roots.extend(module.external_by_name(name).map(|ext| ext.uuid));
            roots.extend(module.global_by_name(name).map(|g| g.uuid));
        }
        roots
    }
}

impl ModulePass for DeadFunctionElimination {
    fn name(&self) -> &'static str {
        "dead-function-elimination"
    }

    fn run(&mut self, module: &mut Module) -> PrepResult<bool> {
        let graph = Self::reference_graph(module);

        let mut live = BTreeSet::new();
        for root in self.root_symbols(module) {
            let mut dfs = Dfs::new(&graph, root);
            while let Some(node) = dfs.next(&graph) {
                live.insert(node);
            }
        }

        let before = (
            module.functions.len(),
            module.external_functions.len(),
            module.globals.len(),
        );
        module.functions.retain(|f| {
            let keep = live.contains(&f.uuid);
            if !keep {
                debug!("Removing dead function `{}`", f.display_name());
            }
            keep
        });
        module.external_functions.retain(|uuid, _| live.contains(uuid));
        module.globals.retain(|g| live.contains(&g.uuid));

        let removed = (
            before.0 - module.functions.len(),
            before.1 - module.external_functions.len(),
            before.2 - module.globals.len(),
        );
        if removed != (0, 0, 0) {
            info!(
                "Removed {} function(s), {} declaration(s) and {} global(s)",
                removed.0, removed.1, removed.2
            );
        }
        Ok(removed != (0, 0, 0))
    }
}

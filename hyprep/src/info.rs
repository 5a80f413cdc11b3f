//! Per-instruction metadata.
//!
//! Every instruction of the final module (terminators included) receives a
//! dense module-wide ID together with its position in the textual manifest
//! and its source location when one is known.
use std::collections::HashMap;

use hyinstr::modules::{InstructionRef, Module};
use log::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionInfo {
    pub id: u32,
    pub function: Uuid,
    pub site: InstructionRef,
    /// 1-based line of the instruction in the textual module.
    pub assembly_line: u32,
    pub file: Option<String>,
    pub line: u32,
    /// Whether executing the instruction counts towards coverage.
    pub coverable: bool,
}

#[derive(Debug, Default)]
pub struct InstructionInfoTable {
    infos: Vec<InstructionInfo>,
    index: HashMap<(Uuid, InstructionRef), u32>,
}

impl InstructionInfoTable {
    /// Index every instruction of `module`.
    ///
    /// Assembly lines follow the layout of the module's `Display`
    /// implementation: globals, declarations, then one block of lines per
    /// function.
    pub fn new(module: &Module) -> Self {
        let mut table = Self::default();

        let mut line = 1u32;
        if !module.globals.is_empty() {
            line += module.globals.len() as u32 + 1;
        }
        if !module.external_functions.is_empty() {
            line += module.external_functions.len() as u32 + 1;
        }

        for function in &module.functions {
            // `define ... {`
            line += 1;
            for (label, bb) in &function.body {
                // block label
                line += 1;
                for index in 0..bb.len() {
                    let site = InstructionRef {
                        block: *label,
                        index,
                    };
                    let location = function.location(site);
                    let id = table.infos.len() as u32;
                    table.infos.push(InstructionInfo {
                        id,
                        function: function.uuid,
                        site,
                        assembly_line: line,
                        file: location.map(|loc| loc.file.clone()),
                        line: location.map_or(0, |loc| loc.line),
                        coverable: location.is_some(),
                    });
                    table.index.insert((function.uuid, site), id);
                    line += 1;
                }
            }
            // closing brace and the blank separator
            line += 2;
        }

        info!("Indexed {} instruction(s)", table.infos.len());
        table
    }

    pub fn id_of(&self, function: Uuid, site: InstructionRef) -> Option<u32> {
        self.index.get(&(function, site)).copied()
    }

    pub fn get(&self, id: u32) -> Option<&InstructionInfo> {
        self.infos.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionInfo> {
        self.infos.iter()
    }
}

use hyinstr::modules::{
    InstructionRef, Module,
    instructions::Instruction,
};
use log::debug;

use crate::{passes::ModulePass, utils::error::PrepResult};

/// Removes `!assert` and `!assume`, which only carry facts for static
/// analyses and have no runtime behavior.
pub struct StripMeta;

impl ModulePass for StripMeta {
    fn name(&self) -> &'static str {
        "strip-meta"
    }

    fn run(&mut self, module: &mut Module) -> PrepResult<bool> {
        let mut removed = 0usize;
        for function in module.functions.iter_mut() {
            for (label, bb) in function.body.iter_mut() {
                let mut index = 0;
                while index < bb.instructions.len() {
                    if !bb.instructions[index].is_meta_instruction() {
                        index += 1;
                        continue;
                    }
                    bb.instructions.remove(index);
                    removed += 1;

                    // shift the locations of the following positions back
                    let block = *label;
                    function.locations.remove(&InstructionRef { block, index });
                    let shifted: Vec<_> = function
                        .locations
                        .range(InstructionRef { block, index }..=InstructionRef {
                            block,
                            index: usize::MAX,
                        })
                        .map(|(site, _)| *site)
                        .collect();
                    for site in shifted {
                        if let Some(loc) = function.locations.remove(&site) {
                            function.locations.insert(
                                InstructionRef {
                                    block,
                                    index: site.index - 1,
                                },
                                loc,
                            );
                        }
                    }
                }
            }
        }

        if removed > 0 {
            debug!("Stripped {} meta instruction(s)", removed);
        }
        Ok(removed > 0)
    }
}

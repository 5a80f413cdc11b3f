//! Function lowering
//!
//! Flattens a function's blocks into one contiguous instruction array, in
//! block order, each terminator directly following its block's
//! instructions. Operands are resolved once to frame registers or constant
//! pool IDs so the interpreter never looks at SSA names.
use std::collections::BTreeMap;

use hyinstr::modules::{
    Function, InstructionRef,
    instructions::Instruction,
    operand::{Label, Name, Operand},
};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::{
    constants::{ConstantPool, InstructionSite},
    info::InstructionInfoTable,
    utils::error::{ValidationError, ValidationErrorKind},
};

/// Where an operand value lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSlot {
    /// Frame register.
    Register(u32),
    /// Constant table entry.
    Constant(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredInstruction {
    /// Position in the source function.
    pub site: InstructionRef,
    /// ID in the [`InstructionInfoTable`].
    pub info: u32,
    /// Register receiving the result, if any.
    pub dest: Option<u32>,
    pub operands: SmallVec<[OperandSlot; 4]>,
}

/// A function in the form the interpreter executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredFunction {
    pub uuid: Uuid,
    /// Index of the source function in the prepared module.
    pub source: usize,
    pub num_args: u32,
    /// Frame size: arguments plus every value-producing instruction.
    pub num_registers: u32,
    pub num_instructions: u32,
    pub instructions: Vec<LoweredInstruction>,
    /// Index of each block's first instruction.
    pub block_entry: BTreeMap<Label, u32>,
    pub track_coverage: bool,
}

impl LoweredFunction {
    #[inline]
    pub fn arg_register(&self, index: u32) -> u32 {
        index
    }

    pub fn block_offset(&self, label: Label) -> Option<u32> {
        self.block_entry.get(&label).copied()
    }

    /// The instructions of one block, terminator last.
    pub fn block_instructions(&self, label: Label) -> Option<&[LoweredInstruction]> {
        let start = *self.block_entry.get(&label)? as usize;
        let end = self
            .block_entry
            .range((std::ops::Bound::Excluded(label), std::ops::Bound::Unbounded))
            .next()
            .map_or(self.instructions.len(), |(_, offset)| *offset as usize);
        self.instructions.get(start..end)
    }
}

fn undefined_name(function: &Function, site: InstructionRef, name: Name) -> ValidationError {
    ValidationError::new(
        function.display_name(),
        Some(site),
        ValidationErrorKind::Malformed(hyinstr::utils::Error::UndefinedSSAName { undefined: name }),
    )
}

/// Lower `function`, the `index`-th function of the prepared module.
///
/// Constants met along the way are registered in `pool` with the site of
/// their first use.
pub fn lower_function(
    index: usize,
    function: &Function,
    pool: &ConstantPool,
    infos: &InstructionInfoTable,
    track_coverage: bool,
) -> Result<LoweredFunction, ValidationError> {
    let num_args = function.params.len() as u32;

    // Arguments first, then destinations in flattened order.
    let mut registers: BTreeMap<Name, u32> = BTreeMap::new();
    for (i, (name, _)) in function.params.iter().enumerate() {
        registers.insert(*name, i as u32);
    }
    let mut next_register = num_args;
    for (site, instr) in function.iter_instructions() {
        if let Some(dest) = instr.destination() {
            if registers.insert(dest, next_register).is_some() {
                return Err(ValidationError::new(
                    function.display_name(),
                    Some(site),
                    ValidationErrorKind::Malformed(hyinstr::utils::Error::DuplicateSSAName {
                        duplicate: dest,
                    }),
                ));
            }
            next_register += 1;
        }
    }

    let mut instructions = Vec::with_capacity(function.num_instructions());
    let mut block_entry = BTreeMap::new();

    for (label, bb) in &function.body {
        block_entry.insert(*label, instructions.len() as u32);

        let positions = bb
            .instructions
            .iter()
            .map(|instr| (instr.operands().collect::<SmallVec<[&Operand; 4]>>(), instr.destination()))
            .chain(std::iter::once((
                bb.terminator.operands().collect::<SmallVec<[&Operand; 4]>>(),
                None,
            )));

        for (position, (operands, dest)) in positions.enumerate() {
            let site = InstructionRef {
                block: *label,
                index: position,
            };
            let pc = instructions.len() as u32;

            let mut slots = SmallVec::new();
            for operand in operands {
                let slot = match operand {
                    Operand::Reg(name) => OperandSlot::Register(
                        *registers
                            .get(name)
                            .ok_or_else(|| undefined_name(function, site, *name))?,
                    ),
                    Operand::Imm(constant) => OperandSlot::Constant(pool.register(
                        constant,
                        Some(InstructionSite {
                            function: index,
                            pc,
                        }),
                    )),
                };
                slots.push(slot);
            }

            let dest = match dest {
                Some(name) => Some(
                    *registers
                        .get(&name)
                        .ok_or_else(|| undefined_name(function, site, name))?,
                ),
                None => None,
            };

            let info = infos.id_of(function.uuid, site).ok_or_else(|| {
                ValidationError::new(
                    function.display_name(),
                    Some(site),
                    ValidationErrorKind::InconsistentRepository(
                        "instruction missing from the info table".to_string(),
                    ),
                )
            })?;

            instructions.push(LoweredInstruction {
                site,
                info,
                dest,
                operands: slots,
            });
        }
    }

    Ok(LoweredFunction {
        uuid: function.uuid,
        source: index,
        num_args,
        num_registers: next_register,
        num_instructions: instructions.len() as u32,
        instructions,
        block_entry,
        track_coverage,
    })
}

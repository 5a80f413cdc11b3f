use hyinstr::{
    consts::{AnyConst, int::IConst},
    modules::{
        Function, InstructionRef, Module,
        instructions::{
            HyInstr,
            int::{ICmp, ICmpVariant},
            misc::{Cast, CastVariant, Invoke, Select},
        },
        operand::{Label, Operand},
        symbol::FunctionPointer,
    },
    types::primary::IType,
};
use log::{debug, warn};

use crate::{
    magic::{DIV_ZERO_CHECK_FN_NAME, OVERSHIFT_CHECK_FN_NAME},
    passes::ModulePass,
    utils::error::PrepResult,
};

/// Inserts calls to the runtime-support check routines in front of integer
/// divisions, remainders and shifts whose operand may trap.
pub struct GuardInstrumentation {
    check_div_zero: bool,
    check_overshift: bool,
}

/// A pending check: where to insert it and which operand it guards.
struct Guard {
    index: usize,
    operand: Operand,
    ty: IType,
    overshift: bool,
}

impl GuardInstrumentation {
    pub fn new(check_div_zero: bool, check_overshift: bool) -> Self {
        Self {
            check_div_zero,
            check_overshift,
        }
    }

    fn routine(module: &Module, name: &str) -> Option<FunctionPointer> {
        if let Some(function) = module.function_by_name(name) {
            return Some(FunctionPointer::Internal(function.uuid));
        }
        if let Some(external) = module.external_by_name(name) {
            return Some(FunctionPointer::External(external.uuid));
        }
        warn!(
            "Check routine `{}` is missing from the module; skipping the corresponding instrumentation",
            name
        );
        None
    }

    fn guards_of(&self, instructions: &[HyInstr]) -> Vec<Guard> {
        let mut guards = Vec::new();
        for (index, instr) in instructions.iter().enumerate() {
            let (operand, ty, overshift) = match instr {
                HyInstr::IDiv(div) if self.check_div_zero => (&div.rhs, div.ty, false),
                HyInstr::IRem(rem) if self.check_div_zero => (&rem.rhs, rem.ty, false),
                HyInstr::ISht(sht) if self.check_overshift => (&sht.amount, sht.ty, true),
                _ => continue,
            };

            // literal operands that can never trap need no check
            if let Operand::Imm(AnyConst::Int(literal)) = operand {
                let safe = if overshift {
                    literal.value < ty.num_bits() as u64
                } else {
                    literal.value != 0
                };
                if safe {
                    continue;
                }
            }

            guards.push(Guard {
                index,
                operand: operand.clone(),
                ty,
                overshift,
            });
        }
        guards
    }

    /// Operand holding `guard.operand` as an i64, emitting a cast when the
    /// width differs. Operands wider than 64 bits are compared in their own
    /// width and replaced by an i64 that trips the routine exactly when the
    /// original would.
    fn widen(function: &mut Function, block: Label, guard: &Guard, at: usize) -> (Operand, usize) {
        let width = guard.ty.num_bits();
        if let Operand::Imm(AnyConst::Int(literal)) = &guard.operand {
            let value = if width > 64 { literal.value } else { literal.value & mask(width) };
            return (IConst { ty: IType::I64, value }.into(), 0);
        }
        let variant = match width.cmp(&64) {
            std::cmp::Ordering::Equal => return (guard.operand.clone(), 0),
            std::cmp::Ordering::Less => CastVariant::ZExt,
            std::cmp::Ordering::Greater => return Self::compare_wide(function, block, guard, at),
        };
        let dest = function.next_available_name();
        function.insert_instruction(
            block,
            at,
            Cast {
                dest,
                ty: IType::I64.into(),
                variant,
                value: guard.operand.clone(),
            }
            .into(),
        );
        (dest.into(), 1)
    }

    fn compare_wide(function: &mut Function, block: Label, guard: &Guard, at: usize) -> (Operand, usize) {
        let width = guard.ty.num_bits() as u64;
        // (condition, value when it holds, value otherwise)
        let (variant, bound, tripped, fine): (_, u64, u64, u64) = if guard.overshift {
            (ICmpVariant::Uge, width, width, 0)
        } else {
            (ICmpVariant::Eq, 0, 0, 1)
        };

        let flag = function.next_available_name();
        function.insert_instruction(
            block,
            at,
            ICmp {
                dest: flag,
                ty: guard.ty,
                variant,
                lhs: guard.operand.clone(),
                rhs: IConst {
                    ty: guard.ty,
                    value: bound,
                }
                .into(),
            }
            .into(),
        );
        let dest = function.next_available_name();
        function.insert_instruction(
            block,
            at + 1,
            Select {
                dest,
                condition: flag.into(),
                true_value: IConst::from(tripped).into(),
                false_value: IConst::from(fine).into(),
                ty: IType::I64.into(),
            }
            .into(),
        );
        (dest.into(), 2)
    }

    fn instrument_function(
        &self,
        function: &mut Function,
        div_check: Option<FunctionPointer>,
        shift_check: Option<FunctionPointer>,
    ) -> usize {
        let labels: Vec<Label> = function.body.keys().copied().collect();
        let mut inserted = 0;

        for label in labels {
            let guards = match function.body.get(&label) {
                Some(bb) => self.guards_of(&bb.instructions),
                None => continue,
            };

            // walk backwards so earlier indices stay valid
            for guard in guards.into_iter().rev() {
                let routine = if guard.overshift { shift_check } else { div_check };
                let Some(routine) = routine else {
                    continue;
                };
                let location = function
                    .locations
                    .get(&InstructionRef {
                        block: label,
                        index: guard.index,
                    })
                    .cloned();

                let (value, offset) = Self::widen(function, label, &guard, guard.index);
                let mut args = vec![value];
                if guard.overshift {
                    args.push(IConst::from(guard.ty.num_bits() as u64).into());
                }
                function.insert_instruction(
                    label,
                    guard.index + offset,
                    Invoke {
                        function: routine.into_operand(),
                        args,
                        dest: None,
                        ty: None,
                    }
                    .into(),
                );

                if let Some(location) = location {
                    for index in guard.index..=guard.index + offset {
                        function
                            .locations
                            .insert(InstructionRef { block: label, index }, location.clone());
                    }
                }
                inserted += 1;
            }
        }
        inserted
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

impl ModulePass for GuardInstrumentation {
    fn name(&self) -> &'static str {
        "guard-instrumentation"
    }

    fn run(&mut self, module: &mut Module) -> PrepResult<bool> {
        if !self.check_div_zero && !self.check_overshift {
            return Ok(false);
        }
        let needs = |pred: fn(&HyInstr) -> bool| {
            module
                .functions
                .iter()
                .any(|f| f.iter_instructions().any(|(_, instr)| pred(instr)))
        };
        let has_div = self.check_div_zero && needs(|i| i.is_i_div() || i.is_i_rem());
        let has_shift = self.check_overshift && needs(HyInstr::is_i_sht);

        let div_check = if has_div {
            Self::routine(module, DIV_ZERO_CHECK_FN_NAME)
        } else {
            None
        };
        let shift_check = if has_shift {
            Self::routine(module, OVERSHIFT_CHECK_FN_NAME)
        } else {
            None
        };
        if div_check.is_none() && shift_check.is_none() {
            return Ok(false);
        }

        let mut inserted = 0;
        for function in module.functions.iter_mut() {
            // never instrument the check routines themselves
            if matches!(
                function.name.as_deref(),
                Some(DIV_ZERO_CHECK_FN_NAME) | Some(OVERSHIFT_CHECK_FN_NAME)
            ) {
                continue;
            }
            inserted += self.instrument_function(function, div_check, shift_check);
        }

        debug!("Inserted {} guard check(s)", inserted);
        Ok(inserted > 0)
    }
}

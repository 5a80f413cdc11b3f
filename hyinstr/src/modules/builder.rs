//! Incremental construction of [`Function`]s.
use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{
    modules::{
        BasicBlock, DebugLoc, Function, InstructionRef, Linkage,
        instructions::{HyInstr, Instruction, misc::Invoke},
        operand::{Label, Name, Operand},
        symbol::FunctionPointer,
        terminator::{Terminator, Trap},
    },
    types::Type,
    utils::Error,
};

/// Builds a function block by block.
///
/// The builder starts positioned in the entry block. Blocks that are never
/// terminated end with `trap`.
///
/// ```
/// use hyinstr::{
///     consts::int::IConst,
///     modules::{builder::FunctionBuilder, instructions::int::{IAdd, OverflowSignednessPolicy}, terminator::Ret},
///     types::primary::IType,
/// };
///
/// let mut fb = FunctionBuilder::new("inc").returns(IType::I32);
/// let x = fb.param(IType::I32);
/// let dest = fb.fresh_name();
/// fb.push(IAdd {
///     dest,
///     ty: IType::I32,
///     lhs: x.into(),
///     rhs: IConst::from(1u32).into(),
///     variant: OverflowSignednessPolicy::Wrap,
/// });
/// fb.terminate(Ret { value: Some(dest.into()) });
/// let function = fb.build().unwrap();
/// assert_eq!(function.num_instructions(), 2);
/// ```
pub struct FunctionBuilder {
    uuid: Uuid,
    name: Option<String>,
    params: Vec<(Name, Type)>,
    return_type: Option<Type>,
    linkage: Linkage,
    debug: Option<DebugLoc>,
    blocks: BTreeMap<Label, (Vec<HyInstr>, Option<Terminator>)>,
    locations: BTreeMap<InstructionRef, DebugLoc>,
    current: Label,
    next_label: u32,
    next_name: u32,
    pending_loc: Option<DebugLoc>,
}

impl FunctionBuilder {
    /// Start an externally visible function named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let mut builder = Self::anonymous();
        builder.name = Some(name.into());
        builder.linkage = Linkage::External;
        builder
    }

    /// Start a private function without a name.
    pub fn anonymous() -> Self {
        let mut blocks = BTreeMap::new();
        blocks.insert(Label::NIL, (Vec::new(), None));
        Self {
            uuid: Uuid::new_v4(),
            name: None,
            params: Vec::new(),
            return_type: None,
            linkage: Linkage::Private,
            debug: None,
            blocks,
            locations: BTreeMap::new(),
            current: Label::NIL,
            next_label: 1,
            next_name: 0,
            pending_loc: None,
        }
    }

    pub fn returns(mut self, ty: impl Into<Type>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn defined_at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.debug = Some(DebugLoc {
            file: file.into(),
            line,
        });
        self
    }

    /// UUID the built function will carry; usable to reference it before it exists.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn pointer(&self) -> FunctionPointer {
        FunctionPointer::Internal(self.uuid)
    }

    /// Append a parameter and return its name.
    pub fn param(&mut self, ty: impl Into<Type>) -> Name {
        let name = self.fresh_name();
        self.params.push((name, ty.into()));
        name
    }

    pub fn fresh_name(&mut self) -> Name {
        let name = Name(self.next_name);
        self.next_name += 1;
        name
    }

    /// Create a new, empty block without moving to it.
    pub fn block(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        self.blocks.insert(label, (Vec::new(), None));
        label
    }

    /// Continue emitting into `label`.
    pub fn switch_to(&mut self, label: Label) -> Result<(), Error> {
        if !self.blocks.contains_key(&label) {
            return Err(Error::UndefinedBasicBlock {
                function: self.name.clone().unwrap_or_default(),
                label,
            });
        }
        self.current = label;
        Ok(())
    }

    /// Attach a source location to the next pushed instruction.
    pub fn at(&mut self, file: impl Into<String>, line: u32) -> &mut Self {
        self.pending_loc = Some(DebugLoc {
            file: file.into(),
            line,
        });
        self
    }

    /// Append an instruction to the current block and return its position.
    pub fn push(&mut self, instr: impl Into<HyInstr>) -> InstructionRef {
        let instr = instr.into();
        if let Some(dest) = instr.destination() {
            self.next_name = self.next_name.max(dest.0 + 1);
        }
        let (instructions, _) = self
            .blocks
            .entry(self.current)
            .or_insert_with(|| (Vec::new(), None));
        let site = InstructionRef {
            block: self.current,
            index: instructions.len(),
        };
        instructions.push(instr);
        if let Some(loc) = self.pending_loc.take() {
            self.locations.insert(site, loc);
        }
        site
    }

    /// Emit a direct call; returns the result name for non-void calls.
    pub fn call(
        &mut self,
        callee: FunctionPointer,
        args: Vec<Operand>,
        ret: Option<Type>,
    ) -> Option<Name> {
        let dest = ret.as_ref().map(|_| self.fresh_name());
        self.push(Invoke {
            function: callee.into_operand(),
            args,
            dest,
            ty: ret,
        });
        dest
    }

    /// Set the terminator of the current block.
    pub fn terminate(&mut self, terminator: impl Into<Terminator>) {
        let (_, slot) = self
            .blocks
            .entry(self.current)
            .or_insert_with(|| (Vec::new(), None));
        *slot = Some(terminator.into());
    }

    /// Finish the function and verify it.
    pub fn build(self) -> Result<Function, Error> {
        let body = self
            .blocks
            .into_iter()
            .map(|(label, (instructions, terminator))| {
                (
                    label,
                    BasicBlock {
                        label,
                        instructions,
                        terminator: terminator.unwrap_or(Terminator::Trap(Trap)),
                    },
                )
            })
            .collect();

        let function = Function {
            uuid: self.uuid,
            name: self.name,
            params: self.params,
            return_type: self.return_type,
            body,
            linkage: self.linkage,
            debug: self.debug,
            locations: self.locations,
        };
        function.verify()?;
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::int::IConst,
        modules::{
            instructions::{
                int::{ICmp, ICmpVariant},
                misc::Phi,
            },
            terminator::{CBranch, Jump, Ret},
        },
        types::primary::IType,
    };

    #[test]
    fn diamond_with_phi_verifies() {
        let mut fb = FunctionBuilder::new("max").returns(IType::I32);
        let a = fb.param(IType::I32);
        let b = fb.param(IType::I32);
        let then_bb = fb.block();
        let else_bb = fb.block();
        let join = fb.block();

        let cond = fb.fresh_name();
        fb.push(ICmp {
            dest: cond,
            ty: IType::I32,
            variant: ICmpVariant::Sgt,
            lhs: a.into(),
            rhs: b.into(),
        });
        fb.terminate(CBranch {
            cond: cond.into(),
            target_true: then_bb,
            target_false: else_bb,
        });

        fb.switch_to(then_bb).unwrap();
        fb.terminate(Jump { target: join });
        fb.switch_to(else_bb).unwrap();
        fb.terminate(Jump { target: join });

        fb.switch_to(join).unwrap();
        let r = fb.fresh_name();
        fb.push(Phi {
            dest: r,
            ty: IType::I32.into(),
            values: vec![(then_bb, a.into()), (else_bb, b.into())],
        });
        fb.terminate(Ret {
            value: Some(r.into()),
        });

        let function = fb.build().unwrap();
        assert_eq!(function.body.len(), 4);
        assert_eq!(function.next_available_name(), Name(4));
    }

    #[test]
    fn use_of_undefined_name_is_rejected() {
        let mut fb = FunctionBuilder::new("bad").returns(IType::I32);
        fb.terminate(Ret {
            value: Some(Operand::Reg(Name(9))),
        });
        assert_eq!(
            fb.build().unwrap_err(),
            Error::UndefinedSSAName { undefined: Name(9) }
        );
    }

    #[test]
    fn oversized_literal_is_rejected() {
        let mut fb = FunctionBuilder::new("bad").returns(IType::I8);
        fb.terminate(Ret {
            value: Some(
                IConst {
                    ty: IType::I8,
                    value: 300,
                }
                .into(),
            ),
        });
        assert!(fb.build().unwrap_err().is_integer_constant_out_of_range());
    }

    #[test]
    fn unterminated_blocks_trap() {
        let mut fb = FunctionBuilder::anonymous();
        fb.at("x.c", 12).push(crate::modules::instructions::meta::MetaAssume {
            condition: IConst::from(true).into(),
        });
        let function = fb.build().unwrap();
        let entry = function.entry().unwrap();
        assert!(entry.terminator.is_trap());
        assert_eq!(
            function
                .location(InstructionRef {
                    block: Label::NIL,
                    index: 0
                })
                .map(|l| l.line),
            Some(12)
        );
    }
}

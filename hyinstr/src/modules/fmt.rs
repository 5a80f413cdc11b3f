//! Pretty-print helpers for Hy instructions, functions, and modules.
//!
//! The textual form is line oriented: globals first, then declarations,
//! then function bodies in definition order.
use crate::modules::{
    Function, Linkage, Module,
    instructions::{HyInstr, Instruction},
};

impl HyInstr {
    /// Build a formatting helper that renders the instruction, resolving
    /// symbol names through `module` when available.
    pub fn fmt<'a>(&'a self, module: Option<&'a Module>) -> impl std::fmt::Display + Copy + 'a {
        #[derive(Clone, Copy)]
        struct Fmt<'a> {
            instr: &'a HyInstr,
            module: Option<&'a Module>,
        }

        impl Fmt<'_> {
            /// Writes the modifiers following the opcode. Returns `true` when
            /// the operands were written as well.
            fn specific_fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<bool, std::fmt::Error> {
                match self.instr {
                    HyInstr::IAdd(i) => write!(f, ".{} {}", i.variant.to_str(), i.ty)?,
                    HyInstr::ISub(i) => write!(f, ".{} {}", i.variant.to_str(), i.ty)?,
                    HyInstr::IMul(i) => write!(f, ".{} {}", i.variant.to_str(), i.ty)?,
                    HyInstr::IDiv(i) => write!(f, ".{} {}", i.signedness.to_str(), i.ty)?,
                    HyInstr::IRem(i) => write!(f, ".{} {}", i.signedness.to_str(), i.ty)?,
                    HyInstr::ICmp(i) => write!(f, ".{} {}", i.variant.to_str(), i.ty)?,
                    HyInstr::ISht(i) => write!(f, ".{} {}", i.variant.to_str(), i.ty)?,
                    HyInstr::IAnd(i) => write!(f, " {}", i.ty)?,
                    HyInstr::IOr(i) => write!(f, " {}", i.ty)?,
                    HyInstr::IXor(i) => write!(f, " {}", i.ty)?,
                    HyInstr::FAdd(i) => write!(f, " {}", i.ty)?,
                    HyInstr::FSub(i) => write!(f, " {}", i.ty)?,
                    HyInstr::FMul(i) => write!(f, " {}", i.ty)?,
                    HyInstr::FDiv(i) => write!(f, " {}", i.ty)?,
                    HyInstr::FCmp(i) => write!(f, ".{} {}", i.variant.to_str(), i.ty)?,
                    HyInstr::MLoad(load) => {
                        if load.volatile {
                            write!(f, ".volatile")?;
                        }
                        if let Some(ordering) = &load.ordering {
                            write!(f, ".{}", ordering.to_str())?;
                        }
                        write!(f, " {}", load.addr.fmt(self.module))?;
                        if let Some(alignment) = load.alignment {
                            write!(f, ", align {}", alignment)?;
                        }
                        return Ok(true);
                    }
                    HyInstr::MStore(store) => {
                        if store.volatile {
                            write!(f, ".volatile")?;
                        }
                        if let Some(ordering) = &store.ordering {
                            write!(f, ".{}", ordering.to_str())?;
                        }
                        write!(
                            f,
                            " {}, {}",
                            store.value.fmt(self.module),
                            store.addr.fmt(self.module)
                        )?;
                        if let Some(alignment) = store.alignment {
                            write!(f, ", align {}", alignment)?;
                        }
                        return Ok(true);
                    }
                    HyInstr::MAlloca(alloca) => {
                        write!(f, " {}, {}", alloca.ty, alloca.count.fmt(self.module))?;
                        if let Some(alignment) = alloca.alignment {
                            write!(f, ", align {}", alignment)?;
                        }
                        return Ok(true);
                    }
                    HyInstr::MGetElementPtr(gep) => write!(f, " {}", gep.ty)?,
                    HyInstr::Phi(phi) => {
                        let mut first = true;
                        for (label, value) in &phi.values {
                            write!(f, "{}", if first { " " } else { ", " })?;
                            first = false;
                            write!(f, "[{}, {}]", value.fmt(self.module), label)?;
                        }
                        return Ok(true);
                    }
                    HyInstr::Cast(cast) => write!(f, ".{}", cast.variant.to_str())?,
                    HyInstr::Invoke(_)
                    | HyInstr::Select(_)
                    | HyInstr::MetaAssert(_)
                    | HyInstr::MetaAssume(_) => {}
                }
                Ok(false)
            }
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let opname = self.instr.op().opname();

                match (self.instr.destination(), self.instr.destination_type()) {
                    (Some(dest), Some(ty)) => write!(f, "%{}: {} = ", dest, ty)?,
                    (Some(dest), None) => write!(f, "%{} = ", dest)?,
                    _ => {}
                }
                write!(f, "{}", opname)?;

                if self.specific_fmt(f)? {
                    return Ok(());
                }

                let mut first = true;
                for operand in self.instr.operands() {
                    write!(f, "{}", if first { " " } else { ", " })?;
                    first = false;
                    write!(f, "{}", operand.fmt(self.module))?;
                }

                Ok(())
            }
        }

        Fmt {
            instr: self,
            module,
        }
    }
}

fn linkage_prefix(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::Private => "private ",
        Linkage::Internal => "internal ",
        Linkage::External => "",
    }
}

impl Function {
    /// Build a formatting helper that renders the function in textual form.
    pub fn fmt<'a>(&'a self, module: Option<&'a Module>) -> impl std::fmt::Display + 'a {
        struct Fmt<'a> {
            function: &'a Function,
            module: Option<&'a Module>,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let function = self.function;
                write!(f, "define {}", linkage_prefix(function.linkage))?;
                match &function.return_type {
                    Some(ty) => write!(f, "{} ", ty)?,
                    None => write!(f, "void ")?,
                }
                match &function.name {
                    Some(name) => write!(f, "@{}", name)?,
                    None => write!(f, "@{}", function.uuid)?,
                }

                write!(f, "(")?;
                let mut first = true;
                for (param_name, param_type) in &function.params {
                    if first {
                        first = false;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(f, "%{}: {}", param_name, param_type)?;
                }
                write!(f, ")")?;
                if let Some(debug) = &function.debug {
                    write!(f, " !loc(\"{}\":{})", debug.file, debug.line)?;
                }
                writeln!(f, " {{")?;

                for (block_label, block) in &function.body {
                    writeln!(f, "{}:", block_label)?;
                    for instr in &block.instructions {
                        writeln!(f, "  {}", instr.fmt(self.module))?;
                    }
                    writeln!(f, "  {}", block.terminator.fmt(self.module))?;
                }

                write!(f, "}}")
            }
        }

        Fmt {
            function: self,
            module,
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for global in &self.globals {
            write!(
                f,
                "@{} = {}{} {}",
                global.name,
                linkage_prefix(global.linkage),
                if global.constant { "constant" } else { "global" },
                global.ty
            )?;
            match &global.initializer {
                Some(init) => writeln!(f, " {}", init.fmt(Some(self)))?,
                None => writeln!(f)?,
            }
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
        }

        for external in self.external_functions.values() {
            write!(f, "declare ")?;
            match &external.return_type {
                Some(ty) => write!(f, "{} ", ty)?,
                None => write!(f, "void ")?,
            }
            write!(f, "@{}(", external.name)?;
            let mut first = true;
            for ty in &external.param_types {
                if first {
                    first = false;
                } else {
                    write!(f, ", ")?;
                }
                write!(f, "{}", ty)?;
            }
            writeln!(f, ")")?;
        }
        if !self.external_functions.is_empty() {
            writeln!(f)?;
        }

        for function in &self.functions {
            writeln!(f, "{}", function.fmt(Some(self)))?;
            writeln!(f)?;
        }
        Ok(())
    }
}

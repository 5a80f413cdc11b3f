//! Constant values usable as immediate operands and global initializers.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumTryAs};
use uuid::Uuid;

use crate::{
    consts::{fp::FConst, int::IConst},
    modules::{Module, symbol::FunctionPointer},
    types::Type,
};

pub mod fp;
pub mod int;

/// Any constant value.
///
/// Constants are compared structurally: two occurrences of `i32 7` anywhere in
/// a program are the same constant, and so are two references to the same
/// function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnyConst {
    Int(IConst),
    Float(FConst),
    /// The null pointer.
    Null,
    /// An unspecified value of the given type.
    Undef(Type),
    /// Address of a function (defined or declared).
    Func(FunctionPointer),
    /// Address of a global variable.
    Global(Uuid),
    /// Constant array or structure; elements in order.
    Aggregate(Vec<AnyConst>),
}

impl From<IConst> for AnyConst {
    fn from(value: IConst) -> Self {
        AnyConst::Int(value)
    }
}

impl From<FConst> for AnyConst {
    fn from(value: FConst) -> Self {
        AnyConst::Float(value)
    }
}

impl From<FunctionPointer> for AnyConst {
    fn from(value: FunctionPointer) -> Self {
        AnyConst::Func(value)
    }
}

impl AnyConst {
    /// Type of the constant when it can be determined without context.
    ///
    /// Aggregates return `None`: the same element list may describe an array
    /// or a structure.
    pub fn ty(&self) -> Option<Type> {
        match self {
            AnyConst::Int(iconst) => Some(iconst.ty.into()),
            AnyConst::Float(fconst) => Some(fconst.ty.into()),
            AnyConst::Null | AnyConst::Func(_) | AnyConst::Global(_) => Some(Type::PTR),
            AnyConst::Undef(ty) => Some(ty.clone()),
            AnyConst::Aggregate(_) => None,
        }
    }

    /// Visit this constant and every nested element, parents first.
    pub fn visit(&self, f: &mut impl FnMut(&AnyConst)) {
        f(self);
        if let AnyConst::Aggregate(elements) = self {
            for element in elements {
                element.visit(f);
            }
        }
    }

    /// Mutable counterpart of [`AnyConst::visit`].
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut AnyConst)) {
        f(self);
        if let AnyConst::Aggregate(elements) = self {
            for element in elements {
                element.visit_mut(f);
            }
        }
    }

    /// Iterate over every function address mentioned by this constant.
    pub fn function_refs(&self) -> Vec<FunctionPointer> {
        let mut refs = Vec::new();
        self.visit(&mut |c| {
            if let AnyConst::Func(ptr) = c {
                refs.push(*ptr);
            }
        });
        refs
    }

    /// Build a formatting helper that renders the constant, resolving symbol
    /// names through `module` when available.
    pub fn fmt<'a>(&'a self, module: Option<&'a Module>) -> impl std::fmt::Display + 'a {
        struct Fmt<'a> {
            constant: &'a AnyConst,
            module: Option<&'a Module>,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.constant {
                    AnyConst::Int(iconst) => write!(f, "{}", iconst),
                    AnyConst::Float(fconst) => write!(f, "{}", fconst),
                    AnyConst::Null => write!(f, "ptr null"),
                    AnyConst::Undef(ty) => write!(f, "{} undef", ty),
                    AnyConst::Func(ptr) => {
                        match self.module.and_then(|m| m.symbol_name(ptr.uuid())) {
                            Some(name) => write!(f, "ptr @{}", name),
                            None => write!(f, "ptr @{}", ptr.uuid()),
                        }
                    }
                    AnyConst::Global(uuid) => {
                        match self.module.and_then(|m| m.symbol_name(*uuid)) {
                            Some(name) => write!(f, "ptr @{}", name),
                            None => write!(f, "ptr @{}", uuid),
                        }
                    }
                    AnyConst::Aggregate(elements) => {
                        write!(f, "{{ ")?;
                        let mut first = true;
                        for element in elements {
                            if first {
                                first = false;
                            } else {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", element.fmt(self.module))?;
                        }
                        write!(f, " }}")
                    }
                }
            }
        }

        Fmt {
            constant: self,
            module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_function_refs_are_collected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = AnyConst::Aggregate(vec![
            AnyConst::Func(FunctionPointer::Internal(a)),
            AnyConst::Aggregate(vec![
                IConst::from(3u32).into(),
                AnyConst::Func(FunctionPointer::External(b)),
            ]),
        ]);

        assert_eq!(
            c.function_refs(),
            vec![FunctionPointer::Internal(a), FunctionPointer::External(b)]
        );
    }

    #[test]
    fn float_constants_compare_bitwise() {
        assert_ne!(AnyConst::from(FConst::from(0.0f64)), FConst::from(-0.0f64).into());
        assert_eq!(AnyConst::from(FConst::from(1.5f64)), FConst::from(1.5f64).into());
    }
}

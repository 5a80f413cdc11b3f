//! Constant pool
//!
//! Every distinct constant of the prepared program gets a dense numeric ID so
//! the interpreter can fetch its runtime value by indexing instead of
//! comparing values. IDs are handed out in first-encounter order and form the
//! contiguous range `0..len()`.
use std::collections::HashMap;

use hyinstr::{
    consts::AnyConst,
    modules::symbol::FunctionPointer,
    types::{
        Type,
        layout::DataLayout,
        primary::{FType, IType},
    },
};
use log::{debug, info};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An instruction of a lowered function: the function's index in the
/// repository and the instruction's index in its flat array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructionSite {
    pub function: usize,
    pub pc: u32,
}

/// One deduplicated constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantRecord {
    pub constant: AnyConst,
    pub id: u32,
    /// First instruction referencing the constant; `None` when registered
    /// outside instruction context (e.g. global initializers).
    pub site: Option<InstructionSite>,
}

/// Runtime location designated by a pointer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Null,
    /// Entry of a function defined in the module.
    Function(Uuid),
    /// A declared function serviced outside the module.
    External(Uuid),
    Global(Uuid),
}

/// Runtime value of a constant, ready for the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Int { width: u32, value: u64 },
    Float { ty: FType, bits: u128 },
    Pointer(Address),
    /// Unconstrained value spanning `width` bits.
    Undef { width: u64 },
    Aggregate(Vec<Cell>),
}

impl Cell {
    /// Evaluate `constant` for the target described by `layout`.
    pub fn evaluate(constant: &AnyConst, layout: &DataLayout) -> Self {
        match constant {
            AnyConst::Int(iconst) => Cell::Int {
                width: iconst.ty.num_bits(),
                value: iconst.value,
            },
            AnyConst::Float(fconst) => Cell::Float {
                ty: fconst.ty,
                bits: fconst.bits,
            },
            AnyConst::Null => Cell::Pointer(Address::Null),
            AnyConst::Undef(ty) => Cell::Undef {
                width: layout.size_in_bits(ty),
            },
            AnyConst::Func(FunctionPointer::Internal(uuid)) => {
                Cell::Pointer(Address::Function(*uuid))
            }
            AnyConst::Func(FunctionPointer::External(uuid)) => {
                Cell::Pointer(Address::External(*uuid))
            }
            AnyConst::Global(uuid) => Cell::Pointer(Address::Global(*uuid)),
            AnyConst::Aggregate(elements) => Cell::Aggregate(
                elements
                    .iter()
                    .map(|element| Cell::evaluate(element, layout))
                    .collect(),
            ),
        }
    }

    /// Integer payload, when this is a plain integer.
    pub fn as_int(&self) -> Option<(IType, u64)> {
        match self {
            Cell::Int { width, value } => IType::new(*width).map(|ty| (ty, *value)),
            _ => None,
        }
    }

    /// Width in bits of a scalar cell. Aggregates report `None`.
    pub fn width(&self, layout: &DataLayout) -> Option<u64> {
        match self {
            Cell::Int { width, .. } => Some(*width as u64),
            Cell::Float { ty, .. } => Some(layout.size_in_bits(&Type::Float(*ty))),
            Cell::Pointer(_) => Some(layout.size_in_bits(&Type::PTR)),
            Cell::Undef { width } => Some(*width),
            Cell::Aggregate(_) => None,
        }
    }
}

#[derive(Default)]
struct PoolInner {
    records: Vec<ConstantRecord>,
    lookup: HashMap<AnyConst, u32>,
}

/// Deduplicating constant registry.
///
/// Registration takes `&self`: the pool is guarded by a single lock so
/// concurrent registrations never hand out the same ID twice nor leave gaps.
#[derive(Default)]
pub struct ConstantPool {
    inner: RwLock<PoolInner>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the ID of `constant`, registering it first if it was never seen.
    ///
    /// # A note on concurrency
    /// This method acquires an upgradable read lock and upgrades it only when
    /// the constant is new. You **MUST NOT** hold a guard returned by
    /// [`Self::get`] while calling this method, as the upgrade would deadlock.
    pub(crate) fn register(&self, constant: &AnyConst, site: Option<InstructionSite>) -> u32 {
        let inner = self.inner.upgradable_read();
        if let Some(id) = inner.lookup.get(constant) {
            return *id;
        }

        let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
        let id = inner.records.len() as u32;
        debug!("New constant {} registered with id {}", constant.fmt(None), id);
        inner.records.push(ConstantRecord {
            constant: constant.clone(),
            id,
            site,
        });
        inner.lookup.insert(constant.clone(), id);
        id
    }

    /// ID of an already registered constant.
    pub fn id_of(&self, constant: &AnyConst) -> Option<u32> {
        self.inner.read().lookup.get(constant).copied()
    }

    /// Retrieve the record with the given ID.
    pub fn get(&self, id: u32) -> Option<MappedRwLockReadGuard<'_, ConstantRecord>> {
        RwLockReadGuard::try_map(self.inner.read(), |inner| inner.records.get(id as usize)).ok()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate every record into its runtime value, indexed by ID.
    pub fn materialize(&self, layout: &DataLayout) -> Box<[Cell]> {
        let inner = self.inner.read();
        let table: Box<[Cell]> = inner
            .records
            .iter()
            .map(|record| Cell::evaluate(&record.constant, layout))
            .collect();
        info!("Materialized constant table with {} entries", table.len());
        table
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use hyinstr::consts::{fp::FConst, int::IConst};

    use super::*;

    #[test]
    fn identical_constants_share_an_id() {
        let pool = ConstantPool::new();
        let site = InstructionSite { function: 0, pc: 3 };
        let a = pool.register(&IConst::from(7u32).into(), Some(site));
        let b = pool.register(&IConst::from(7u32).into(), None);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(a).unwrap().site, Some(site));
    }

    #[test]
    fn ids_are_dense_in_first_encounter_order() {
        let pool = ConstantPool::new();
        let constants: Vec<AnyConst> = vec![
            IConst::from(1u32).into(),
            IConst::from(1u64).into(),
            FConst::from(1.0f64).into(),
            IConst::from(1u32).into(),
            AnyConst::Null,
        ];
        let ids: Vec<u32> = constants.iter().map(|c| pool.register(c, None)).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 3]);
        assert!(pool.get(4).is_none());
    }

    #[test]
    fn concurrent_registration_stays_contiguous() {
        let pool = Arc::new(ConstantPool::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for v in 0..100u64 {
                        pool.register(&IConst::from(v).into(), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.len(), 100);
        let mut seen: Vec<u32> = (0..100u64)
            .map(|v| pool.id_of(&IConst::from(v).into()).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn materialized_table_matches_pool() {
        let pool = ConstantPool::new();
        let f = Uuid::new_v4();
        pool.register(&IConst::from(5u8).into(), None);
        pool.register(
            &AnyConst::Aggregate(vec![
                AnyConst::Func(FunctionPointer::Internal(f)),
                AnyConst::Undef(IType::I16.into()),
            ]),
            None,
        );

        let table = pool.materialize(&DataLayout::default());
        assert_eq!(table.len(), pool.len());
        assert_eq!(table[0], Cell::Int { width: 8, value: 5 });
        assert_eq!(
            table[1],
            Cell::Aggregate(vec![
                Cell::Pointer(Address::Function(f)),
                Cell::Undef { width: 16 },
            ])
        );
        assert_eq!(table[0].as_int(), Some((IType::I8, 5)));
    }
}

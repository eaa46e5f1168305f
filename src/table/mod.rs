//! Concurrent tables that many workers merge `(key, value)` pairs into.
//!
//! All strategies give the same results: no merge is lost or applied twice, and the table is
//! only read back through [`ConcurrentTable::into_aggregates`], which consumes it once every
//! worker has finished.

mod entry_lock;
mod global;
mod slot;

pub use entry_lock::EntryLockTable;
pub use global::GlobalTable;
pub use slot::SlotTable;

use crate::{config::Strategy, error::Result, parser::models::Aggregates};

/// A key to statistics map that can be merged into from several threads at once.
pub trait ConcurrentTable: Send + Sync {
    /// Merge `value` into the statistics of `key`, creating them if needed.
    fn merge(&self, key: &[u8], value: f64) -> Result<()>;

    /// Finalize the table into owned results.
    fn into_aggregates(self) -> Aggregates;
}

/// A table of any [`Strategy`], chosen at runtime.
#[derive(Debug)]
pub enum AggregationTable {
    Global(GlobalTable),
    EntryLock(EntryLockTable),
    Slot(SlotTable),
}

impl AggregationTable {
    /// Create an empty table sized for roughly `capacity` distinct keys.
    pub fn new(strategy: Strategy, capacity: usize) -> Self {
        match strategy {
            Strategy::Global => Self::Global(GlobalTable::with_capacity(capacity)),
            Strategy::EntryLock => Self::EntryLock(EntryLockTable::with_capacity(capacity)),
            Strategy::Slot => Self::Slot(SlotTable::with_capacity(capacity)),
        }
    }
}

impl ConcurrentTable for AggregationTable {
    fn merge(&self, key: &[u8], value: f64) -> Result<()> {
        match self {
            Self::Global(table) => table.merge(key, value),
            Self::EntryLock(table) => table.merge(key, value),
            Self::Slot(table) => table.merge(key, value),
        }
    }

    fn into_aggregates(self) -> Aggregates {
        match self {
            Self::Global(table) => table.into_aggregates(),
            Self::EntryLock(table) => table.into_aggregates(),
            Self::Slot(table) => table.into_aggregates(),
        }
    }
}

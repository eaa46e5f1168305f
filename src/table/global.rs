//! One mutex around the whole table.

use gxhash::{GxBuildHasher, GxHashMap};
use parking_lot::Mutex;

use super::ConcurrentTable;
use crate::{
    config::MAX_CAPACITY,
    error::Result,
    parser::models::{Accumulator, Aggregates},
};

/// Every merge locks the whole table. Simple, and the baseline the other strategies are
/// measured against.
#[derive(Debug, Default)]
pub struct GlobalTable {
    stats: Mutex<GxHashMap<Box<[u8]>, Accumulator>>,
}

impl GlobalTable {
    /// Preallocate for `capacity` keys, up to [`MAX_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stats: Mutex::new(GxHashMap::with_capacity_and_hasher(
                capacity.min(MAX_CAPACITY),
                GxBuildHasher::default(),
            )),
        }
    }
}

impl ConcurrentTable for GlobalTable {
    fn merge(&self, key: &[u8], value: f64) -> Result<()> {
        let mut stats = self.stats.lock();

        match stats.get_mut(key) {
            Some(existing) => existing.extend(value),
            None => {
                stats.insert(key.into(), Accumulator::new(value));
            }
        }

        Ok(())
    }

    fn into_aggregates(self) -> Aggregates {
        self.stats.into_inner().into_iter().collect()
    }
}

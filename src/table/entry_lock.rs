//! Double-checked insertion with one lock per entry.

use std::sync::OnceLock;

use gxhash::{GxBuildHasher, GxHashMap};
use parking_lot::{Mutex, RwLock};

use super::ConcurrentTable;
use crate::{
    config::MAX_CAPACITY,
    error::Result,
    parser::models::{Accumulator, Aggregates},
};

/// Storage for entries that never moves once allocated.
///
/// Bucket `b` holds `first << b` entries, so growing never relocates an entry that another
/// thread may be holding the lock of.
#[derive(Debug)]
struct Arena {
    first_bits: u32,
    buckets: Box<[OnceLock<Box<[Mutex<Accumulator>]>>]>,
}

impl Arena {
    fn with_capacity(capacity: usize) -> Self {
        let first = capacity.next_power_of_two().max(16);
        let first_bits = first.trailing_zeros();
        let buckets = (first_bits..usize::BITS)
            .map(|_| OnceLock::new())
            .collect::<Box<[_]>>();

        let arena = Self {
            first_bits,
            buckets,
        };
        arena.get(0);
        arena
    }

    /// The bucket and the offset within it of entry `id`.
    fn locate(&self, id: usize) -> (usize, usize) {
        let shifted = id + (1 << self.first_bits);
        let top = usize::BITS - 1 - shifted.leading_zeros();

        ((top - self.first_bits) as usize, shifted - (1 << top))
    }

    fn get(&self, id: usize) -> &Mutex<Accumulator> {
        let (bucket, offset) = self.locate(id);
        let len = 1 << (self.first_bits as usize + bucket);

        &self.buckets[bucket].get_or_init(|| {
            log::debug!("EntryLockTable: allocating {len} entries for bucket #{bucket}.");
            (0..len).map(|_| Mutex::default()).collect()
        })[offset]
    }
}

/// Lookups share a read lock on the index; a miss takes the write lock, checks again in case
/// another thread inserted the key meanwhile, and inserts it. The value is then merged under
/// the entry's own lock, so threads working on different keys do not contend.
#[derive(Debug)]
pub struct EntryLockTable {
    index: RwLock<GxHashMap<Box<[u8]>, usize>>,
    entries: Arena,
}

impl EntryLockTable {
    /// Preallocate for `capacity` keys, up to [`MAX_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_CAPACITY);

        Self {
            index: RwLock::new(GxHashMap::with_capacity_and_hasher(
                capacity,
                GxBuildHasher::default(),
            )),
            entries: Arena::with_capacity(capacity),
        }
    }

    /// Find the id of `key`, inserting it if no other thread got there first.
    fn insert(&self, key: &[u8]) -> usize {
        let mut index = self.index.write();

        if let Some(&id) = index.get(key) {
            return id;
        }

        let id = index.len();
        index.insert(key.into(), id);
        id
    }
}

impl ConcurrentTable for EntryLockTable {
    fn merge(&self, key: &[u8], value: f64) -> Result<()> {
        let found = self.index.read().get(key).copied();
        let id = match found {
            Some(id) => id,
            None => self.insert(key),
        };

        self.entries.get(id).lock().extend(value);

        Ok(())
    }

    fn into_aggregates(self) -> Aggregates {
        let entries = self.entries;

        self.index
            .into_inner()
            .into_iter()
            .map(|(key, id)| (key, *entries.get(id).lock()))
            .collect()
    }
}

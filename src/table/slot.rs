//! A fixed-capacity, open-addressed slot table merged with atomics.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    OnceLock,
};

use parking_lot::Mutex;

use super::ConcurrentTable;
use crate::{
    config::MAX_CAPACITY,
    error::{Error, Result},
    parser::models::{Accumulator, Aggregates},
};

/// Seed of the key hash.
const SEED: i64 = 0x1b2c;

/// The table never has fewer slots than this.
const MIN_SLOTS: usize = 1024;

/// One key and its statistics; floats are stored as their bit patterns.
///
/// Aligned to a cache line so that threads updating neighbouring keys do not false-share.
#[derive(Debug)]
#[repr(align(64))]
struct Slot {
    /// Unset until a key claims the slot; never changes afterwards.
    key: OnceLock<Box<[u8]>>,
    min: AtomicU64,
    max: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            key: OnceLock::new(),
            min: AtomicU64::new(f64::INFINITY.to_bits()),
            max: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
            sum: AtomicU64::new(0.0_f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }
}

impl Slot {
    /// Replace the value in `target` with `value` for as long as `improves` holds.
    fn extend_extremum(target: &AtomicU64, value: f64, improves: impl Fn(f64, f64) -> bool) {
        let mut current = target.load(Ordering::Relaxed);

        while improves(value, f64::from_bits(current)) {
            match target.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn extend(&self, value: f64) {
        Self::extend_extremum(&self.min, value, |value, min| value < min);
        Self::extend_extremum(&self.max, value, |value, max| value > max);

        // There is no atomic float addition; the closure always returns `Some`.
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn into_accumulator(self) -> Accumulator {
        Accumulator {
            min: f64::from_bits(self.min.into_inner()),
            max: f64::from_bits(self.max.into_inner()),
            sum: f64::from_bits(self.sum.into_inner()),
            count: self.count.into_inner(),
        }
    }
}

/// Keys are hashed to a slot and collisions are resolved by linear probing, so two distinct
/// keys never share statistics. A key claims its slot once, under a lock taken only on the
/// claiming path; merging into a claimed slot is lock free.
///
/// The number of slots is fixed at construction. Once every slot is claimed, merging a new
/// key fails with [`Error::CollisionOverflow`].
#[derive(Debug)]
pub struct SlotTable {
    slots: Box<[Slot]>,
    claimed: AtomicUsize,
    claim_lock: Mutex<()>,
}

impl SlotTable {
    /// Create a table with room for comfortably more than `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = capacity
            .min(MAX_CAPACITY)
            .saturating_mul(2)
            .next_power_of_two()
            .max(MIN_SLOTS);

        Self::with_slots(slots)
    }

    /// Create a table of exactly `slots` slots, rounded up to a power of two and capped at
    /// twice [`MAX_CAPACITY`].
    pub fn with_slots(slots: usize) -> Self {
        let slots = slots.min(MAX_CAPACITY * 2).next_power_of_two();

        Self {
            slots: (0..slots).map(|_| Slot::default()).collect(),
            claimed: AtomicUsize::new(0),
            claim_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of slots claimed by a key so far.
    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Relaxed)
    }

    /// Bind `slot` to `key` unless another key got there first; returns the owning key.
    fn claim<'s>(&self, slot: &'s Slot, key: &[u8]) -> &'s [u8] {
        let _guard = self.claim_lock.lock();

        slot.key.get_or_init(|| {
            self.claimed.fetch_add(1, Ordering::Relaxed);
            key.into()
        })
    }

    /// Find the slot owned by `key`, claiming the first free one along its probe sequence.
    fn find(&self, key: &[u8]) -> Result<&Slot> {
        let mask = self.slots.len() - 1;
        let start = gxhash::gxhash64(key, SEED) as usize & mask;

        for probe in 0..self.slots.len() {
            let slot = &self.slots[(start + probe) & mask];

            let owner = match slot.key.get() {
                Some(owner) => &owner[..],
                None => self.claim(slot, key),
            };

            if owner == key {
                return Ok(slot);
            }
        }

        Err(Error::CollisionOverflow {
            capacity: self.capacity(),
        })
    }
}

impl ConcurrentTable for SlotTable {
    fn merge(&self, key: &[u8], value: f64) -> Result<()> {
        self.find(key)?.extend(value);

        Ok(())
    }

    fn into_aggregates(self) -> Aggregates {
        self.slots
            .into_vec()
            .into_iter()
            .filter_map(|mut slot| {
                let key = slot.key.take()?;
                Some((key, slot.into_accumulator()))
            })
            .collect()
    }
}

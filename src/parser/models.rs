//! The per-key statistics and the finalized results of a run.

use itertools::Itertools;

use super::func;

/// Running statistics of a single key.
///
/// A default instance has not observed any value yet: its `min` and `max` are the
/// infinities and `count` is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl Accumulator {
    /// Create a new [`Accumulator`] with a single value.
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    /// Merge a single value into the stats.
    pub fn extend(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }

        self.sum += value;
        self.count += 1;
    }

    /// Whether any value has been merged yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The arithmetic mean, or [`None`] if nothing was observed.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Render the stats as `name=min/mean/max` with `precision` decimals.
    pub fn export_text(&self, name: &[u8], precision: usize) -> String {
        format!(
            "{name}={min:.precision$}/{avg:.precision$}/{max:.precision$}",
            name = func::bytes_to_string(name),
            min = self.min,
            avg = self.mean().unwrap_or(f64::NAN),
            max = self.max,
        )
    }
}

impl From<f64> for Accumulator {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl std::ops::AddAssign for Accumulator {
    /// Combine two [`Accumulator`]s together.
    fn add_assign(&mut self, rhs: Self) {
        self.min = self.min.min(rhs.min);
        self.max = self.max.max(rhs.max);
        self.sum += rhs.sum;
        self.count += rhs.count;
    }
}

impl std::ops::Add for Accumulator {
    type Output = Self;

    /// Combine two [`Accumulator`]s together.
    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

/// The finalized, read-only results of a run.
///
/// Only keys that observed at least one value are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    stats: gxhash::GxHashMap<Box<[u8]>, Accumulator>,
    skipped: usize,
}

impl Aggregates {
    /// Create a new empty [`Aggregates`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the stats of one key; empty stats are ignored.
    pub fn insert(&mut self, name: &[u8], stats: Accumulator) {
        if stats.is_empty() {
            return;
        }

        match self.stats.get_mut(name) {
            Some(existing) => *existing += stats,
            None => {
                self.stats.insert(name.into(), stats);
            }
        }
    }

    /// Record that `count` malformed records were skipped.
    pub fn add_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Get the stats of a single key.
    pub fn get(&self, name: &[u8]) -> Option<&Accumulator> {
        self.stats.get(name)
    }

    /// The number of distinct keys.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// The number of records merged over all keys.
    pub fn total_count(&self) -> u64 {
        self.stats.values().map(|stats| stats.count).sum()
    }

    /// The number of malformed records that were skipped.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Iterate through the records in an arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Accumulator)> {
        self.stats.iter().map(|(name, stats)| (&name[..], stats))
    }

    /// Iterate through the records in the byte order of the keys.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&[u8], &Accumulator)> {
        self.iter().sorted_unstable_by_key(|(name, _)| *name)
    }

    /// Render one `name=min/mean/max` line per key, sorted by key.
    pub fn export_text(&self, precision: usize) -> String {
        self.iter_sorted()
            .map(|(name, stats)| stats.export_text(name, precision) + "\n")
            .collect()
    }
}

impl std::ops::AddAssign for Aggregates {
    fn add_assign(&mut self, rhs: Self) {
        self.skipped += rhs.skipped;
        rhs.stats
            .into_iter()
            .for_each(|(name, stats)| self.insert(&name, stats));
    }
}

impl FromIterator<(Box<[u8]>, Accumulator)> for Aggregates {
    fn from_iter<I: IntoIterator<Item = (Box<[u8]>, Accumulator)>>(iter: I) -> Self {
        let mut aggregates = Self::new();
        iter.into_iter()
            .for_each(|(name, stats)| aggregates.insert(&name, stats));
        aggregates
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accumulator_extend() {
        let mut stats = Accumulator::default();
        (1..=10).for_each(|value| stats.extend(value as f64));

        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.sum, 55.0);
        assert_eq!(stats.count, 10);
        assert_eq!(stats.mean(), Some(5.5));
    }

    #[test]
    fn accumulator_default_is_unobserved() {
        let stats = Accumulator::default();

        assert!(stats.is_empty());
        assert_eq!(stats.mean(), None);
    }

    #[test]
    fn accumulator_add() {
        let mut left = Accumulator::new(-3.5);
        left.extend(2.0);
        let right = Accumulator::new(7.25);

        let merged = left + right + Accumulator::default();

        assert_eq!(merged.min, -3.5);
        assert_eq!(merged.max, 7.25);
        assert_eq!(merged.sum, 5.75);
        assert_eq!(merged.count, 3);
    }

    #[test]
    fn accumulator_export() {
        let mut stats = Accumulator::new(1.0);
        [6.0, 4.0, 2.0, 5.0, 3.0]
            .into_iter()
            .for_each(|value| stats.extend(value));

        assert_eq!(&stats.export_text(b"station1", 1), "station1=1.0/3.5/6.0");
        assert_eq!(&stats.export_text(b"station1", 3), "station1=1.000/3.500/6.000");
    }

    #[test]
    fn aggregates_insert_merges() {
        let mut aggregates = Aggregates::new();
        aggregates.insert(b"station1", Accumulator::new(1.0));
        aggregates.insert(b"station2", Accumulator::new(2.0));
        aggregates.insert(b"station1", Accumulator::new(3.0));
        aggregates.insert(b"station3", Accumulator::default());

        let stats1 = aggregates.get(b"station1").unwrap();

        assert_eq!(stats1.min, 1.0);
        assert_eq!(stats1.max, 3.0);
        assert_eq!(stats1.count, 2);
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates.total_count(), 3);
        assert!(aggregates.get(b"station3").is_none());
    }

    #[test]
    fn aggregates_add_assign() {
        let mut left = Aggregates::new();
        left.insert(b"a", Accumulator::new(1.0));
        left.add_skipped(1);

        let mut right = Aggregates::new();
        right.insert(b"a", Accumulator::new(5.0));
        right.insert(b"b", Accumulator::new(2.0));
        right.add_skipped(2);

        left += right;

        assert_eq!(left.get(b"a").unwrap().sum, 6.0);
        assert_eq!(left.get(b"b").unwrap().count, 1);
        assert_eq!(left.skipped(), 3);
    }

    #[test]
    fn aggregates_iter_sorted() {
        let aggregates = ["this", "that", "foo", "bar", "baz"]
            .into_iter()
            .enumerate()
            .map(|(id, name)| (Box::<[u8]>::from(name.as_bytes()), Accumulator::new(id as f64)))
            .collect::<Aggregates>();

        assert_eq!(
            aggregates.iter_sorted().map(|(name, _)| name).collect::<Vec<_>>(),
            vec![&b"bar"[..], b"baz", b"foo", b"that", b"this"]
        );
    }

    #[test]
    fn aggregates_export() {
        let mut aggregates = Aggregates::new();
        aggregates.insert(b"this", Accumulator::new(0.4));
        aggregates.insert(b"foo", Accumulator::new(0.1));
        aggregates.insert(b"bar", Accumulator::new(0.2));

        assert_eq!(
            aggregates.export_text(1),
            "bar=0.2/0.2/0.2\nfoo=0.1/0.1/0.1\nthis=0.4/0.4/0.4\n"
        );
    }
}

//! Parsing `key;value` records and merging them into a table.

use std::ops::Range;

use super::{
    func,
    scan::{DefaultScan, LineScanner, RecordSpan},
};
use crate::{
    config::Policy,
    error::{Error, ParseError, Result},
    table::ConcurrentTable,
};

/// Separates the key from the value within a record.
pub const SEMI_COLON: u8 = b';';

/// Split a record on its first `;` and parse what follows as a number.
///
/// The key is borrowed from the record; it may be empty.
pub fn parse_record(record: &[u8]) -> std::result::Result<(&[u8], f64), ParseError> {
    let split = record
        .iter()
        .position(|&byte| byte == SEMI_COLON)
        .ok_or(ParseError::MissingDelimiter)?;

    let value = func::parse_value(&record[split + 1..])?;

    Ok((&record[..split], value))
}

/// Counters of a [`parse_range`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RangeStats {
    /// Records merged into the table.
    pub records: usize,
    /// Malformed records skipped under [`Policy::Lenient`].
    pub skipped: usize,
}

impl std::ops::AddAssign for RangeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.records += rhs.records;
        self.skipped += rhs.skipped;
    }
}

/// Parse every record of `range` and merge it into `table`.
///
/// Empty lines are ignored. A malformed record aborts with [`Error::MalformedRecord`] under
/// [`Policy::Strict`], and is counted and skipped under [`Policy::Lenient`].
pub fn parse_range<T>(
    bytes: &[u8],
    range: Range<usize>,
    policy: Policy,
    table: &T,
) -> Result<RangeStats>
where
    T: ConcurrentTable,
{
    let mut stats = RangeStats::default();

    for span in LineScanner::<DefaultScan>::with_range(bytes, range.clone())
        .filter(|span: &RecordSpan| !span.is_empty())
    {
        let record = span.slice(bytes);

        match parse_record(record) {
            Ok((name, value)) => {
                table.merge(name, value)?;
                stats.records += 1;
            }
            Err(err) if policy == Policy::Lenient => {
                log::warn!(
                    "Skipping malformed record at byte {}: {:?} ({err}).",
                    span.offset,
                    func::bytes_to_string(record)
                );
                stats.skipped += 1;
            }
            Err(err) => return Err(Error::malformed(span.offset, record, err)),
        }
    }

    log::trace!(
        "parse_range() merged {} records from bytes {range:?}.",
        stats.records
    );

    Ok(stats)
}

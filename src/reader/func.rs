//! Helper functions to cut a buffer into line-aligned ranges.

use std::ops::Range;

/// Find the end of the range that starts at `start` and is at least `target` bytes long.
///
/// The range is extended to just past the next newline, so that it never splits a record.
fn range_end(bytes: &[u8], start: usize, target: usize) -> usize {
    let candidate = start.saturating_add(target.max(1));

    if candidate >= bytes.len() {
        return bytes.len();
    }

    bytes[candidate - 1..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(bytes.len(), |pos| candidate + pos)
}

/// Split `bytes` into contiguous ranges of roughly `target` bytes, each ending just after a
/// newline (or at the end of the buffer).
///
/// The ranges cover the whole buffer without overlapping, and none of them is empty.
pub fn ranges_by_size(bytes: &[u8], target: usize) -> impl Iterator<Item = Range<usize>> + '_ {
    let mut start = 0;

    std::iter::from_fn(move || {
        if start >= bytes.len() {
            return None;
        }

        let end = range_end(bytes, start, target);
        let range = start..end;
        start = end;

        Some(range)
    })
}

/// Split `bytes` into at most `count` line-aligned ranges of similar size.
pub fn ranges_by_count(bytes: &[u8], count: usize) -> Vec<Range<usize>> {
    ranges_by_size(bytes, bytes.len().div_ceil(count.max(1))).collect()
}

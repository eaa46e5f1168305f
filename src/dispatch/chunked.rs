//! Contiguous ranges iterated in parallel on a rayon pool.

use std::ops::Range;

use rayon::prelude::*;

use crate::{error::Result, parser::line::RangeStats};

/// Run `work` on every range on `pool`, returning once all of them are done.
///
/// The first error stops the remaining ranges from being started.
pub fn run<F>(pool: &rayon::ThreadPool, ranges: Vec<Range<usize>>, work: F) -> Result<RangeStats>
where
    F: Fn(Range<usize>) -> Result<RangeStats> + Send + Sync,
{
    log::debug!(
        "chunked::run() splitting work into {} ranges over {} threads.",
        ranges.len(),
        pool.current_num_threads()
    );

    pool.install(|| {
        ranges
            .into_par_iter()
            .map(work)
            .try_reduce(RangeStats::default, |mut acc, stats| {
                acc += stats;
                Ok(acc)
            })
    })
}

//! Task to create a number of consumers popping line-aligned batches off the same queue.

use std::{
    ops::Range,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use deadqueue::unlimited::Queue;

use crate::{
    error::{Error, Result},
    parser::line::RangeStats,
};

/// A batch of work; [`None`] tells the consumer popping it to stop.
type Batch = Option<Range<usize>>;

/// Consume batches until a stop marker is popped.
///
/// Once any consumer has failed, the remaining batches are drained without being processed.
async fn consume<F>(
    queue: Arc<Queue<Batch>>,
    aborted: Arc<AtomicBool>,
    work: Arc<F>,
) -> Result<RangeStats>
where
    F: Fn(Range<usize>) -> Result<RangeStats> + Send + Sync + 'static,
{
    let mut stats = RangeStats::default();

    while let Some(range) = queue.pop().await {
        if aborted.load(Ordering::Relaxed) {
            continue;
        }

        match work(range) {
            Ok(range_stats) => stats += range_stats,
            Err(err) => {
                aborted.store(true, Ordering::Relaxed);
                return Err(err);
            }
        }
    }

    Ok(stats)
}

/// Spawn `workers` consumers, feed them `ranges`, and wait for all of them to finish.
///
/// Must be called within a multi-threaded tokio runtime. Consumers wait on the queue while it
/// is empty, so the producer can push batches while they are being processed. The first
/// error reported by a consumer is returned, after every consumer has stopped.
pub async fn run<F>(
    ranges: impl Iterator<Item = Range<usize>>,
    workers: usize,
    work: F,
) -> Result<RangeStats>
where
    F: Fn(Range<usize>) -> Result<RangeStats> + Send + Sync + 'static,
{
    let queue = Arc::new(Queue::<Batch>::new());
    let aborted = Arc::new(AtomicBool::new(false));
    let work = Arc::new(work);

    let handles = (0..workers.max(1))
        .map(|_id| {
            log::trace!("queued::run() spawning consumer #{_id}.");

            tokio::spawn(consume(
                Arc::clone(&queue),
                Arc::clone(&aborted),
                Arc::clone(&work),
            ))
        })
        .collect::<Vec<_>>();

    let mut batches = 0;
    for range in ranges {
        if aborted.load(Ordering::Relaxed) {
            break;
        }

        queue.push(Some(range));
        batches += 1;
    }

    log::debug!("queued::run() pushed {batches} batches to the queue.");

    handles.iter().for_each(|_| queue.push(None));

    let mut stats = RangeStats::default();
    let mut first_error = None;

    for (_id, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(consumer_stats)) => stats += consumer_stats,
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(err) => {
                first_error.get_or_insert(Error::WorkerFailed(err.to_string()));
            }
        }

        log::trace!("queued::run() consumer #{_id} finished.");
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(stats),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ParseError;

    fn count_bytes(range: Range<usize>) -> Result<RangeStats> {
        Ok(RangeStats {
            records: range.len(),
            skipped: 0,
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_batch_is_processed_once() {
        let ranges = (0..100).map(|id| id * 10..id * 10 + 10);

        let stats = run(ranges, 4, count_bytes).await.unwrap();

        assert_eq!(stats.records, 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn no_batches() {
        let stats = run(std::iter::empty(), 3, count_bytes).await.unwrap();

        assert_eq!(stats, RangeStats::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn first_error_aborts() {
        let ranges = (0..100).map(|id| id..id + 1);

        let result = run(ranges, 4, |range: Range<usize>| {
            if range.start == 42 {
                Err(Error::malformed(range.start, b"bad", ParseError::MissingDelimiter))
            } else {
                count_bytes(range)
            }
        })
        .await;

        match result {
            Err(Error::MalformedRecord { offset, .. }) => assert_eq!(offset, 42),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }
}

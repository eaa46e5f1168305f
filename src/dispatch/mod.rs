//! Distributing line-aligned ranges of the input over a fixed pool of worker threads.

pub mod chunked;
pub mod queued;

use std::ops::Range;

use crate::{
    config::{self, Dispatch},
    error::{Error, Result},
    parser::line::RangeStats,
    reader::func,
};

#[cfg(feature = "timed")]
pub static RANGE_TIMER: crate::timed::PhaseTimer =
    crate::timed::PhaseTimer::new("WorkerPool::run() range");

/// The threads that do the work, kept alive between runs.
#[derive(Debug)]
pub enum WorkerPool {
    Rayon(rayon::ThreadPool),
    Tokio {
        /// Only taken out when the pool is dropped.
        runtime: Option<tokio::runtime::Runtime>,
        workers: usize,
    },
}

impl WorkerPool {
    /// Start `workers` threads suited to `dispatch`.
    pub fn new(dispatch: Dispatch, workers: usize) -> Result<Self> {
        let workers = workers.max(1);

        log::debug!("WorkerPool::new() starting {workers} threads for {dispatch:?} dispatch.");

        match dispatch {
            Dispatch::Chunked => Ok(Self::Rayon(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|id| format!("brc-worker-{id}"))
                    .build()?,
            )),
            Dispatch::Queued => Ok(Self::Tokio {
                runtime: Some(
                    tokio::runtime::Builder::new_multi_thread()
                        .worker_threads(workers)
                        .thread_name("brc-worker")
                        .build()
                        .map_err(Error::Runtime)?,
                ),
                workers,
            }),
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            Self::Rayon(pool) => pool.current_num_threads(),
            Self::Tokio { workers, .. } => *workers,
        }
    }

    /// Split `bytes` into line-aligned ranges and call `work` on each of them exactly once.
    ///
    /// This is the barrier of a run: it only returns once every worker is done with its
    /// share, whether or not one of them failed.
    pub fn run<F>(&self, bytes: &[u8], work: F) -> Result<RangeStats>
    where
        F: Fn(Range<usize>) -> Result<RangeStats> + Send + Sync + 'static,
    {
        #[cfg(feature = "timed")]
        let work = move |range: Range<usize>| RANGE_TIMER.measure(|| work(range));

        match self {
            Self::Rayon(pool) => {
                let chunks = pool.current_num_threads() * config::CHUNKS_PER_WORKER;

                chunked::run(pool, func::ranges_by_count(bytes, chunks), work)
            }
            Self::Tokio {
                runtime: Some(runtime),
                workers,
            } => {
                let block = || {
                    runtime.block_on(queued::run(
                        func::ranges_by_size(bytes, config::BATCH_SIZE),
                        *workers,
                        work,
                    ))
                };

                // `block_on` panics on a thread that is already driving a runtime, so the
                // wait moves to a plain thread of its own.
                if tokio::runtime::Handle::try_current().is_err() {
                    return block();
                }

                std::thread::scope(|scope| {
                    scope.spawn(block).join().map_err(|_| {
                        Error::WorkerFailed("the queued dispatch thread panicked".into())
                    })?
                })
            }
            Self::Tokio { runtime: None, .. } => Err(Error::WorkerFailed(
                "the async runtime has been shut down".into(),
            )),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics within an async context.
        if let Self::Tokio { runtime, .. } = self {
            if let (Some(runtime), Ok(_)) =
                (runtime.take(), tokio::runtime::Handle::try_current())
            {
                runtime.shutdown_background();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Every byte must be handed out exactly once, whatever the dispatch.
    fn assert_covers_input(dispatch: Dispatch, workers: usize) {
        let pool = WorkerPool::new(dispatch, workers).unwrap();
        let bytes = "key;1.0\n".repeat(10_000).into_bytes();
        let seen = Arc::new(AtomicUsize::new(0));

        let stats = pool
            .run(&bytes, {
                let seen = Arc::clone(&seen);
                move |range| {
                    seen.fetch_add(range.len(), Ordering::Relaxed);
                    Ok(RangeStats {
                        records: 1,
                        skipped: 0,
                    })
                }
            })
            .unwrap();

        assert_eq!(pool.workers(), workers);
        assert_eq!(seen.load(Ordering::Relaxed), bytes.len());
        assert!(stats.records >= 1);
    }

    #[test]
    fn rayon_covers_input() {
        assert_covers_input(Dispatch::Chunked, 1);
        assert_covers_input(Dispatch::Chunked, 3);
    }

    #[test]
    fn tokio_covers_input() {
        assert_covers_input(Dispatch::Queued, 1);
        assert_covers_input(Dispatch::Queued, 3);
    }

    #[tokio::test]
    async fn tokio_runs_within_a_runtime() {
        let pool = WorkerPool::new(Dispatch::Queued, 2).unwrap();
        let bytes = b"A;1\nB;2\n";

        let stats = pool
            .run(bytes, |range| {
                Ok(RangeStats {
                    records: range.len(),
                    skipped: 0,
                })
            })
            .unwrap();

        assert_eq!(stats.records, bytes.len());
        drop(pool);
    }

    #[test]
    fn empty_input_runs_nothing() {
        for dispatch in [Dispatch::Chunked, Dispatch::Queued] {
            let pool = WorkerPool::new(dispatch, 2).unwrap();

            let stats = pool.run(b"", |_| panic!("no range expected")).unwrap();

            assert_eq!(stats, RangeStats::default());
        }
    }
}

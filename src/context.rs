//! The context object that owns the configuration and the worker threads of a run.

use std::sync::Arc;

use crate::{
    config::RunConfig,
    dispatch::WorkerPool,
    error::{Error, Result},
    parser::{line, models::Aggregates},
    reader::ByteSource,
    table::{AggregationTable, ConcurrentTable},
};

#[cfg(feature = "timed")]
pub static RUN_TIMER: crate::timed::PhaseTimer = crate::timed::PhaseTimer::new("Context::run()");

/// Aggregates inputs according to a [`RunConfig`].
///
/// The worker threads are started once and reused by every [`Context::run`].
#[derive(Debug)]
pub struct Context {
    config: RunConfig,
    pool: WorkerPool,
}

impl Context {
    /// Start the worker threads described by `config`.
    pub fn new(config: RunConfig) -> Result<Self> {
        let pool = WorkerPool::new(config.dispatch, config.workers)?;

        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Compute the statistics of every key in `source`.
    ///
    /// Running twice over the same source gives the same keys and counts; sums may differ in
    /// their last bits since the order of additions depends on scheduling.
    ///
    /// May be called from within an async runtime; the calling thread then blocks until the
    /// run is over.
    pub fn run(&self, source: &Arc<ByteSource>) -> Result<Aggregates> {
        #[cfg(feature = "timed")]
        return RUN_TIMER.measure(|| self.aggregate(source));

        #[cfg(not(feature = "timed"))]
        self.aggregate(source)
    }

    fn aggregate(&self, source: &Arc<ByteSource>) -> Result<Aggregates> {
        log::info!(
            "Aggregating {} bytes with {} workers, {:?} table, {:?} dispatch, {:?} policy.",
            source.len(),
            self.pool.workers(),
            self.config.strategy,
            self.config.dispatch,
            self.config.policy,
        );

        let table = Arc::new(AggregationTable::new(
            self.config.strategy,
            self.config.capacity,
        ));

        let stats = self.pool.run(source.bytes(), {
            let source = Arc::clone(source);
            let table = Arc::clone(&table);
            let policy = self.config.policy;

            move |range| line::parse_range(source.bytes(), range, policy, table.as_ref())
        })?;

        // Every worker and its copy of the table handle are gone past the barrier.
        let table = Arc::into_inner(table).ok_or_else(|| {
            Error::WorkerFailed("the table is still shared after all workers finished".into())
        })?;

        let mut aggregates = table.into_aggregates();
        aggregates.add_skipped(stats.skipped);

        if stats.skipped > 0 {
            log::warn!("Skipped {} malformed records.", stats.skipped);
        }

        log::info!(
            "Aggregated {} records into {} keys.",
            stats.records,
            aggregates.len()
        );

        Ok(aggregates)
    }

    /// Map the file at `path` and [`Context::run`] over it.
    pub fn run_path(&self, path: impl AsRef<std::path::Path>) -> Result<Aggregates> {
        self.run(&Arc::new(ByteSource::open(path)?))
    }
}

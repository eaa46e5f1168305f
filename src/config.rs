//! Configuration for a run.

/// Slack added to [`BATCH_SIZE`] for the partial line each batch is extended by, so that it
/// ends on a newline.
pub const MAX_LINE_LENGTH: usize = 128;

/// The default number of distinct keys expected; the real data set has 400-ish stations.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Tables never preallocate for more distinct keys than this; larger hints are clamped.
pub const MAX_CAPACITY: usize = 1 << 18;

/// Size in bytes of one batch pushed onto the work queue by [`Dispatch::Queued`].
pub const BATCH_SIZE: usize = 8192 * 256 + MAX_LINE_LENGTH;

/// Number of ranges each worker receives under [`Dispatch::Chunked`], so that a slow range
/// does not leave the other workers idle at the end of the run.
pub const CHUNKS_PER_WORKER: usize = 4;

/// The number of workers used when none is specified.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// Which concurrent table the workers merge into.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// One mutex around the whole table.
    Global,
    /// Shared lookup, locked insert, and one lock per entry.
    EntryLock,
    /// Fixed-capacity open-addressed slots merged with atomics.
    #[default]
    Slot,
}

/// How the records are handed to the workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Dispatch {
    /// Contiguous line-aligned ranges iterated in parallel on a rayon pool.
    #[default]
    Chunked,
    /// Line-aligned batches popped from a queue by tokio tasks.
    Queued,
}

/// What to do with a record that cannot be parsed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Abort the whole run, reporting the offending record.
    #[default]
    Strict,
    /// Skip the record and carry on.
    Lenient,
}

/// Everything a [`crate::Context`] needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub workers: usize,
    pub strategy: Strategy,
    pub dispatch: Dispatch,
    pub policy: Policy,
    pub capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            strategy: Strategy::default(),
            dispatch: Dispatch::default(),
            policy: Policy::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl RunConfig {
    /// Set the number of worker threads; zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the expected number of distinct keys, clamped to `1..=MAX_CAPACITY`.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.clamp(1, MAX_CAPACITY);
        self
    }
}

//! Errors raised while aggregating a file.

use std::path::PathBuf;

/// Why a single record could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no `;` separator in record")]
    MissingDelimiter,

    #[error("value is not a finite number")]
    InvalidNumber,
}

/// Errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {path}: {source}")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at byte {offset} ({record:?}): {source}")]
    MalformedRecord {
        offset: usize,
        record: String,
        #[source]
        source: ParseError,
    },

    #[error("slot table is full: more distinct keys than its capacity of {capacity}")]
    CollisionOverflow { capacity: usize },

    #[error("failed to build the thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to build the async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("a worker did not finish: {0}")]
    WorkerFailed(String),
}

impl Error {
    /// Wrap a [`ParseError`] with the location of the record that caused it.
    pub fn malformed(offset: usize, record: &[u8], source: ParseError) -> Self {
        Self::MalformedRecord {
            offset,
            record: String::from_utf8_lossy(record).into_owned(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

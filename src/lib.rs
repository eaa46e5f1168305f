pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod parser;
pub mod reader;
pub mod table;

#[cfg(feature = "timed")]
pub mod timed;

pub use config::{Dispatch, Policy, RunConfig, Strategy};
pub use context::Context;
pub use error::{Error, ParseError, Result};
pub use parser::models::{Accumulator, Aggregates};
pub use reader::ByteSource;

use clap::Parser;

/// Command line arguments of the `main` binary.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Per-key min/mean/max over a `key;value` flat file.")]
pub struct CliArgs {
    /// Path to the measurements file.
    pub file: String,

    /// Number of worker threads; defaults to the available parallelism.
    #[arg(short, long, default_value_t = config::default_workers())]
    pub threads: usize,

    /// How worker threads share the aggregation table.
    #[arg(short, long, value_enum, default_value_t = Strategy::default())]
    pub strategy: Strategy,

    /// How records are distributed among the worker threads.
    #[arg(short, long, value_enum, default_value_t = Dispatch::default())]
    pub dispatch: Dispatch,

    /// Skip malformed records instead of aborting the run.
    #[arg(long)]
    pub lenient: bool,

    /// Expected number of distinct keys; clamped to `config::MAX_CAPACITY`.
    #[arg(long, default_value_t = config::DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Number of decimals printed for each statistic.
    #[arg(long, default_value_t = 1)]
    pub precision: usize,

    /// Increase the log verbosity; may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CliArgs {
    /// Build the [`RunConfig`] described by these arguments.
    pub fn run_config(&self) -> RunConfig {
        RunConfig::default()
            .with_workers(self.threads)
            .with_strategy(self.strategy)
            .with_dispatch(self.dispatch)
            .with_policy(if self.lenient {
                Policy::Lenient
            } else {
                Policy::Strict
            })
            .with_capacity(self.capacity)
    }

    /// The log level implied by the number of `--verbose` flags.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

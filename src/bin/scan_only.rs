//! Measure the line scanners on their own, without parsing or aggregating.
//!
//! Each scanner walks the whole mapped file on a single thread; the record counts must agree,
//! and the timings show what the wider blocks buy over a byte by byte scan.
use clap::Parser;
use std::time::{Duration, Instant};

use parallel_1brc::{
    parser::scan::{BlockScan, LineScanner, ScalarScan, SwarScan},
    ByteSource, CliArgs,
};

/// The number of trials to run for each scanner.
const TRIALS: u32 = 4;

fn trial<S: BlockScan>(name: &str, bytes: &[u8]) -> usize {
    let mut count = 0;
    let mut elapsed = Duration::ZERO;

    for _ in 0..TRIALS {
        let start = Instant::now();
        count = LineScanner::<S>::with_range(bytes, 0..bytes.len()).count();
        elapsed += start.elapsed();
    }

    println!(
        "{name}: {count} records, mean elapsed time {:?} over {TRIALS} runs.",
        elapsed / TRIALS
    );

    count
}

fn main() {
    let args = CliArgs::parse();

    println!(
        "Parameters:\n\
        - File: {}",
        args.file
    );

    let source = match ByteSource::open(&args.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let baseline = trial::<ScalarScan>("scalar", source.bytes());
    let swar = trial::<SwarScan>("swar", source.bytes());
    assert_eq!(baseline, swar);

    #[cfg(target_arch = "x86_64")]
    assert_eq!(
        baseline,
        trial::<parallel_1brc::parser::scan::Sse2Scan>("sse2", source.bytes())
    );
}

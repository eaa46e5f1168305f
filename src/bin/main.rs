use clap::Parser;
use std::{io::Write, process::ExitCode};

#[cfg(feature = "bench")]
use std::time::Instant;

use parallel_1brc::{CliArgs, Context};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .init();

    log::info!(
        "Parameters:\n\
        - File: {}\n\
        - Threads: {}\n\
        - Strategy: {:?}\n\
        - Dispatch: {:?}\n\
        - Lenient: {}\n\
        - Capacity: {}",
        args.file,
        args.threads,
        args.strategy,
        args.dispatch,
        args.lenient,
        args.capacity
    );

    #[cfg(feature = "bench")]
    let start = Instant::now();

    let result = Context::new(args.run_config()).and_then(|context| context.run_path(&args.file));

    #[cfg(feature = "bench")]
    println!("Elapsed time: {:?}", start.elapsed());

    #[cfg(feature = "timed")]
    '_timed: {
        parallel_1brc::context::RUN_TIMER.report();
        parallel_1brc::dispatch::RANGE_TIMER.report();
    }

    let aggregates = match result {
        Ok(aggregates) => aggregates,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(err) = stdout.write_all(aggregates.export_text(args.precision).as_bytes()) {
        eprintln!("error: cannot write the results: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

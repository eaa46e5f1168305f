//! End to end runs over files on disk.

use std::{io::Write, sync::Arc};

use parallel_1brc::{
    Aggregates, ByteSource, Context, Dispatch, Error, ParseError, Policy, RunConfig, Strategy,
};

const STRATEGIES: [Strategy; 3] = [Strategy::Global, Strategy::EntryLock, Strategy::Slot];
const DISPATCHES: [Dispatch; 2] = [Dispatch::Chunked, Dispatch::Queued];

fn write_input(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

/// Run over `contents` with every strategy and dispatch, checking they all agree.
fn run_all(contents: &[u8], policy: Policy) -> Result<Aggregates, Error> {
    let file = write_input(contents);
    let mut results = Vec::new();

    for strategy in STRATEGIES {
        for dispatch in DISPATCHES {
            let config = RunConfig::default()
                .with_workers(4)
                .with_strategy(strategy)
                .with_dispatch(dispatch)
                .with_policy(policy);

            results.push(Context::new(config)?.run_path(file.path())?);
        }
    }

    let first = results.remove(0);
    for other in results {
        assert_eq!(first, other);
    }

    Ok(first)
}

fn assert_stats(aggregates: &Aggregates, key: &str, min: f64, max: f64, mean: f64, count: u64) {
    let stats = aggregates
        .get(key.as_bytes())
        .unwrap_or_else(|| panic!("missing key {key}"));

    assert_eq!(stats.min, min, "min of {key}");
    assert_eq!(stats.max, max, "max of {key}");
    assert_eq!(stats.count, count, "count of {key}");
    assert!((stats.mean().unwrap() - mean).abs() <= mean.abs() * 1e-6, "mean of {key}");
}

#[test]
fn two_keys() {
    let aggregates = run_all(b"A;10.0\nB;20.0\nA;5.0\n", Policy::Strict).unwrap();

    assert_eq!(aggregates.len(), 2);
    assert_stats(&aggregates, "A", 5.0, 10.0, 7.5, 2);
    assert_stats(&aggregates, "B", 20.0, 20.0, 20.0, 1);
}

#[test]
fn unterminated_last_record() {
    let aggregates = run_all(b"X;1.0\nX;3.0", Policy::Strict).unwrap();

    assert_eq!(aggregates.len(), 1);
    assert_stats(&aggregates, "X", 1.0, 3.0, 2.0, 2);
}

#[test]
fn empty_file() {
    let aggregates = run_all(b"", Policy::Strict).unwrap();

    assert!(aggregates.is_empty());
    assert_eq!(aggregates.export_text(1), "");
}

#[test]
fn malformed_strict() {
    let result = run_all(b"A;1.0\nY;notanumber\n", Policy::Strict);

    match result {
        Err(Error::MalformedRecord {
            offset,
            record,
            source,
        }) => {
            assert_eq!(offset, 6);
            assert_eq!(record, "Y;notanumber");
            assert_eq!(source, ParseError::InvalidNumber);
        }
        other => panic!("expected MalformedRecord, got {other:?}"),
    }
}

#[test]
fn missing_delimiter_strict() {
    let result = run_all(b"A;1.0\nno delimiter here\n", Policy::Strict);

    assert!(matches!(
        result,
        Err(Error::MalformedRecord {
            source: ParseError::MissingDelimiter,
            ..
        })
    ));
}

#[test]
fn malformed_lenient() {
    let aggregates = run_all(b"A;1.0\nY;notanumber\nB;2.0\nA;3.0\n", Policy::Lenient).unwrap();

    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates.skipped(), 1);
    assert!(aggregates.get(b"Y").is_none());
    assert_stats(&aggregates, "A", 1.0, 3.0, 2.0, 2);
    assert_stats(&aggregates, "B", 2.0, 2.0, 2.0, 1);
}

#[test]
fn blank_lines_and_empty_key() {
    let aggregates = run_all(b"\n\nA;1\n\n;2.5\n;-2.5\n\n", Policy::Strict).unwrap();

    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates.total_count(), 3);
    assert_stats(&aggregates, "", -2.5, 2.5, 0.0, 2);
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let context = Context::new(RunConfig::default().with_workers(1)).unwrap();

    let result = context.run_path(dir.path().join("nope.txt"));

    assert!(matches!(result, Err(Error::InputUnavailable { .. })));
}

#[test]
fn export_is_sorted() {
    let aggregates = run_all("b;1\na;2\nc;-3.25\na;4\n".as_bytes(), Policy::Strict).unwrap();

    assert_eq!(
        aggregates.export_text(2),
        "a=2.00/3.00/4.00\nb=1.00/1.00/1.00\nc=-3.25/-3.25/-3.25\n"
    );
}

/// Values are multiples of 0.5, so every sum is exact whatever the order of additions.
fn synthetic_input(records: usize, keys: usize) -> Vec<u8> {
    (0..records)
        .map(|id| {
            let key = (id * 7919) % keys;
            let value = ((id * 31) % 400) as f64 * 0.5 - 100.0;
            format!("station-{key:04};{value:.1}\n")
        })
        .collect::<String>()
        .into_bytes()
}

#[test]
fn identical_across_thread_counts() {
    const RECORDS: usize = 400_000;
    const KEYS: usize = 413;

    let source = Arc::new(ByteSource::from_vec(synthetic_input(RECORDS, KEYS)));
    let mut baseline: Option<Aggregates> = None;

    for strategy in STRATEGIES {
        for dispatch in DISPATCHES {
            for workers in [1, 2, 8] {
                let config = RunConfig::default()
                    .with_workers(workers)
                    .with_strategy(strategy)
                    .with_dispatch(dispatch)
                    .with_capacity(KEYS);

                let aggregates = Context::new(config).unwrap().run(&source).unwrap();

                assert_eq!(aggregates.len(), KEYS);
                assert_eq!(aggregates.total_count(), RECORDS as u64);

                match &baseline {
                    Some(baseline) => assert_eq!(
                        baseline, &aggregates,
                        "{strategy:?} {dispatch:?} with {workers} workers"
                    ),
                    None => baseline = Some(aggregates),
                }
            }
        }
    }
}

#[test]
fn values_within_extremes() {
    let input = synthetic_input(50_000, 37);
    let source = Arc::new(ByteSource::from_vec(input.clone()));
    let aggregates = Context::new(RunConfig::default().with_workers(4))
        .unwrap()
        .run(&source)
        .unwrap();

    let text = String::from_utf8(input).unwrap();
    for line in text.lines() {
        let (key, value) = line.split_once(';').unwrap();
        let value = value.parse::<f64>().unwrap();
        let stats = aggregates.get(key.as_bytes()).unwrap();

        assert!(stats.min <= value && value <= stats.max);
    }
}

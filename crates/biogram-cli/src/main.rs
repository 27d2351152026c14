use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use biogram_cli::{BadRecordPolicy, read_corpus, run_passes};
use biogram_csv::ReadMode;
use biogram_stem::{Classifier, Tokenizer};
use biogram_types::MAX_ORDER;

const DEFAULT_MIN_COUNT: u64 = 3;
const DEFAULT_MAX_ORDER: usize = 3;

fn main() -> Result<()> {
    init_tracing();

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!(
                "Usage: biogram [--min-count=N] [--max-order=K] [--mode=mmap|stream] \
                 [--on-error=abort|skip] INPUT.csv OUT.txt"
            );
            process::exit(2);
        }
    };

    info!("reading records from {}", config.input.display());
    info!(
        "min count {}, max order {}, mode {:?}, on parse error {:?}",
        config.min_count, config.max_order, config.mode, config.on_error
    );

    let start = Instant::now();
    let tokenizer = Tokenizer::new()?;
    let classifier = Classifier::new();

    let mut reader = biogram_csv::open(&config.input, config.mode)?;
    let corpus = read_corpus(&mut reader, &tokenizer, &classifier, config.on_error)?;
    info!(
        "corpus built in {} ms ({} bios, {} arena bytes)",
        start.elapsed().as_millis(),
        corpus.bios.len(),
        corpus.arena.len()
    );

    let out_file = File::create(&config.output)
        .with_context(|| format!("creating {}", config.output.display()))?;
    let mut out = BufWriter::new(out_file);

    let mine_start = Instant::now();
    run_passes(&corpus, config.max_order, config.min_count, &mut out)?;
    info!(
        "mined {} orders in {} ms, report at {}",
        config.max_order,
        mine_start.elapsed().as_millis(),
        config.output.display()
    );

    Ok(())
}

#[derive(Debug)]
struct Config {
    input: PathBuf,
    output: PathBuf,
    min_count: u64,
    max_order: usize,
    mode: ReadMode,
    on_error: BadRecordPolicy,
}

impl Config {
    fn from_args() -> Result<Self> {
        let mut min_count = DEFAULT_MIN_COUNT;
        let mut max_order = DEFAULT_MAX_ORDER;
        let mut mode = ReadMode::Mmap;
        let mut on_error = BadRecordPolicy::Abort;
        let mut positional: Vec<PathBuf> = Vec::new();

        for arg in env::args().skip(1) {
            if let Some(value) = arg.strip_prefix("--min-count=") {
                min_count = value
                    .parse()
                    .with_context(|| format!("bad --min-count value: {value}"))?;
            } else if let Some(value) = arg.strip_prefix("--max-order=") {
                max_order = value
                    .parse()
                    .with_context(|| format!("bad --max-order value: {value}"))?;
                if max_order < 1 || max_order > MAX_ORDER {
                    bail!("--max-order must be between 1 and {MAX_ORDER}");
                }
            } else if let Some(value) = arg.strip_prefix("--mode=") {
                mode = match value {
                    "mmap" => ReadMode::Mmap,
                    "stream" => ReadMode::Stream,
                    _ => bail!("--mode must be mmap or stream, got {value}"),
                };
            } else if let Some(value) = arg.strip_prefix("--on-error=") {
                on_error = match value {
                    "abort" => BadRecordPolicy::Abort,
                    "skip" => BadRecordPolicy::Skip,
                    _ => bail!("--on-error must be abort or skip, got {value}"),
                };
            } else if arg.starts_with("--") {
                bail!("unknown flag: {arg}");
            } else {
                positional.push(PathBuf::from(arg));
            }
        }

        let [input, output] = positional.try_into().map_err(|extra: Vec<PathBuf>| {
            anyhow::anyhow!("expected INPUT.csv and OUT.txt, got {} paths", extra.len())
        })?;

        Ok(Self {
            input,
            output,
            min_count,
            max_order,
            mode,
            on_error,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}

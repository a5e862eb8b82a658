//! Command-line run shell: configures the source assembly from a macro and emits events on
//! a pool of independent workers.

use std::{
    env, fs,
    io::BufReader,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use isosource_core::{
    config::AssemblyConfig,
    emission::{worker_rng, EmissionDriver, DEFAULT_SEED},
    messenger::{Command, SourceMessenger},
    metrics::EmissionTally,
    SourceError, SourceTable,
};
use rayon::prelude::*;
use serde::Serialize;
use tracer::init_tracing;
use tracing::{info, warn};

struct CliOptions {
    events: u64,
    workers: usize,
    seed: Option<u64>,
    macro_file: Option<PathBuf>,
    config_json: Option<PathBuf>,
    sources: Option<PathBuf>,
    summary_json: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    seed: u64,
    workers: usize,
    sources: usize,
    wall_seconds: f64,
    mean_energy: Option<f64>,
    tally: EmissionTally,
}

fn main() -> Result<()> {
    init_tracing();
    let options = parse_options()?;

    let mut config = AssemblyConfig::default();
    if let Some(ref path) = options.config_json {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut overlay: AssemblyConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        overlay.source_table = overlay
            .source_table
            .map(|table| relative_to_config(path, table));
        config.merge(&overlay);
    }

    let mut messenger = SourceMessenger::new(config);
    if let Some(table) = messenger.config().source_table.clone() {
        messenger
            .apply(&Command::SourceTable(table))
            .context("failed to load source table named in config")?;
    }
    if let Some(ref path) = options.macro_file {
        run_macro(&mut messenger, path)?;
    }
    let (mut config, mut sources) = messenger.into_parts();

    if let Some(ref path) = options.sources {
        sources = SourceTable::from_path(path)
            .with_context(|| format!("failed to load source table {}", path.display()))?;
    }
    if options.seed.is_some() {
        config.seed = options.seed;
    }
    let seed = config.seed.unwrap_or(DEFAULT_SEED);

    // fail on incomplete configuration before any worker starts
    let assembly = config.resolve().context("source assembly is not fully configured")?;
    if sources.is_empty() {
        warn!("source table is empty; events will emit no primaries");
    }
    info!(
        events = options.events,
        workers = options.workers,
        sources = sources.len(),
        seed,
        "starting run"
    );

    let start = Instant::now();
    let tallies = (0..options.workers)
        .into_par_iter()
        .map(|worker| -> Result<EmissionTally, SourceError> {
            let events = events_for_worker(options.events, options.workers, worker);
            let rng = worker_rng(seed, worker as u64);
            let mut driver = EmissionDriver::cone(&config, sources.clone(), rng)?;
            let mut tally = EmissionTally::default();
            for _ in 0..events {
                driver.emit_event(&mut tally);
                tally.record_event();
            }
            Ok(tally)
        })
        .collect::<Result<Vec<_>, SourceError>>()
        .context("worker failed to start")?;

    let mut total = EmissionTally::default();
    for tally in &tallies {
        total.merge(tally);
    }
    let elapsed = start.elapsed();

    println!("{}", isosource_core::version_string());
    println!("  isocentre radius : {:.3} mm", assembly.radius);
    println!(
        "  polar cosines    : [{:.6}, {:.6}]",
        assembly.polar_start, assembly.polar_stop
    );
    println!("  sources          : {}", sources.len());
    println!("  events           : {}", total.events);
    println!("  primaries        : {}", total.primaries);
    if let Some(mean) = total.mean_energy() {
        println!("  mean energy      : {mean:.4} MeV");
    }
    if let Some(dir) = total.mean_direction() {
        println!("  mean direction   : ({:.4}, {:.4}, {:.4})", dir.x, dir.y, dir.z);
    }
    println!("  wall-clock       : {:.3} s", elapsed.as_secs_f64());

    if let Some(ref path) = options.summary_json {
        let summary = RunSummary {
            seed,
            workers: options.workers,
            sources: sources.len(),
            wall_seconds: elapsed.as_secs_f64(),
            mean_energy: total.mean_energy(),
            tally: total,
        };
        let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "wrote run summary");
    }

    Ok(())
}

fn run_macro(messenger: &mut SourceMessenger, path: &Path) -> Result<()> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open macro {}", path.display()))?;
    let foreign = messenger
        .apply_macro(BufReader::new(file))
        .with_context(|| format!("failed to run macro {}", path.display()))?;
    for line in foreign {
        warn!(%line, "ignoring command outside the source directory");
    }
    Ok(())
}

/// Relative paths inside a config file are taken from the config file's directory.
fn relative_to_config(config_path: &Path, table: PathBuf) -> PathBuf {
    match config_path.parent() {
        Some(dir) if table.is_relative() => dir.join(table),
        _ => table,
    }
}

fn events_for_worker(events: u64, workers: usize, worker: usize) -> u64 {
    let workers = workers as u64;
    let worker = worker as u64;
    events / workers + u64::from(worker < events % workers)
}

fn parse_options() -> Result<CliOptions> {
    let mut opts = CliOptions {
        events: 1000,
        workers: rayon::current_num_threads(),
        seed: None,
        macro_file: None,
        config_json: None,
        sources: None,
        summary_json: None,
    };

    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--events=") {
            opts.events = value.parse().context("invalid --events value")?;
        } else if let Some(value) = arg.strip_prefix("--workers=") {
            opts.workers = value.parse().context("invalid --workers value")?;
        } else if let Some(value) = arg.strip_prefix("--seed=") {
            opts.seed = Some(parse_seed(value).context("invalid --seed value")?);
        } else if let Some(value) = arg.strip_prefix("--macro=") {
            opts.macro_file = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--config-json=") {
            opts.config_json = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--sources=") {
            opts.sources = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--summary-json=") {
            opts.summary_json = Some(PathBuf::from(value));
        } else {
            bail!("unrecognized argument: {arg}");
        }
    }

    if opts.workers == 0 {
        bail!("--workers must be at least 1");
    }
    Ok(opts)
}

fn parse_seed(value: &str) -> Result<u64> {
    let seed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => value.parse()?,
    };
    Ok(seed)
}

mod tracer {
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt().try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_split_covers_total() {
        for (events, workers) in [(0u64, 3usize), (10, 3), (7, 7), (5, 8), (1000, 16)] {
            let total: u64 = (0..workers)
                .map(|w| events_for_worker(events, workers, w))
                .sum();
            assert_eq!(total, events);
        }
    }

    #[test]
    fn seeds_parse_in_hex_and_decimal() {
        assert_eq!(parse_seed("42").unwrap(), 42);
        assert_eq!(parse_seed("0xA11CE").unwrap(), 0xA11CE);
        assert!(parse_seed("0xZZ").is_err());
    }

    #[test]
    fn config_table_paths_follow_the_config_file() {
        let config = Path::new("runs/gamma/config.json");
        assert_eq!(
            relative_to_config(config, PathBuf::from("sources.txt")),
            PathBuf::from("runs/gamma/sources.txt")
        );
        assert_eq!(
            relative_to_config(config, PathBuf::from("/abs/sources.txt")),
            PathBuf::from("/abs/sources.txt")
        );
        assert_eq!(
            relative_to_config(Path::new("config.json"), PathBuf::from("sources.txt")),
            PathBuf::from("sources.txt")
        );
    }
}

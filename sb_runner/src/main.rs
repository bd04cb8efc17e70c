//! Command-line runner for sprint bracket competitions.
//!
//! Loads a competition file (bracket format plus roster) or resumes a
//! snapshot, rides the open heats with random finish orders and prints the
//! classification.

mod config;
mod logging;
mod report;
mod simulate;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Error};
use log::info;
use pico_args::Arguments;
use serde::Deserialize;
use sprint_bracket::{BracketConfig, Competition, CompetitionFormat, LaneRandomizer, Rider, snapshot};

use config::{Overrides, RunnerConfig, SnapshotFormat};

const HELP: &str = "\
Run a sprint, Keirin or eliminator bracket

USAGE:
  sb_runner [OPTIONS]

OPTIONS:
  --format     FILE        Competition file: bracket and riders  [default: env SB_FORMAT]
  --snapshot   FILE        Resume from and save to FILE (.json or binary)  [default: env SB_SNAPSHOT]
  --seed       N           Seed for lane draws and simulated finishes  [default: env SB_SEED or random]

FLAGS:
  --no-simulate            Only propagate and report, ride no heats
  -h, --help               Print help information

ENVIRONMENT:
  SB_FORMAT, SB_SNAPSHOT, SB_SEED, SB_SIMULATE (true/false)
  RUST_LOG                 Log filter  [default: info]
";

/// Bracket format plus the riders taking part.
#[derive(Debug, Deserialize)]
struct CompetitionFile {
    format: CompetitionFormat,
    #[serde(default)]
    config: BracketConfig,
    riders: Vec<Rider>,
}

fn load_file(path: &Path) -> Result<Competition, Error> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: CompetitionFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid competition file {}", path.display()))?;

    let mut competition = file.format.build_with_config(file.config)?;
    for rider in file.riders {
        competition.add_rider(rider)?;
    }
    let seeded = competition.seed_qualifying_times(&[])?;
    info!(
        "Loaded \"{}\" with {} riders, {seeded} seeded",
        competition.name(),
        competition.riders().len()
    );
    Ok(competition)
}

fn load_snapshot(path: &Path) -> Result<Competition, Error> {
    let mut competition = match SnapshotFormat::for_path(path) {
        SnapshotFormat::Json => snapshot::from_json(&std::fs::read_to_string(path)?)?,
        SnapshotFormat::Binary => snapshot::from_bytes(&std::fs::read(path)?)?,
    };
    competition.fix_hanging_starts();
    info!("Resumed \"{}\" from {}", competition.name(), path.display());
    Ok(competition)
}

fn save_snapshot(competition: &Competition, path: &Path) -> Result<(), Error> {
    match SnapshotFormat::for_path(path) {
        SnapshotFormat::Json => std::fs::write(path, snapshot::to_json(competition)?)?,
        SnapshotFormat::Binary => std::fs::write(path, snapshot::to_bytes(competition)?)?,
    }
    info!("Saved snapshot to {}", path.display());
    Ok(())
}

fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        format: pargs.opt_value_from_str::<_, PathBuf>("--format")?,
        snapshot: pargs.opt_value_from_str::<_, PathBuf>("--snapshot")?,
        seed: pargs.opt_value_from_str("--seed")?,
        simulate: pargs.contains("--no-simulate").then_some(false),
    };

    logging::init();

    let config = RunnerConfig::from_env(overrides)?;
    config.validate()?;

    let mut competition = match (config.resume_from(), &config.format) {
        (Some(path), _) => load_snapshot(path)?,
        (None, Some(path)) => load_file(path)?,
        (None, None) => anyhow::bail!("No competition file or snapshot to load"),
    };

    // Log the seed so a run can be replayed
    let seed = config.seed.unwrap_or_else(rand::random);
    info!("Using seed {seed}");
    let mut randomizer = LaneRandomizer::seeded(seed);

    if config.simulate {
        let started = Instant::now();
        let heats = simulate::run_to_completion(&mut competition, &mut randomizer)?;
        logging::log_performance(
            "simulate",
            started.elapsed().as_millis() as u64,
            Some(&format!("{heats} heats")),
        );
        info!("Rode {heats} heats");
    } else {
        competition.propagate()?;
    }

    print!("{}", report::render(&competition));

    if let Some(path) = &config.snapshot {
        save_snapshot(&competition, path)?;
    }

    Ok(())
}

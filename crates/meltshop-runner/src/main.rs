//! Headless meltshop runner.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use meltshop_core::config::PlantConfig;
use meltshop_core::data_loader::{parse_config_json, parse_config_toml};
use meltshop_runner::Simulation;
use meltshop_runner::logging::{self, LogFormat};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the steel plant simulation headless", long_about = None)]
struct Cli {
    /// Plant configuration (.json or .toml). Defaults are used when absent.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Minutes to simulate; overrides the configured simulation time.
    #[arg(short, long)]
    time: Option<f64>,

    /// Random seed; overrides the configured seed.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the summary here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the full analytics report instead of the summary.
    #[arg(long)]
    report: bool,

    #[arg(long, value_enum, default_value_t = Format::Pretty)]
    log_format: Format,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

impl From<Format> for LogFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Pretty => LogFormat::Pretty,
            Format::Json => LogFormat::Json,
        }
    }
}

fn load_config(path: &Path) -> Result<PlantConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read config {path:?}"))?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_config_json(&text)?,
        Some("toml") => parse_config_toml(&text)?,
        _ => bail!("config {path:?} must end in .json or .toml"),
    };
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format.into());

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PlantConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    let duration = cli.time.unwrap_or(config.simulation_time);

    let mut sim = Simulation::new(config).context("invalid plant configuration")?;
    let summary = sim.run_headless(duration);

    let text = if cli.report {
        serde_json::to_string_pretty(&sim.generate_analytics_report())?
    } else {
        summary.to_json()?
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("failed to write {path:?}"))?;
            tracing::info!(component = "runner", path = %path.display(), "summary written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

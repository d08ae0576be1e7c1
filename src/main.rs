//! # Butterfly-access CLI
//!
//! Command-line interface for the butterfly-access library.
//! Scores healthcare accessibility from facility, population and OD tables.

use std::path::PathBuf;

use anyhow::{bail, Context};
use butterfly_access::io::{load_inputs, CsvScorePublisher, FacilitySummaryPublisher, JoinedCsvPublisher};
use butterfly_access::{AccessConfig, Mode, OverwriteBehavior, Pipeline, ResultPublisher, RunOptions};
use clap::Parser;
use log::error;

mod cli;

/// Command-line interface for butterfly-access
#[derive(Parser, Debug)]
#[command(name = "butterfly-access")]
#[command(about = "Healthcare accessibility scoring with 2SFCA and Huff-model decay")]
#[command(long_about = "Scores every population unit by the supply it can reach:
  butterfly-access --facilities fac.csv --population pop.csv --od od.csv -o scores.csv
  butterfly-access --config access.toml
  butterfly-access --config access.toml --mode decay -b 1.5 -b 2.0

Flags override values from the config file.

File Overwrite Behavior:
  By default, existing output files are never overwritten
  --force                          # Overwrite existing outputs
  --no-clobber                     # Never overwrite, fail if file exists")]
#[command(version = env!("BUTTERFLY_VERSION"))]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Facilities table (id, capacity)
    #[arg(long)]
    facilities: Option<PathBuf>,

    /// Population table (id, population)
    #[arg(long)]
    population: Option<PathBuf>,

    /// OD travel-time table
    #[arg(long)]
    od: Option<PathBuf>,

    /// Output scores file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scoring method
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Distance-decay exponent; repeat to score several exponents
    #[arg(short = 'b', long = "decay-exponent")]
    decay_exponents: Vec<f64>,

    /// Drop OD rows with a travel time above this value
    #[arg(long)]
    max_travel_time: Option<f64>,

    /// Attribute table to join the scores onto
    #[arg(long)]
    join: Option<PathBuf>,

    /// Key column of the join table
    #[arg(long)]
    join_key: Option<String>,

    /// Also write per-facility statistics to this file
    #[arg(long)]
    facility_summary: Option<PathBuf>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Enable dry-run mode (print the resolved configuration and exit)
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Overwrite existing output files
    #[arg(short, long)]
    force: bool,

    /// Never overwrite existing files (fail if destination exists)
    #[arg(long)]
    no_clobber: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    if cli.verbose {
        eprintln!("🦋 Butterfly-access v{} starting...", env!("BUTTERFLY_VERSION"));
    }

    // Validate conflicting flags
    if cli.force && cli.no_clobber {
        bail!("--force and --no-clobber cannot be used together");
    }

    let config = resolve_config(&cli)?;
    config.validate()?;
    let methods = config.methods()?;

    if cli.dry_run {
        let labels: Vec<String> = methods.iter().map(|m| m.label()).collect();
        eprintln!("🔍 [DRY RUN] Would compute: {}", labels.join(", "));
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    configure_threads(cli.threads)?;

    let inputs = load_inputs(&config)?;

    let progress = cli::ProgressManager::new(
        methods.len(),
        &format!("🧮 Scoring {} OD edges ({} run(s))", inputs.store.len(), methods.len()),
    );
    let options = RunOptions {
        progress: Some(progress.callback()),
        ..Default::default()
    };
    let pipeline = Pipeline::new(&inputs.store, &inputs.supply, &inputs.demand).with_options(options);

    let result = pipeline.run_all(&methods).and_then(|outputs| {
        let mut publishers = build_publishers(&config)?;
        pipeline.publish(&outputs, &mut publishers)?;
        Ok(outputs)
    });
    let outputs = match result {
        Ok(outputs) => outputs,
        Err(e) => {
            progress.abandon();
            return Err(e.into());
        }
    };

    for output in &outputs {
        eprintln!("📊 {}: {} origins scored", output.scores.label, output.scores.len());
    }
    if let Some(path) = &config.output.scores {
        eprintln!("📁 Saved to: {}", path.display());
    }

    Ok(())
}

/// Layer command-line flags over the config file (or defaults)
fn resolve_config(cli: &Cli) -> anyhow::Result<AccessConfig> {
    let mut config = match &cli.config {
        Some(path) => AccessConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AccessConfig::default(),
    };

    if let Some(path) = &cli.facilities {
        config.inputs.facilities = Some(path.clone());
    }
    if let Some(path) = &cli.population {
        config.inputs.population = Some(path.clone());
    }
    if let Some(path) = &cli.od {
        config.inputs.od_matrix = Some(path.clone());
    }
    if let Some(path) = &cli.join {
        config.inputs.join = Some(path.clone());
    }
    if let Some(path) = &cli.output {
        config.output.scores = Some(path.clone());
    }
    if let Some(path) = &cli.facility_summary {
        config.output.facility_summary = Some(path.clone());
    }
    if let Some(key) = &cli.join_key {
        config.output.join_key = key.clone();
    }
    if let Some(limit) = cli.max_travel_time {
        config.run.max_travel_time = Some(limit);
    }

    if !cli.decay_exponents.is_empty() {
        config.run.decay_exponents = cli.decay_exponents.clone();
        // Exponents on the command line imply the decay method
        if cli.mode.is_none() {
            config.run.mode = Mode::Decay;
        }
    }
    if let Some(mode) = cli.mode {
        config.run.mode = mode;
    }

    // Determine overwrite behavior from CLI flags
    if cli.force {
        config.output.overwrite = OverwriteBehavior::Force;
    } else if cli.no_clobber {
        config.output.overwrite = OverwriteBehavior::NeverOverwrite;
    }

    Ok(config)
}

/// Publishers for the configured outputs, scores first
fn build_publishers(config: &AccessConfig) -> butterfly_access::Result<Vec<Box<dyn ResultPublisher>>> {
    let overwrite = config.output.overwrite;
    let scores = config
        .output
        .scores
        .clone()
        .ok_or_else(|| butterfly_access::Error::Config("output.scores is required".to_string()))?;

    let mut publishers: Vec<Box<dyn ResultPublisher>> = Vec::new();
    match &config.inputs.join {
        Some(join) => publishers.push(Box::new(JoinedCsvPublisher::new(
            join,
            config.output.join_key.clone(),
            scores,
            overwrite,
        ))),
        None => publishers.push(Box::new(CsvScorePublisher::new(scores, overwrite))),
    }
    if let Some(path) = &config.output.facility_summary {
        publishers.push(Box::new(FacilitySummaryPublisher::new(path, overwrite)));
    }
    Ok(publishers)
}

/// Size the global rayon pool
fn configure_threads(threads: Option<usize>) -> anyhow::Result<()> {
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to configure worker threads")?;
    log::debug!("Using {threads} worker threads");
    Ok(())
}

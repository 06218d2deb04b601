//! Pyramid Outcome Solver
//!
//! Classifies positions of the stacked-pyramid game, persisting every result
//! to a JSON outcome cache between runs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pyramid_core::{Outcome, Position, MAX_LAYERS};
use pyramid_solver::{default_cache_path, Classifier, OutcomeCache};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Classify the empty pyramid, solving every position reachable from it
    Solve(#[clap(flatten)] SolveArg),
    /// Classify a single position given by its fingerprint
    Classify(#[clap(flatten)] ClassifyArg),
    /// Show the outcome distribution of a cache file
    Stats(#[clap(flatten)] StatsArg),
}

#[derive(Debug, Clone, clap::Args)]
struct SolveArg {
    /// Number of layers in the pyramid
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=MAX_LAYERS as i64))]
    layers: u8,
    /// Cache file path (default: data/outcomes-n{layers}.json)
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Seconds between progress lines (0 disables them)
    #[arg(long, default_value_t = 5)]
    log_interval: u64,
    /// Do not write the cache back after solving
    #[arg(long)]
    no_save: bool,
}

#[derive(Debug, Clone, clap::Args)]
struct ClassifyArg {
    /// Position fingerprint, e.g. E-EEEE-REEEEEEEE
    fingerprint: String,
    /// Cache file path (default: data/outcomes-n{layers}.json)
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Do not write the cache back after classifying
    #[arg(long)]
    no_save: bool,
}

#[derive(Debug, Clone, clap::Args)]
struct StatsArg {
    /// Number of layers in the pyramid
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=MAX_LAYERS as i64))]
    layers: u8,
    /// Cache file path (default: data/outcomes-n{layers}.json)
    #[arg(long)]
    cache: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Solve(arg) => run_solve(&arg),
        Mode::Classify(arg) => run_classify(&arg),
        Mode::Stats(arg) => run_stats(&arg),
    }
}

fn load_cache(path: &Path, layers: u8) -> anyhow::Result<OutcomeCache> {
    println!("Loading cache from {}...", path.display());
    let start = Instant::now();
    let cache = OutcomeCache::load(path, layers)
        .with_context(|| format!("failed to load outcome cache {}", path.display()))?;
    println!(
        "Loaded {} outcomes in {:.2}s\n",
        cache.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(cache)
}

fn save_cache(cache: &OutcomeCache, path: &Path) -> anyhow::Result<()> {
    println!("\nSaving cache...");
    let start = Instant::now();
    let count = cache
        .save(path)
        .with_context(|| format!("failed to save outcome cache {}", path.display()))?;
    println!(
        "Saved {} outcomes in {:.2}s",
        count,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn describe(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::LeftWins => "Left wins whoever moves first",
        Outcome::RightWins => "Right wins whoever moves first",
        Outcome::PreviousWins => "the player who just moved wins",
        Outcome::NextWins => "the player to move wins",
    }
}

fn run_solve(arg: &SolveArg) -> anyhow::Result<()> {
    let path = arg
        .cache
        .clone()
        .unwrap_or_else(|| default_cache_path(arg.layers));

    println!("Pyramid Outcome Solver");
    println!("======================");
    println!("Layers: {}", arg.layers);
    println!("Log interval: {}s\n", arg.log_interval);

    let mut cache = load_cache(&path, arg.layers)?;
    let position = Position::new(arg.layers)?;

    println!("Classifying {}...\n", position.fingerprint());
    let start = Instant::now();
    let mut classifier = Classifier::new(&mut cache).with_log_interval(arg.log_interval);
    let outcome = classifier.classify(&position);
    let elapsed = start.elapsed();

    println!("\n======================");
    println!("Solve complete!");
    println!("======================");
    println!("Result: {outcome} ({})", describe(outcome));
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Cache size: {}", classifier.cache().len());
    println!();
    classifier.stats().print_summary();

    if !arg.no_save {
        save_cache(&cache, &path)?;
    }
    Ok(())
}

fn run_classify(arg: &ClassifyArg) -> anyhow::Result<()> {
    let position = Position::from_fingerprint(&arg.fingerprint)
        .with_context(|| format!("invalid fingerprint {:?}", arg.fingerprint))?;
    let layers = position.layers();
    let path = arg
        .cache
        .clone()
        .unwrap_or_else(|| default_cache_path(layers));

    let mut cache = load_cache(&path, layers)?;
    let before = cache.len();

    let mut classifier = Classifier::new(&mut cache);
    let outcome = classifier.classify(&position);
    println!("{}: {outcome} ({})", position.fingerprint(), describe(outcome));
    println!(
        "Evaluated {} new positions, cache hits {}",
        classifier.stats().positions_evaluated,
        classifier.stats().cache_hits
    );

    if !arg.no_save && cache.len() > before {
        save_cache(&cache, &path)?;
    }
    Ok(())
}

fn run_stats(arg: &StatsArg) -> anyhow::Result<()> {
    let path = arg
        .cache
        .clone()
        .unwrap_or_else(|| default_cache_path(arg.layers));
    if !path.exists() {
        bail!("no outcome cache at {}", path.display());
    }

    let cache = load_cache(&path, arg.layers)?;
    let total = cache.len().max(1) as f64;
    println!("Outcomes for {} layers ({} entries):", arg.layers, cache.len());
    for (outcome, count) in cache.distribution() {
        println!(
            "  {outcome}: {count:>10} ({:5.1}%)  {}",
            100.0 * count as f64 / total,
            describe(outcome)
        );
    }

    let root = Position::new(arg.layers)?;
    match cache.get(&root.fingerprint()) {
        Some(outcome) => println!("\nEmpty pyramid: {outcome} ({})", describe(outcome)),
        None => println!("\nEmpty pyramid: not solved yet"),
    }
    Ok(())
}

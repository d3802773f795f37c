//! Blueprint training binary.
//!
//! Usage:
//!   cargo run --release --bin train_blueprint -- [OPTIONS]
//!
//! Trains an outcome-sampling MCCFR blueprint in chunks, checkpointing after
//! every chunk, and publishes the average strategy as a blueprint file.
//! `--resume` continues from the checkpoint with the cumulative time budget;
//! `--instances`/`--instance` give independent runs disjoint iteration ranges.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blueprint_resolver::abstraction::StrengthBucketer;
use blueprint_resolver::cards::RankEvaluator;
use blueprint_resolver::cfr::{IterationRange, OutcomeSampler, Trainer, TrainingBudget};
use blueprint_resolver::config::SolverSettings;

#[derive(Parser, Debug)]
#[command(name = "train_blueprint")]
#[command(about = "Train an MCCFR blueprint with checkpointing and resume")]
struct Args {
    /// Settings JSON file (every section optional)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Total iterations across all instances
    #[arg(short, long, default_value_t = 100_000)]
    iterations: u64,
    /// Cumulative wall-clock budget in seconds, across resumes
    #[arg(long)]
    max_seconds: Option<f64>,
    /// Iterations per chunk (a checkpoint is written after each)
    #[arg(long, default_value_t = 10_000)]
    chunk: u64,
    /// Checkpoint file
    #[arg(long, default_value = "checkpoint.json")]
    checkpoint: PathBuf,
    /// Continue from the checkpoint file
    #[arg(long)]
    resume: bool,
    /// Blueprint output file
    #[arg(short, long, default_value = "blueprint.json")]
    output: PathBuf,
    /// Random seed (overrides the settings file)
    #[arg(short, long)]
    seed: Option<u64>,
    /// Players at the table (overrides the settings file)
    #[arg(long)]
    players: Option<usize>,
    /// Starting stack in big blinds (overrides the settings file)
    #[arg(long)]
    stack: Option<f64>,
    /// Number of independent training instances
    #[arg(long, default_value_t = 1)]
    instances: usize,
    /// Index of this instance, in 0..instances
    #[arg(long, default_value_t = 0)]
    instance: usize,
    /// Skip the per-chunk convergence indicator
    #[arg(long)]
    no_convergence: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => SolverSettings::from_json_file(path)?,
        None => SolverSettings::default(),
    };
    if let Some(seed) = args.seed {
        settings.training = settings.training.with_seed(seed);
    }
    if let Some(players) = args.players {
        settings.table = settings.table.with_players(players);
    }
    if let Some(stack) = args.stack {
        let big_blind = settings.table.big_blind;
        settings.table = settings.table.with_stack(stack * big_blind);
    }
    settings.validate()?;

    let ranges = IterationRange::split(args.iterations, args.instances);
    let range = ranges.get(args.instance).copied().ok_or_else(|| {
        format!(
            "instance {} out of range for {} instances",
            args.instance, args.instances
        )
    })?;

    println!("=================================================");
    println!("  Blueprint Training");
    println!("=================================================");
    println!();
    println!("Players: {}", settings.table.num_players);
    println!("Stack: {}bb", settings.table.starting_stack / settings.table.big_blind);
    println!(
        "Iterations: {}..{} (instance {} of {})",
        range.start, range.end, args.instance, args.instances
    );
    if let Some(seconds) = args.max_seconds {
        println!("Time budget: {seconds:.0}s");
    }
    if let Some(seed) = settings.training.seed {
        println!("Seed: {seed}");
    }
    println!("Checkpoint: {}", args.checkpoint.display());
    println!("Output: {}", args.output.display());
    println!();

    let bucketer = Arc::new(StrengthBucketer::new(&settings.bucketing));
    let sampler = OutcomeSampler::new(
        settings.table.clone(),
        settings.abstraction.clone(),
        bucketer,
        Arc::new(RankEvaluator),
        settings.training.clone(),
    )?;

    let mut budget = TrainingBudget::iterations(range.end);
    if let Some(seconds) = args.max_seconds {
        budget = budget.with_max_seconds(seconds);
    }

    let trainer = if args.resume {
        Trainer::resume(sampler, &args.checkpoint, budget)?
    } else {
        Trainer::for_range_with_budget(sampler, range, budget).with_checkpoint(&args.checkpoint)
    };
    let mut trainer = trainer.with_convergence(!args.no_convergence);

    let start = trainer.sampler().iteration();
    let progress = ProgressBar::new(range.end.saturating_sub(start));
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let stats = trainer
        .run(args.chunk, |stats| {
            progress.set_position(stats.iterations.saturating_sub(start));
            let indicator = stats
                .convergence
                .map_or_else(|| "-".to_string(), |ci| format!("{ci:.2}"));
            progress.set_message(format!(
                "CI {indicator} | {} info sets | {:.0} it/s",
                stats.info_sets, stats.iterations_per_second
            ));
        })?
        .clone();
    progress.finish();

    println!();
    println!("Training complete!");
    println!("Iterations: {}", stats.iterations);
    println!("Info sets: {}", stats.info_sets);
    println!("Pruned branches: {}", stats.pruned_branches);
    println!("Total time: {:.2}s", stats.elapsed_seconds);
    if let Some(ci) = stats.convergence {
        println!("Final CI: {ci:.2}");
    }
    println!();

    let blueprint = trainer.blueprint();
    blueprint.save(&args.output)?;
    info!(
        rows = blueprint.len(),
        path = %args.output.display(),
        "blueprint published"
    );

    println!("=== Sample Strategies ===");
    println!();
    for key in blueprint.keys().into_iter().take(5) {
        println!("Info set: {key}");
        if let Some(row) = blueprint.get(key) {
            for (action, p) in row {
                if *p > 0.001 {
                    println!("  {action}: {:.1}%", p * 100.0);
                }
            }
        }
        println!();
    }

    println!("Done!");
    Ok(())
}

//! Real-time resolve of a single spot.
//!
//! Usage:
//!   cargo run --release --bin resolve_spot -- --hand AsKs --board 2c7d9h \
//!       --history C,C/B75,B100 [OPTIONS]
//!
//! Replays the abstract history, resolves the acting player's decision
//! against the blueprint, and prints the strategy together with the concrete
//! table action the sampled abstract action translates to.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use blueprint_resolver::abstraction::{AbstractAction, HandBucketer, StrengthBucketer};
use blueprint_resolver::cards::{parse_cards, HoleCards, RankEvaluator};
use blueprint_resolver::cfr::BlueprintPolicy;
use blueprint_resolver::config::SolverSettings;
use blueprint_resolver::game::HandState;
use blueprint_resolver::resolve::SubgameResolver;
use blueprint_resolver::translate::{ActionTranslator, TableSpot};

#[derive(Parser, Debug)]
#[command(name = "resolve_spot")]
#[command(about = "Resolve one decision against a trained blueprint")]
struct Args {
    /// Settings JSON file (every section optional)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Blueprint file (uniform priors when omitted)
    #[arg(short, long)]
    blueprint: Option<PathBuf>,
    /// Hole cards of the acting player, e.g. AsKs
    #[arg(long)]
    hand: String,
    /// Board cards, e.g. 2c7d9h
    #[arg(long, default_value = "")]
    board: String,
    /// Abstract history: streets separated by '/', actions by ','
    #[arg(long, default_value = "")]
    history: String,
    /// Opponent range as weighted combos, e.g. QhQd:1,AsQs:0.5
    #[arg(long)]
    range: Option<String>,
    /// Time limit in milliseconds (overrides the settings file)
    #[arg(long)]
    time_ms: Option<u64>,
    /// Rebuild the subgame from the start of the betting round
    #[arg(long)]
    round_start: bool,
    /// Random seed for the solve and the action draw
    #[arg(short, long)]
    seed: Option<u64>,
    /// Worker threads for parallel solves (default: auto)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
}

fn parse_history(history: &str) -> Result<Vec<Vec<AbstractAction>>, Box<dyn Error>> {
    if history.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut streets = Vec::new();
    for street in history.split('/') {
        let mut actions = Vec::new();
        for token in street.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            actions.push(token.parse::<AbstractAction>()?);
        }
        streets.push(actions);
    }
    Ok(streets)
}

fn parse_range(range: &str) -> Result<Vec<(HoleCards, f64)>, Box<dyn Error>> {
    let mut combos = Vec::new();
    for entry in range.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (hand, weight) = entry.split_once(':').unwrap_or((entry, "1"));
        combos.push((hand.parse::<HoleCards>()?, weight.parse::<f64>()?));
    }
    Ok(combos)
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let args = Args::parse();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()?;
    }

    let mut settings = match &args.config {
        Some(path) => SolverSettings::from_json_file(path)?,
        None => SolverSettings::default(),
    };
    if let Some(ms) = args.time_ms {
        settings.resolver = settings.resolver.with_time_limit_ms(ms);
    }
    if args.round_start {
        settings.resolver = settings.resolver.with_round_start(true);
    }
    if let Some(seed) = args.seed {
        settings.resolver = settings.resolver.with_seed(seed);
    }
    settings.validate()?;

    let bucketer = Arc::new(StrengthBucketer::new(&settings.bucketing));
    let blueprint = match &args.blueprint {
        Some(path) => BlueprintPolicy::load(path, &bucketer.fingerprint())?,
        None => BlueprintPolicy::default(),
    };
    println!("Blueprint rows: {}", blueprint.len());

    let hand: HoleCards = args.hand.parse()?;
    let board = parse_cards(&args.board)?;
    let history = parse_history(&args.history)?;
    let state = HandState::replay(&settings.table, &settings.abstraction, &history, &board)?;
    let hero = state
        .current_player()
        .ok_or("history does not end at a decision")?;

    let resolver = SubgameResolver::new(
        settings.resolver.clone(),
        settings.abstraction.clone(),
        bucketer,
        Arc::new(RankEvaluator),
        Arc::new(blueprint),
    )?;
    let mut subgame = resolver.subgame(state.clone(), hero, hand)?;
    if let Some(range) = &args.range {
        subgame = subgame.with_opponent_range(parse_range(range)?);
    }

    println!("Spot: {state:?}");
    println!("Hero: seat {hero} ({}) holding {hand}", state.position(hero));
    println!();

    let strategy = resolver.resolve_or_blueprint(&subgame);
    println!("Info set: {}", strategy.key);
    println!(
        "Source: {:?} | {} iterations over {} solves | {:.1}ms",
        strategy.source, strategy.iterations, strategy.solves, strategy.elapsed_ms
    );
    if strategy.leaf_estimates + strategy.leaf_rejections > 0 {
        println!(
            "Leaf estimates: {} accepted, {} rejected",
            strategy.leaf_estimates, strategy.leaf_rejections
        );
    }
    for (action, p) in strategy.actions.iter().zip(&strategy.probabilities) {
        println!("  {action}: {:.1}%", p * 100.0);
    }
    println!();

    let mut rng = match args.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let Some(chosen) = strategy.sample(&mut rng) else {
        println!("No legal action.");
        return Ok(());
    };

    let translator =
        ActionTranslator::new(settings.abstraction.clone(), settings.translator.clone())?;
    let spot = TableSpot {
        pot: state.pot(),
        stack: state.stack(hero),
        current_bet: state.current_bet(),
        player_bet: state.street_bet(hero),
        min_raise: state.min_raise(),
        street: state.street(),
        in_position: state.is_in_position(hero),
        raises: state.raises(),
    };
    let concrete = translator.to_client(chosen, &spot);
    println!("Sampled: {chosen}");
    println!("Table action: {concrete}");

    let check = translator.round_trip(&concrete, &spot)?;
    println!(
        "Round trip: {} -> {} (legal: {}, type changed: {})",
        check.abstract_action, check.output, check.legal, check.type_changed
    );

    Ok(())
}

//! Benchmarks for blueprint training and real-time resolving.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use blueprint_resolver::abstraction::{AbstractAction, ActionAbstraction, StrengthBucketer};
use blueprint_resolver::cards::{parse_cards, HoleCards, RankEvaluator};
use blueprint_resolver::cfr::{CFRConfig, OutcomeSampler, RegretTracker};
use blueprint_resolver::game::{HandState, TableRules};
use blueprint_resolver::resolve::{ResolverConfig, SubgameResolver};

fn sampler(config: CFRConfig) -> OutcomeSampler {
    OutcomeSampler::new(
        TableRules::heads_up(100.0),
        ActionAbstraction::default(),
        Arc::new(StrengthBucketer::default()),
        Arc::new(RankEvaluator),
        config,
    )
    .unwrap()
}

fn sampler_iteration_benchmark(c: &mut Criterion) {
    let mut solver = sampler(CFRConfig::default().with_seed(42));

    c.bench_function("heads_up_single_iteration", |b| {
        b.iter(|| {
            solver.run_iteration().unwrap();
            black_box(solver.iteration())
        })
    });
}

fn sampler_1000_iterations_benchmark(c: &mut Criterion) {
    c.bench_function("heads_up_1000_iterations", |b| {
        b.iter(|| {
            let mut solver = sampler(CFRConfig::default().with_seed(42));
            solver.train(black_box(1000)).unwrap().info_sets
        })
    });
}

fn filled_tracker(rows: usize) -> RegretTracker {
    let actions = [
        AbstractAction::Fold,
        AbstractAction::CheckCall,
        AbstractAction::bet(0.75),
        AbstractAction::AllIn,
    ];
    let mut tracker = RegretTracker::with_capacity(rows);
    for i in 0..rows {
        let key = format!("v2|{}|P|C,B75|0|b{i}", i % 4);
        tracker.update_regrets(&key, &actions, &[1.0, -2.0, 3.0, 0.5], 1.0);
        tracker.add_strategy(&key, &actions, &[0.1, 0.2, 0.3, 0.4], 1.0);
    }
    tracker
}

fn discount_benchmark(c: &mut Criterion) {
    let tracker = filled_tracker(50_000);
    let mut group = c.benchmark_group("discount_50k_rows");

    group.bench_function("lazy", |b| {
        b.iter_batched(
            || tracker.clone(),
            |mut t| {
                t.discount(0.5, 0.5).unwrap();
                t
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("eager", |b| {
        b.iter_batched(
            || tracker.clone(),
            |mut t| {
                t.discount(0.5, 0.5).unwrap();
                t.flush_discounts();
                t
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn resolve_latency_benchmark(c: &mut Criterion) {
    let rules = TableRules::heads_up(100.0);
    let abstraction = ActionAbstraction::default();

    let mut trainer = sampler(CFRConfig::fast());
    trainer.train(2_000).unwrap();
    let blueprint = Arc::new(trainer.blueprint());

    let state = HandState::replay(
        &rules,
        &abstraction,
        &[
            vec![AbstractAction::CheckCall, AbstractAction::CheckCall],
            vec![AbstractAction::bet(0.75)],
        ],
        &parse_cards("2c7d9h").unwrap(),
    )
    .unwrap();
    let hero = state.current_player().unwrap();
    let hand: HoleCards = "AsKs".parse().unwrap();

    let config = ResolverConfig::default()
        .with_iterations(200, 200)
        .with_time_limit_ms(1_000)
        .with_seed(7);
    let resolver = SubgameResolver::new(
        config,
        abstraction,
        Arc::new(StrengthBucketer::default()),
        Arc::new(RankEvaluator),
        blueprint,
    )
    .unwrap();
    let subgame = resolver.subgame(state, hero, hand).unwrap();

    c.bench_function("resolve_flop_200_iterations", |b| {
        b.iter(|| black_box(resolver.resolve(&subgame).unwrap().probabilities))
    });
}

criterion_group!(
    benches,
    sampler_iteration_benchmark,
    sampler_1000_iterations_benchmark,
    discount_benchmark,
    resolve_latency_benchmark
);
criterion_main!(benches);

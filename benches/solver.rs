//! Benchmarks for the solvability search and dealing.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use shanghai::clock::ManualClock;
use shanghai::config::GameConfig;
use shanghai::game::{Game, GameOptions};
use shanghai::layout::{HARD, TURTLE};
use shanghai::solver::{self, SolverBudget};
use shanghai::tiles;
use shanghai::topology::Topology;

fn options() -> GameOptions {
    GameOptions {
        config: GameConfig::deterministic(),
        clock: Arc::new(ManualClock::new()),
        ..GameOptions::default()
    }
}

/// Benchmark one solver run over a seeded turtle deal.
fn bench_solve_turtle(c: &mut Criterion) {
    let topology = Topology::new(TURTLE.layout());
    let tiles = tiles::deal(&topology.layout().positions, Some("bench"));
    let empty = topology.empty_mask();
    let budget = SolverBudget::steps(200_000);

    c.bench_function("solve_turtle", |b| {
        b.iter(|| solver::solve(&topology, black_box(&tiles), &empty, budget))
    });
}

/// Benchmark listing free tiles on a full board.
fn bench_free_slots(c: &mut Criterion) {
    let topology = Topology::new(HARD.layout());
    let empty = topology.empty_mask();

    c.bench_function("free_slots_hard", |b| {
        b.iter(|| topology.free_slots(black_box(&empty)).count())
    });
}

/// Benchmark assigning kinds to the largest layout.
fn bench_deal(c: &mut Criterion) {
    let positions = HARD.positions();

    c.bench_function("deal_hard", |b| {
        b.iter(|| tiles::deal(black_box(&positions), Some("bench")))
    });
}

/// Benchmark a full verified deal, retries included.
fn bench_new_game(c: &mut Criterion) {
    let mut group = c.benchmark_group("new_game");
    group.sample_size(10);
    group.bench_function("turtle_seeded", |b| {
        b.iter(|| Game::with_options(TURTLE.layout(), black_box(Some("bench")), options()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_solve_turtle,
    bench_free_slots,
    bench_deal,
    bench_new_game
);
criterion_main!(benches);

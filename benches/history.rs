//! Tick history and simulation step benchmarks.
//!
//! Run with: `cargo bench --bench history`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lane_clash::config::SimConfig;
use lane_clash::core::history::TickHistory;
use lane_clash::core::tick::SimulationTick;
use lane_clash::game::clock::ConnectionId;
use lane_clash::game::simulation::Simulation;
use lane_clash::game::state::TeamType;

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_history");
    for window in [16u32, 64, 256] {
        group.bench_with_input(BenchmarkId::new("record", window), &window, |b, &window| {
            b.iter(|| {
                let mut history = TickHistory::new(window);
                for tick in 1..=1_000 {
                    history.record(SimulationTick::new(tick), tick).ok();
                }
                black_box(history.len())
            });
        });

        let mut history = TickHistory::new(window);
        for tick in (1..=window * 2).step_by(3) {
            history.record(SimulationTick::new(tick), tick).ok();
        }
        group.bench_with_input(BenchmarkId::new("lookup", window), &history, |b, history| {
            b.iter(|| {
                let mut found = 0u32;
                for tick in window..window * 2 {
                    found += history.lookup(SimulationTick::new(tick)).copied().unwrap_or(0);
                }
                black_box(found)
            });
        });
    }
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("server_advance_600_ticks", |b| {
        b.iter(|| {
            let mut server = Simulation::server(SimConfig::default()).unwrap();
            server.request_entry(ConnectionId(1), TeamType::Blue).unwrap();
            server.request_entry(ConnectionId(2), TeamType::Red).unwrap();
            for _ in 0..600 {
                server.advance();
            }
            black_box(server.state_hash())
        });
    });

    c.bench_function("client_rollback_8_ticks", |b| {
        let mut server = Simulation::server(SimConfig::default()).unwrap();
        server.request_entry(ConnectionId(1), TeamType::Blue).unwrap();
        server.request_entry(ConnectionId(2), TeamType::Red).unwrap();
        for _ in 0..300 {
            server.advance();
        }
        let confirmed = server.snapshot();

        b.iter(|| {
            let mut client = Simulation::client(SimConfig::default(), ConnectionId(1), &confirmed).unwrap();
            for _ in 0..9 {
                client.advance();
            }
            let mut ahead = Simulation::client(SimConfig::default(), ConnectionId(1), &confirmed).unwrap();
            ahead.advance();
            black_box(client.apply_snapshot(&ahead.snapshot()).len())
        });
    });
}

criterion_group!(benches, bench_history, bench_step);
criterion_main!(benches);

//! Scalability benchmarks for the AI core schedulers
//!
//! Sweeps agent counts to verify the per-tick cost of the crowd, LOD and
//! FSM passes stays bounded as the population grows.
//!
//! Run with: cargo bench --bench scalability

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use suspense_ai_core::ai::crowd::CrowdCoordinator;
use suspense_ai_core::ai::detection::DetectionCache;
use suspense_ai_core::ai::scheduler::FsmScheduler;
use suspense_ai_core::ai::significance::SignificanceManager;
use suspense_ai_core::ai::spatial::SpatialHashGrid;
use suspense_ai_core::ai::AiContext;
use suspense_ai_core::util::vec3::Vec3;
use suspense_ai_core::ai::fsm::FsmInstance;
use suspense_ai_core::world::agent::{AgentId, EnemyAgent};
use suspense_ai_core::world::{PlayerPawn, World};

/// Create a world with `count` agents randomly distributed in a disc
fn world_with_agents(count: usize) -> (World, Vec<AgentId>) {
    let mut world = World::with_flat_ground();
    world.players.push(PlayerPawn::at(Vec3::ZERO));
    let mut rng = rand::thread_rng();

    let ids = (0..count)
        .map(|_| {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = rng.gen_range(500.0..18_000.0);
            let position = Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0);
            world.agents.spawn(EnemyAgent::new(position))
        })
        .collect();
    (world, ids)
}

fn bench_spatial_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_grid");
    for count in [100usize, 500, 2000] {
        let (world, ids) = world_with_agents(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("rebuild_and_query", count),
            &count,
            |b, _| {
                let mut grid = SpatialHashGrid::default();
                b.iter(|| {
                    grid.clear();
                    for &id in &ids {
                        let position = world.agents.get(id).unwrap().position;
                        grid.add_agent(position, id);
                    }
                    let mut found = 0usize;
                    for &id in &ids {
                        let position = world.agents.get(id).unwrap().position;
                        found += grid.cell_agents(position).len();
                    }
                    black_box(found)
                });
            },
        );
    }
    group.finish();
}

fn bench_crowd_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("crowd_tick");
    for count in [100usize, 500, 2000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("update", count), &count, |b, &count| {
            let (mut world, ids) = world_with_agents(count);
            let mut crowd = CrowdCoordinator::new();
            let mut rng = rand::thread_rng();
            for &id in &ids {
                crowd.register_agent(id);
                let target = Vec3::new(
                    rng.gen_range(-10_000.0..10_000.0),
                    rng.gen_range(-10_000.0..10_000.0),
                    0.0,
                );
                crowd.request_agent_move(id, target);
            }
            // Drain the request backlog so the steady state is measured
            for _ in 0..(count / 10 + 1) {
                crowd.crowd_update_tick(&mut world, 0.016);
            }
            b.iter(|| {
                world.advance_clock(0.016);
                crowd.crowd_update_tick(&mut world, 0.016);
            });
        });
    }
    group.finish();
}

fn bench_significance(c: &mut Criterion) {
    let mut group = c.benchmark_group("significance");
    for count in [100usize, 2000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("batch", count), &count, |b, &count| {
            let (mut world, ids) = world_with_agents(count);
            let mut manager = SignificanceManager::new();
            for &id in &ids {
                manager.register_agent(id);
            }
            b.iter(|| {
                // Each call crosses the accumulator threshold and runs a
                // full 30-agent batch
                manager.tick(&mut world, 0.25);
            });
        });
    }
    group.finish();
}

fn bench_fsm_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("fsm_scheduler");
    group.measurement_time(Duration::from_secs(8));
    for count in [100usize, 500] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("global_tick", count), &count, |b, &count| {
            let (mut world, ids) = world_with_agents(count);
            for &id in &ids {
                if let Some(agent) = world.agents.get_mut(id) {
                    agent.fsm = Some(FsmInstance::standard());
                }
            }
            let mut crowd = CrowdCoordinator::new();
            let mut detection = DetectionCache::new();
            let mut scheduler = FsmScheduler::new();
            for &id in &ids {
                scheduler.register_fsm(id);
            }
            b.iter(|| {
                world.advance_clock(0.016);
                let mut ctx = AiContext {
                    world: &mut world,
                    crowd: &mut crowd,
                    detection: &mut detection,
                };
                scheduler.global_tick(&mut ctx, 0.016);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_spatial_grid,
    bench_crowd_tick,
    bench_significance,
    bench_fsm_scheduler
);
criterion_main!(benches);

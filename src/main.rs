//! Headless simulation demo
//!
//! Spawns a population of enemy agents on a flat test level with a few
//! obstacles and nav holes, drives one scripted player through it, and
//! runs the three schedulers at a fixed tick rate while reporting health
//! once a second.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use hashbrown::HashMap;
use rand::Rng;
use tracing::info;

use suspense_ai_core::ai::crowd::CrowdCoordinator;
use suspense_ai_core::ai::detection::DetectionCache;
use suspense_ai_core::ai::perf::TickMonitor;
use suspense_ai_core::ai::scheduler::FsmScheduler;
use suspense_ai_core::ai::significance::SignificanceManager;
use suspense_ai_core::ai::AiContext;
use suspense_ai_core::config::AiConfig;
use suspense_ai_core::util::vec3::Vec3;
use suspense_ai_core::world::agent::{AgentId, EnemyAgent, FireMode};
use suspense_ai_core::world::nav::{BoxObstacleTracer, NavHole, ObstacleBox, PlaneNavMesh};
use suspense_ai_core::world::{PlayerPawn, World};
use suspense_ai_core::ai::fsm::{FsmInstance, StateId};

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Suspense AI core demo v{}", env!("CARGO_PKG_VERSION"));

    let config = AiConfig::load_or_default();
    config.validate()?;
    info!(
        agents = config.agent_count,
        tick_rate = config.tick_rate,
        seconds = config.sim_seconds,
        "Configuration loaded"
    );

    let mut world = build_world();
    let mut crowd = CrowdCoordinator::with_tuning(config.crowd_cell_size, config.max_path_requests);
    let mut detection = DetectionCache::new();
    let mut significance =
        SignificanceManager::with_tuning(config.significance_interval, config.significance_batch);
    let mut scheduler = FsmScheduler::with_tuning(
        config.fsm_chunk_size,
        Duration::from_secs_f64(config.fsm_budget_ms / 1000.0),
    );
    let mut monitor = TickMonitor::new(config.tick_rate);

    let agents = spawn_population(&mut world, config.agent_count);
    for &id in &agents {
        crowd.register_agent(id);
        significance.register_agent(id);
        scheduler.register_fsm(id);
    }
    world.players.push(PlayerPawn::at(Vec3::new(3000.0, 0.0, 0.0)));
    info!(count = agents.len(), "Population spawned, simulation starting");

    let dt = 1.0 / config.tick_rate as f32;
    let tick_duration = Duration::from_secs_f32(dt);
    let total_ticks = (config.sim_seconds * config.tick_rate as f32) as u64;
    let mut last_report = Instant::now();

    for tick in 0..total_ticks {
        let tick_started = Instant::now();
        monitor.tick_start();

        world.advance_clock(dt);
        drive_player(&mut world, dt);

        significance.tick(&mut world, dt);
        {
            let mut ctx = AiContext {
                world: &mut world,
                crowd: &mut crowd,
                detection: &mut detection,
            };
            scheduler.global_tick(&mut ctx, dt);
        }
        crowd.crowd_update_tick(&mut world, dt);
        world.step_agent_motors(dt);

        monitor.tick_end();

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            report(tick, &world, &crowd, &scheduler, &monitor, &agents);
        }

        if let Some(remaining) = tick_duration.checked_sub(tick_started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    report(total_ticks, &world, &crowd, &scheduler, &monitor, &agents);
    info!("Simulation finished");
    Ok(())
}

/// Flat plane with two nav holes and a handful of sight-blocking walls
fn build_world() -> World {
    let nav = PlaneNavMesh::with_holes(
        0.0,
        vec![
            NavHole {
                center: Vec3::new(4000.0, 4000.0, 0.0),
                radius: 600.0,
            },
            NavHole {
                center: Vec3::new(-5000.0, 2000.0, 0.0),
                radius: 400.0,
            },
        ],
    );
    let tracer = BoxObstacleTracer::new(vec![
        ObstacleBox::new(Vec3::new(1500.0, 500.0, 150.0), Vec3::new(300.0, 60.0, 150.0)),
        ObstacleBox::new(Vec3::new(-2000.0, -1500.0, 150.0), Vec3::new(60.0, 400.0, 150.0)),
        ObstacleBox::new(Vec3::new(500.0, -3000.0, 150.0), Vec3::new(250.0, 250.0, 150.0)),
    ]);
    World::new(Arc::new(nav), Arc::new(tracer))
}

/// Agents in rings around the origin, mixed fire modes
fn spawn_population(world: &mut World, count: usize) -> Vec<AgentId> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = rng.gen_range(1000.0..15_000.0);
            let position = Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0);
            let fire_mode = match i % 3 {
                0 => FireMode::Single,
                1 => FireMode::Burst,
                _ => FireMode::Auto,
            };
            world.agents.spawn(
                EnemyAgent::new(position)
                    .with_fsm(FsmInstance::standard())
                    .with_fire_mode(fire_mode),
            )
        })
        .collect()
}

/// Scripted player: a slow orbit through the agent rings
fn drive_player(world: &mut World, dt: f32) {
    let t = world.time as f32 * 0.08;
    let radius = 3000.0 + (world.time as f32 * 0.05).sin() * 2000.0;
    let target = Vec3::new(t.cos() * radius, t.sin() * radius, 0.0);
    if let Some(player) = world.players.first_mut() {
        let old = player.position;
        player.position = target;
        player.velocity = (target - old) * (1.0 / dt.max(1.0e-6));
    }
}

fn report(
    tick: u64,
    world: &World,
    crowd: &CrowdCoordinator,
    scheduler: &FsmScheduler,
    monitor: &TickMonitor,
    agents: &[AgentId],
) {
    let mut tiers: HashMap<&'static str, usize> = HashMap::new();
    let mut states: HashMap<StateId, usize> = HashMap::new();
    let mut shots_total = 0u32;

    for &id in agents {
        let Some(agent) = world.agents.get(id) else {
            continue;
        };
        let tier = match agent.detail_level {
            suspense_ai_core::world::agent::DetailLevel::Full => "full",
            suspense_ai_core::world::agent::DetailLevel::Reduced => "reduced",
            suspense_ai_core::world::agent::DetailLevel::Minimal => "minimal",
            suspense_ai_core::world::agent::DetailLevel::Sleep => "sleep",
        };
        *tiers.entry(tier).or_default() += 1;
        if let Some(fsm) = agent.fsm.as_ref() {
            *states.entry(fsm.current_state()).or_default() += 1;
        }
        shots_total += agent.shots_fired;
    }

    info!(
        tick,
        status = ?monitor.status(),
        avg_us = monitor.average().as_micros() as u64,
        p95_us = monitor.p95().as_micros() as u64,
        budget_pct = monitor.budget_usage_percent(),
        chunk = scheduler.chunk_size(),
        moving = crowd.moving_count(),
        pending_paths = crowd.pending_request_count(),
        ?tiers,
        ?states,
        shots_total,
        "tick report"
    );
}

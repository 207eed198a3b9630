//! Simulated world: agent arena, player pawns, clock and engine facades
//!
//! One `World` per simulated level. All per-world services (notably the
//! detection cache) are owned by the caller alongside the world, never
//! stored globally, so several worlds can coexist in one process without
//! sharing state.

pub mod agent;
pub mod movement;
pub mod nav;

use std::sync::Arc;

use crate::util::vec3::Vec3;
use self::agent::AgentArena;
use self::nav::{ClearTracer, LineTracer, NavMesh, PlaneNavMesh};

/// Index into [`World::players`]
pub type PlayerId = usize;

/// A player-controlled pawn as the AI core sees it
#[derive(Debug, Clone)]
pub struct PlayerPawn {
    pub position: Vec3,
    pub velocity: Vec3,
    pub alive: bool,
}

impl PlayerPawn {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            alive: true,
        }
    }
}

/// One simulated level
pub struct World {
    pub agents: AgentArena,
    pub players: Vec<PlayerPawn>,
    pub nav: Arc<dyn NavMesh>,
    pub tracer: Arc<dyn LineTracer>,
    /// Simulation clock, seconds since world start
    pub time: f64,
    /// Server-side instance; detection and movement initiation are
    /// authority-only and fail closed elsewhere
    pub authority: bool,
}

impl World {
    pub fn new(nav: Arc<dyn NavMesh>, tracer: Arc<dyn LineTracer>) -> Self {
        Self {
            agents: AgentArena::new(),
            players: Vec::new(),
            nav,
            tracer,
            time: 0.0,
            authority: true,
        }
    }

    /// Flat, obstacle-free world (demo setup and tests)
    pub fn with_flat_ground() -> Self {
        Self::new(Arc::new(PlaneNavMesh::flat(0.0)), Arc::new(ClearTracer))
    }

    pub fn advance_clock(&mut self, dt: f32) {
        self.time += dt as f64;
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerPawn> {
        self.players.get(id)
    }

    /// The canonical "player index 0", if present and alive
    pub fn primary_player(&self) -> Option<PlayerId> {
        match self.players.first() {
            Some(pawn) if pawn.alive => Some(0),
            _ => None,
        }
    }

    /// Positions of all living player pawns
    pub fn player_positions(&self) -> Vec<Vec3> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.position)
            .collect()
    }

    /// Integrate every live agent's active motor and advance positions
    pub fn step_agent_motors(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        for (_, agent) in self.agents.iter_mut() {
            let displacement = agent.movement.integrate(dt);
            agent.position += displacement;
        }
    }
}

//! Global time-sliced FSM dispatcher
//!
//! One `global_tick` drives every registered agent's state machine, walking
//! the registry round-robin under a wall-clock budget. Small populations
//! are fully serviced every tick; when per-agent cost spikes, the pass
//! stops early — but never before `min(chunk_size, len)` agents have run,
//! so every agent is still visited within `ceil(len / chunk_size)` ticks
//! and starvation is impossible (the cursor advances by the number of
//! agents actually processed, at least one whenever the registry is
//! non-empty).
//!
//! The chunk size adapts with a plain additive controller: grow when the
//! pass finished under half the budget, shrink when it blew through it,
//! clamped to a fixed band. Hitting the budget is routine control flow
//! here, not an error, and is never logged above trace level.

use std::time::{Duration, Instant};

use crate::ai::AiContext;
use crate::world::agent::AgentId;

/// Wall-clock budget for one scheduling pass
pub const MAX_TIME_SLICE_BUDGET_MS: f64 = 3.0;

/// Bounds and step of the adaptive chunk controller
pub const MIN_CHUNK_SIZE: usize = 10;
pub const MAX_CHUNK_SIZE: usize = 100;
pub const CHUNK_SIZE_STEP: usize = 5;

/// Default starting chunk size
pub const INITIAL_CHUNK_SIZE: usize = 30;

/// Round-robin, budget-bounded FSM scheduler
pub struct FsmScheduler {
    registry: Vec<AgentId>,
    cursor: usize,
    chunk_size: usize,
    budget: Duration,
}

impl FsmScheduler {
    pub fn new() -> Self {
        Self {
            registry: Vec::new(),
            cursor: 0,
            chunk_size: INITIAL_CHUNK_SIZE,
            budget: Duration::from_secs_f64(MAX_TIME_SLICE_BUDGET_MS / 1000.0),
        }
    }

    pub fn with_tuning(chunk_size: usize, budget: Duration) -> Self {
        Self {
            chunk_size: chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
            budget,
            ..Self::new()
        }
    }

    /// Idempotent registration
    pub fn register_fsm(&mut self, agent: AgentId) {
        if !self.registry.contains(&agent) {
            self.registry.push(agent);
        }
    }

    /// Idempotent removal; resets the cursor when it would point past the
    /// shrunken registry
    pub fn unregister_fsm(&mut self, agent: AgentId) {
        self.registry.retain(|&a| a != agent);
        if self.cursor >= self.registry.len() {
            self.cursor = 0;
        }
    }

    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// One scheduling pass over the registry
    pub fn global_tick(&mut self, ctx: &mut AiContext, dt: f32) {
        // Full purge of stale handles every pass; registry sizes are
        // bounded by the agent population, a linear scan is fine
        let before = self.registry.len();
        {
            let agents = &ctx.world.agents;
            self.registry.retain(|&id| agents.contains(id));
        }
        if self.registry.len() != before && self.cursor >= self.registry.len() {
            self.cursor = 0;
        }

        let count = self.registry.len();
        if count == 0 {
            return;
        }

        let start = Instant::now();
        // The budget stop only engages past this floor, which is what
        // bounds worst-case revisit latency to ceil(count / chunk_size)
        let guaranteed = self.chunk_size.min(count);
        let mut processed = 0;

        while processed < count {
            let id = self.registry[(self.cursor + processed) % count];
            self.tick_agent(id, ctx, dt);
            processed += 1;

            if processed >= guaranteed && start.elapsed() > self.budget {
                tracing::trace!(
                    processed,
                    count,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "time slice exhausted mid-pass"
                );
                break;
            }
        }

        self.cursor = (self.cursor + processed) % count;
        self.adjust_chunk_size(start.elapsed());
    }

    fn tick_agent(&self, id: AgentId, ctx: &mut AiContext, dt: f32) {
        let Some(mut fsm) = ctx.world.agents.get_mut(id).and_then(|a| a.fsm.take()) else {
            return;
        };
        fsm.master_tick(id, dt, ctx);
        if let Some(agent) = ctx.world.agents.get_mut(id) {
            agent.fsm = Some(fsm);
        }
    }

    /// Additive controller: +step under half budget, -step over budget,
    /// clamped to [MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]
    fn adjust_chunk_size(&mut self, elapsed: Duration) {
        if elapsed < self.budget / 2 {
            self.chunk_size = (self.chunk_size + CHUNK_SIZE_STEP).min(MAX_CHUNK_SIZE);
        } else if elapsed > self.budget {
            self.chunk_size = self.chunk_size.saturating_sub(CHUNK_SIZE_STEP).max(MIN_CHUNK_SIZE);
        }
    }
}

impl Default for FsmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

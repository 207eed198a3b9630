//! Enemy AI core: schedulers, caches and planners
//!
//! Three independent per-tick entry points ([`scheduler::FsmScheduler`],
//! [`significance::SignificanceManager`], [`crowd::CrowdCoordinator`]) each
//! iterate their own registry of agent handles. Their relative order within
//! a tick is unconstrained; a move requested during the FSM phase is
//! serviced no earlier than the same tick's crowd phase, possibly the next
//! tick's — that one-tick latency is part of the design.

pub mod crowd;
pub mod detection;
pub mod fsm;
pub mod perf;
pub mod reposition;
pub mod scheduler;
pub mod significance;
pub mod spatial;

use crate::ai::crowd::CrowdCoordinator;
use crate::ai::detection::DetectionCache;
use crate::world::World;

/// AI-tuning parameters are denominated in meters; world space is
/// centimeter-scaled
pub const M_TO_CM: f32 = 100.0;
pub const CM_TO_M: f32 = 0.01;

/// Everything an FSM state may touch during its tick. Borrowed fresh for
/// each scheduler pass; all access stays on the simulation thread.
pub struct AiContext<'a> {
    pub world: &'a mut World,
    pub crowd: &'a mut CrowdCoordinator,
    pub detection: &'a mut DetectionCache,
}

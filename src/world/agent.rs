//! Enemy agent storage: generational arena and per-agent state
//!
//! Schedulers never hold references to agents. They hold copyable
//! [`AgentId`] handles (slot index + generation) and validate them on every
//! use; a despawned slot bumps its generation, so stale handles simply stop
//! resolving and get purged lazily by whichever registry touches them next.

use crate::ai::fsm::{FsmEvent, FsmInstance};
use crate::util::vec3::Vec3;
use crate::world::movement::{MotorBackend, MovementRig};

/// Opaque stable handle to an agent slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId {
    index: u32,
    generation: u32,
}

impl AgentId {
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Stable 64-bit key for hashing into caches
    pub fn raw(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}.{}", self.index, self.generation)
    }
}

/// Simulation fidelity tiers, ordered by increasing distance from players
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailLevel {
    Full,
    Reduced,
    Minimal,
    Sleep,
}

/// Weapon firing pattern, drives repositioning tactics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FireMode {
    #[default]
    Single,
    Burst,
    Auto,
}

/// The slice of weapon state the AI core needs
#[derive(Debug, Clone)]
pub struct WeaponProfile {
    pub fire_mode: FireMode,
    /// Muzzle socket offset in the agent frame (x along forward, z up)
    pub muzzle_offset: Vec3,
}

impl Default for WeaponProfile {
    fn default() -> Self {
        Self {
            fire_mode: FireMode::Single,
            muzzle_offset: Vec3::new(60.0, 0.0, 140.0),
        }
    }
}

/// One enemy NPC as the schedulers see it
#[derive(Debug)]
pub struct EnemyAgent {
    pub position: Vec3,
    pub forward: Vec3,
    pub alive: bool,
    pub spawn_point: Vec3,
    pub detail_level: DetailLevel,
    pub movement: MovementRig,
    pub weapon: WeaponProfile,
    /// Taken out while this agent's own FSM tick runs
    pub fsm: Option<FsmInstance>,
    /// Network send rate for this agent, Hz (engine-side consumer)
    pub net_update_hz: f32,
    /// Seconds between perception checks (LOD-driven)
    pub perception_interval: f32,
    /// Seconds between path-follow component ticks (LOD-driven)
    pub path_tick_interval: f32,
    pub shots_fired: u32,
}

impl EnemyAgent {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            forward: Vec3::UNIT_X,
            alive: true,
            spawn_point: position,
            detail_level: DetailLevel::Full,
            movement: MovementRig::new(),
            weapon: WeaponProfile::default(),
            fsm: None,
            net_update_hz: 10.0,
            perception_interval: 0.1,
            path_tick_interval: 0.0,
            shots_fired: 0,
        }
    }

    pub fn with_fsm(mut self, fsm: FsmInstance) -> Self {
        self.fsm = Some(fsm);
        self
    }

    pub fn with_fire_mode(mut self, fire_mode: FireMode) -> Self {
        self.weapon.fire_mode = fire_mode;
        self
    }

    /// World-space muzzle socket location
    pub fn muzzle_location(&self) -> Vec3 {
        self.position
            + self.forward * self.weapon.muzzle_offset.x
            + Vec3::UNIT_Z * self.weapon.muzzle_offset.z
    }

    /// Inject an external event into this agent's state machine.
    /// Dropped silently when the FSM is currently ticking elsewhere or the
    /// agent has none; callers treat delivery as best-effort.
    pub fn enqueue_fsm_event(&mut self, event: FsmEvent) {
        if let Some(fsm) = self.fsm.as_mut() {
            fsm.enqueue_event(event);
        }
    }

    /// Apply a new detail level and its side effects: movement backend
    /// switch and tick/replication cadence reconfiguration.
    /// Returns true when the level actually changed.
    pub fn apply_detail_level(&mut self, level: DetailLevel) -> bool {
        if level == self.detail_level {
            return false;
        }
        let old = self.detail_level;
        self.detail_level = level;

        match level {
            DetailLevel::Full => {
                self.movement.switch_to(MotorBackend::Character);
            }
            _ => {
                self.movement.switch_to(MotorBackend::Floating);
            }
        }

        let (net_hz, perception, path_tick) = match level {
            DetailLevel::Full => (10.0, 0.1, 0.0),
            DetailLevel::Reduced => (4.0, 0.3, 0.1),
            DetailLevel::Minimal => (1.0, 0.6, 0.2),
            DetailLevel::Sleep => (0.5, 1.0, 0.5),
        };
        self.net_update_hz = net_hz;
        self.perception_interval = perception;
        self.path_tick_interval = path_tick;

        tracing::trace!(?old, new = ?level, "detail level changed");
        true
    }
}

struct Slot {
    generation: u32,
    agent: Option<EnemyAgent>,
}

/// Arena of agent slots with generation counters
#[derive(Default)]
pub struct AgentArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl AgentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, agent: EnemyAgent) -> AgentId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.agent = Some(agent);
            AgentId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                agent: Some(agent),
            });
            AgentId {
                index,
                generation: 0,
            }
        }
    }

    /// Remove an agent; its handle (and any copies) stop resolving.
    /// Returns false for handles that are already stale.
    pub fn despawn(&mut self, id: AgentId) -> bool {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.agent.is_some() => {
                slot.agent = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: AgentId) -> Option<&EnemyAgent> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.agent.as_ref())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut EnemyAgent> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.agent.as_mut())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &EnemyAgent)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.agent.as_ref().map(|agent| {
                (
                    AgentId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    agent,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentId, &mut EnemyAgent)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.agent.as_mut().map(move |agent| {
                (
                    AgentId {
                        index: i as u32,
                        generation,
                    },
                    agent,
                )
            })
        })
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Positions of all live agents except `exclude` (reposition snapshots)
    pub fn live_positions(&self, exclude: Option<AgentId>) -> Vec<Vec3> {
        self.iter()
            .filter(|(id, _)| Some(*id) != exclude)
            .map(|(_, a)| a.position)
            .collect()
    }
}

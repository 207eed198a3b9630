//! Crowd movement: batched path validation, per-tick integration and
//! reactive collision avoidance
//!
//! Move requests are fire-and-forget: `request_agent_move` records the
//! destination and queues a path request; at most [`MAX_PATH_REQUESTS_PER_FRAME`]
//! requests are validated against the navigation facade per tick, so a
//! request issued this tick may be serviced next tick. A failed projection
//! stops the agent; retrying is the caller's decision.
//!
//! Avoidance is reactive and local: at ~20 Hz the spatial grid is rebuilt
//! from moving agents and each one blends a distance-weighted repulsion
//! away from neighbors into its velocity. Overlaps are resolved after they
//! begin; good enough for slow NPC crowds, not for precise maneuvering.

use hashbrown::HashMap;

use crate::ai::fsm::{EnemyEvent, FsmEvent};
use crate::ai::spatial::SpatialHashGrid;
use crate::util::vec3::Vec3;
use crate::world::agent::{AgentId, DetailLevel};
use crate::world::movement::MotorBackend;
use crate::world::World;

/// Path requests validated per tick
pub const MAX_PATH_REQUESTS_PER_FRAME: usize = 10;

/// Navigation projection search extent, world units
pub const NAV_SEARCH_EXTENT: Vec3 = Vec3::new(300.0, 300.0, 100.0);

/// Distance at which a move counts as arrived
pub const ARRIVAL_RADIUS: f32 = 100.0;

/// Seconds between collision-resolution passes (~20 Hz)
pub const COLLISION_CHECK_INTERVAL: f32 = 0.05;

/// Neighbor distance below which repulsion accumulates
pub const COLLISION_RADIUS: f32 = 100.0;

/// Blend weight of the repulsion direction into the movement direction
pub const AVOIDANCE_STRENGTH: f32 = 0.5;

/// Fallback speed until the first path reply reads the motor's max speed
pub const DEFAULT_AGENT_SPEED: f32 = 300.0;

/// Facing interpolation speed while moving
pub const ROTATION_INTERP_SPEED: f32 = 5.0;

/// Per-agent movement bookkeeping
#[derive(Debug, Clone)]
pub struct AgentMoveRecord {
    pub target_destination: Vec3,
    pub current_velocity: Vec3,
    pub speed: f32,
    pub is_moving: bool,
    pub has_path_request: bool,
    pub distance_to_target: f32,
}

impl Default for AgentMoveRecord {
    fn default() -> Self {
        Self {
            target_destination: Vec3::ZERO,
            current_velocity: Vec3::ZERO,
            speed: DEFAULT_AGENT_SPEED,
            is_moving: false,
            has_path_request: false,
            distance_to_target: 0.0,
        }
    }
}

/// Per-world crowd movement coordinator
pub struct CrowdCoordinator {
    records: HashMap<AgentId, AgentMoveRecord>,
    pending_requests: Vec<AgentId>,
    grid: SpatialHashGrid,
    collision_accumulator: f32,
    max_requests_per_frame: usize,
}

impl CrowdCoordinator {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            pending_requests: Vec::new(),
            grid: SpatialHashGrid::default(),
            collision_accumulator: 0.0,
            max_requests_per_frame: MAX_PATH_REQUESTS_PER_FRAME,
        }
    }

    pub fn with_tuning(cell_size: f32, max_requests_per_frame: usize) -> Self {
        Self {
            grid: SpatialHashGrid::new(cell_size),
            max_requests_per_frame,
            ..Self::new()
        }
    }

    /// Create a movement record for a new agent (idempotent)
    pub fn register_agent(&mut self, agent: AgentId) {
        if !self.records.contains_key(&agent) {
            self.records.insert(agent, AgentMoveRecord::default());
            tracing::trace!(%agent, "crowd agent registered");
        }
    }

    /// Drop the record and any pending path request
    pub fn unregister_agent(&mut self, agent: AgentId) {
        self.records.remove(&agent);
        self.pending_requests.retain(|&a| a != agent);
        tracing::trace!(%agent, "crowd agent unregistered");
    }

    /// Fire-and-forget move request. Overwrites any pending destination;
    /// the path is validated in a later batch, never synchronously.
    pub fn request_agent_move(&mut self, agent: AgentId, destination: Vec3) {
        let record = self.records.entry(agent).or_default();
        record.target_destination = destination;
        record.has_path_request = true;

        if !self.pending_requests.contains(&agent) {
            self.pending_requests.push(agent);
        }
        tracing::trace!(%agent, ?destination, "move requested");
    }

    /// Halt an agent: drop any pending request, zero its record and stop
    /// the active motor
    pub fn stop_agent(&mut self, world: &mut World, agent: AgentId) {
        if let Some(record) = self.records.get_mut(&agent) {
            record.is_moving = false;
            record.has_path_request = false;
            record.current_velocity = Vec3::ZERO;
        }
        self.pending_requests.retain(|&a| a != agent);
        if let Some(state) = world.agents.get_mut(agent) {
            state.movement.stop_immediately();
        }
    }

    /// Current crowd velocity for an agent; zero without a record
    pub fn agent_velocity(&self, agent: AgentId) -> Vec3 {
        self.records
            .get(&agent)
            .map(|r| r.current_velocity)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn record(&self, agent: AgentId) -> Option<&AgentMoveRecord> {
        self.records.get(&agent)
    }

    pub fn registered_count(&self) -> usize {
        self.records.len()
    }

    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    /// Agents currently integrating toward a destination
    pub fn moving_count(&self) -> usize {
        self.records.values().filter(|r| r.is_moving).count()
    }

    /// Per-tick entry point: drain a path-request batch, integrate every
    /// moving agent, then resolve collisions at the throttled cadence.
    /// Non-positive `dt` makes the whole tick a no-op.
    pub fn crowd_update_tick(&mut self, world: &mut World, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        self.batch_process_path_requests(world);
        self.integrate_movement(world, dt);

        self.collision_accumulator += dt;
        if self.collision_accumulator >= COLLISION_CHECK_INTERVAL {
            self.build_spatial_grid(world);
            self.resolve_agent_collisions(world);
            self.collision_accumulator = 0.0;
        }
    }

    fn batch_process_path_requests(&mut self, world: &mut World) {
        if self.pending_requests.is_empty() {
            return;
        }

        let mut processed = 0;
        for i in 0..self.pending_requests.len() {
            if processed >= self.max_requests_per_frame {
                break;
            }
            let agent_id = self.pending_requests[i];
            let Some(agent) = world.agents.get(agent_id) else {
                continue;
            };
            let Some(record) = self.records.get_mut(&agent_id) else {
                continue;
            };
            if !record.has_path_request {
                continue;
            }

            // Sleeping agents get their request cleared without service;
            // LOD-driven work avoidance, a new request is needed to retry
            if agent.detail_level == DetailLevel::Sleep {
                record.has_path_request = false;
                continue;
            }

            match world
                .nav
                .project_point(record.target_destination, NAV_SEARCH_EXTENT)
            {
                Some(projected) => {
                    record.target_destination = projected;
                    record.speed = agent.movement.max_speed();
                    record.is_moving = true;
                    record.has_path_request = false;
                    tracing::trace!(agent = %agent_id, ?projected, "path found");
                }
                None => {
                    record.is_moving = false;
                    record.has_path_request = false;
                    record.current_velocity = Vec3::ZERO;
                    tracing::warn!(agent = %agent_id, target = ?record.target_destination, "no path to destination, stopping agent");
                }
            }
            processed += 1;
        }

        // Compact: drop entries that are stale or no longer pending
        let records = &self.records;
        let agents = &world.agents;
        self.pending_requests.retain(|&id| {
            agents.contains(id)
                && records
                    .get(&id)
                    .map(|r| r.has_path_request)
                    .unwrap_or(false)
        });
    }

    fn integrate_movement(&mut self, world: &mut World, dt: f32) {
        let mut stale: Vec<AgentId> = Vec::new();

        for (&agent_id, record) in self.records.iter_mut() {
            let Some(agent) = world.agents.get_mut(agent_id) else {
                stale.push(agent_id);
                continue;
            };

            // Dead or sleeping agents are force-stopped
            if !agent.alive || agent.detail_level == DetailLevel::Sleep {
                record.is_moving = false;
                record.current_velocity = Vec3::ZERO;
                continue;
            }

            if !record.is_moving {
                continue;
            }

            let current = agent.position;
            let to_target = record.target_destination - current;
            let (direction, distance) = to_target.normalize_with_length();
            record.distance_to_target = distance;

            if distance <= ARRIVAL_RADIUS {
                record.is_moving = false;
                record.current_velocity = Vec3::ZERO;
                if agent.movement.is_enabled(MotorBackend::Floating) {
                    agent.movement.stop_immediately();
                }
                agent.enqueue_fsm_event(FsmEvent::new(EnemyEvent::ReachedTarget));
                tracing::trace!(agent = %agent_id, "reached destination");
                continue;
            }

            record.current_velocity = direction * record.speed;
            agent.movement.set_max_speed(record.speed);
            agent.movement.add_input(direction);
            agent.forward = agent
                .forward
                .interp_to(direction, dt, ROTATION_INTERP_SPEED)
                .normalize();
        }

        for agent_id in stale {
            self.records.remove(&agent_id);
            self.pending_requests.retain(|&a| a != agent_id);
        }
    }

    fn build_spatial_grid(&mut self, world: &World) {
        self.grid.clear();
        for (&agent_id, record) in self.records.iter() {
            if !record.is_moving {
                continue;
            }
            let Some(agent) = world.agents.get(agent_id) else {
                continue;
            };
            if agent.detail_level == DetailLevel::Sleep {
                continue;
            }
            self.grid.add_agent(agent.position, agent_id);
        }
    }

    fn resolve_agent_collisions(&mut self, world: &World) {
        let grid = &self.grid;
        for (&agent_id, record) in self.records.iter_mut() {
            if !record.is_moving {
                continue;
            }
            let Some(agent) = world.agents.get(agent_id) else {
                continue;
            };
            if agent.detail_level == DetailLevel::Sleep {
                continue;
            }

            let position = agent.position;
            let mut repulsion = Vec3::ZERO;
            let mut collides = false;

            for neighbor_id in grid.cell_agents(position) {
                if neighbor_id == agent_id {
                    continue;
                }
                let Some(neighbor) = world.agents.get(neighbor_id) else {
                    continue;
                };
                if neighbor.detail_level == DetailLevel::Sleep {
                    continue;
                }

                let offset = position - neighbor.position;
                let distance = offset.length();
                // Coincident agents are excluded from repulsion entirely
                if distance > 0.0 && distance < COLLISION_RADIUS {
                    repulsion += offset.normalize() * (1.0 - distance / COLLISION_RADIUS);
                    collides = true;
                }
            }

            if collides && !repulsion.is_nearly_zero(1.0e-4) {
                let avoidance = repulsion.normalize();
                let current_dir = record.current_velocity.normalize();
                let blended = (current_dir + avoidance * AVOIDANCE_STRENGTH).normalize();
                record.current_velocity = blended * record.speed;
            }
        }
    }
}

impl Default for CrowdCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::fsm::FsmInstance;
    use crate::world::agent::EnemyAgent;
    use crate::world::nav::{NavHole, PlaneNavMesh};
    use std::sync::Arc;

    fn spawn_registered(world: &mut World, crowd: &mut CrowdCoordinator, pos: Vec3) -> AgentId {
        let id = world.agents.spawn(EnemyAgent::new(pos));
        crowd.register_agent(id);
        id
    }

    #[test]
    fn test_move_request_serviced_in_one_tick() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);

        crowd.request_agent_move(id, Vec3::new(500.0, 0.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.016);

        let record = crowd.record(id).unwrap();
        assert!(record.is_moving);
        assert!(!record.has_path_request);
        let dir = record.current_velocity.normalize();
        assert!(dir.approx_eq(Vec3::UNIT_X, 1e-4));
        assert!((record.current_velocity.length() - record.speed).abs() < 1e-3);
    }

    #[test]
    fn test_failed_projection_stops_agent() {
        let nav = PlaneNavMesh::with_holes(
            0.0,
            vec![NavHole {
                center: Vec3::new(5000.0, 0.0, 0.0),
                radius: 1000.0,
            }],
        );
        let mut world = World::with_flat_ground();
        world.nav = Arc::new(nav);
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);

        crowd.request_agent_move(id, Vec3::new(5000.0, 0.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.016);

        let record = crowd.record(id).unwrap();
        assert!(!record.is_moving);
        assert!(!record.has_path_request);
        assert_eq!(record.current_velocity, Vec3::ZERO);
        // No automatic retry was queued
        assert_eq!(crowd.pending_request_count(), 0);
    }

    #[test]
    fn test_request_batch_cap_per_tick() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();

        for i in 0..25 {
            let id = spawn_registered(&mut world, &mut crowd, Vec3::new(i as f32 * 1000.0, 0.0, 0.0));
            crowd.request_agent_move(id, Vec3::new(i as f32 * 1000.0 + 500.0, 0.0, 0.0));
        }
        assert_eq!(crowd.pending_request_count(), 25);

        crowd.crowd_update_tick(&mut world, 0.016);
        assert_eq!(crowd.pending_request_count(), 15);

        crowd.crowd_update_tick(&mut world, 0.016);
        assert_eq!(crowd.pending_request_count(), 5);

        crowd.crowd_update_tick(&mut world, 0.016);
        assert_eq!(crowd.pending_request_count(), 0);
        assert_eq!(crowd.moving_count(), 25);
    }

    #[test]
    fn test_sleeping_agent_request_cleared_unserviced() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);
        world
            .agents
            .get_mut(id)
            .unwrap()
            .apply_detail_level(DetailLevel::Sleep);

        crowd.request_agent_move(id, Vec3::new(500.0, 0.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.016);

        let record = crowd.record(id).unwrap();
        assert!(!record.is_moving);
        assert!(!record.has_path_request);
        assert_eq!(crowd.pending_request_count(), 0);
    }

    #[test]
    fn test_arrival_fires_event_once() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);
        world.agents.get_mut(id).unwrap().fsm = Some(FsmInstance::standard());

        // Destination within the arrival radius
        crowd.request_agent_move(id, Vec3::new(50.0, 0.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.016);

        let record = crowd.record(id).unwrap();
        assert!(!record.is_moving);
        assert_eq!(record.current_velocity, Vec3::ZERO);

        let queued = |world: &World| {
            format!("{:?}", world.agents.get(id).unwrap().fsm.as_ref().unwrap())
        };
        let after_arrival = queued(&world);

        // The next tick must neither move the agent nor re-fire the event
        crowd.crowd_update_tick(&mut world, 0.016);
        let record = crowd.record(id).unwrap();
        assert!(!record.is_moving);
        assert_eq!(record.current_velocity, Vec3::ZERO);
        assert_eq!(queued(&world), after_arrival);
    }

    #[test]
    fn test_dead_agent_force_stopped() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);

        crowd.request_agent_move(id, Vec3::new(5000.0, 0.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.016);
        assert!(crowd.record(id).unwrap().is_moving);

        world.agents.get_mut(id).unwrap().alive = false;
        crowd.crowd_update_tick(&mut world, 0.016);

        let record = crowd.record(id).unwrap();
        assert!(!record.is_moving);
        assert_eq!(record.current_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_stale_agents_purged_lazily() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);
        assert_eq!(crowd.registered_count(), 1);

        world.agents.despawn(id);
        crowd.crowd_update_tick(&mut world, 0.016);
        assert_eq!(crowd.registered_count(), 0);
    }

    #[test]
    fn test_nonpositive_dt_is_noop() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);

        crowd.request_agent_move(id, Vec3::new(500.0, 0.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.0);
        crowd.crowd_update_tick(&mut world, -0.1);

        assert!(crowd.record(id).unwrap().has_path_request);
        assert_eq!(crowd.pending_request_count(), 1);
    }

    #[test]
    fn test_collision_repulsion_points_apart() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        // Two agents 60 units apart, both moving +Y toward far targets
        let a = spawn_registered(&mut world, &mut crowd, Vec3::new(0.0, 0.0, 0.0));
        let b = spawn_registered(&mut world, &mut crowd, Vec3::new(60.0, 0.0, 0.0));
        crowd.request_agent_move(a, Vec3::new(0.0, 5000.0, 0.0));
        crowd.request_agent_move(b, Vec3::new(60.0, 5000.0, 0.0));

        // One long tick crosses the collision interval
        crowd.crowd_update_tick(&mut world, 0.06);

        let va = crowd.agent_velocity(a);
        let vb = crowd.agent_velocity(b);
        // A is pushed toward -X (away from B), B toward +X (away from A)
        assert!(va.x < 0.0);
        assert!(vb.x > 0.0);
        // Speed magnitude is preserved by the blend
        assert!((va.length() - crowd.record(a).unwrap().speed).abs() < 1e-2);
    }

    #[test]
    fn test_coincident_agents_no_nan() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let a = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);
        let b = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);
        crowd.request_agent_move(a, Vec3::new(0.0, 5000.0, 0.0));
        crowd.request_agent_move(b, Vec3::new(0.0, 5000.0, 0.0));

        crowd.crowd_update_tick(&mut world, 0.06);

        let va = crowd.agent_velocity(a);
        assert!(va.x.is_finite() && va.y.is_finite() && va.z.is_finite());
    }

    #[test]
    fn test_unregister_clears_pending() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);

        crowd.request_agent_move(id, Vec3::new(500.0, 0.0, 0.0));
        crowd.unregister_agent(id);

        assert_eq!(crowd.registered_count(), 0);
        assert_eq!(crowd.pending_request_count(), 0);
        assert_eq!(crowd.agent_velocity(id), Vec3::ZERO);
        // Tick after unregistration does nothing surprising
        crowd.crowd_update_tick(&mut world, 0.016);
    }

    #[test]
    fn test_rotation_smoothing_turns_agent() {
        let mut world = World::with_flat_ground();
        let mut crowd = CrowdCoordinator::new();
        let id = spawn_registered(&mut world, &mut crowd, Vec3::ZERO);
        world.agents.get_mut(id).unwrap().forward = Vec3::UNIT_X;

        // Target is behind-left; facing should rotate over several ticks,
        // not snap on the first one
        crowd.request_agent_move(id, Vec3::new(0.0, 5000.0, 0.0));
        crowd.crowd_update_tick(&mut world, 0.016);
        let after_one = world.agents.get(id).unwrap().forward;
        assert!(after_one.dot(Vec3::UNIT_Y) < 0.99);
        assert!(after_one.dot(Vec3::UNIT_Y) > 0.0);

        for _ in 0..200 {
            crowd.crowd_update_tick(&mut world, 0.016);
        }
        let settled = world.agents.get(id).unwrap().forward;
        assert!(settled.dot(Vec3::UNIT_Y) > 0.99);
    }
}

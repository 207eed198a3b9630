//! Distance-based LOD classification for enemy agents
//!
//! Every registered agent is periodically classified into one of four
//! detail tiers from its distance to the nearest player, and the tier is
//! pushed onto the agent immediately (reconfiguring its movement backend
//! and tick/replication cadence). Classification runs in bounded
//! round-robin batches so a large population never spikes one tick: with
//! N agents every agent is revisited within `ceil(N / 30)` batches.

use crate::util::vec3::Vec3;
use crate::world::agent::{AgentId, DetailLevel};
use crate::world::World;

/// Seconds between classification batches (accumulator cadence; drift
/// under long frames is tolerated)
pub const UPDATE_INTERVAL: f32 = 0.25;

/// Upper bound on agents classified per batch
pub const MAX_UPDATES_PER_BATCH: usize = 30;

/// Tier distance thresholds, world units. Strictly-greater comparisons:
/// an agent at exactly 5000 is still Reduced, not Minimal.
pub const SLEEP_DISTANCE: f32 = 20_000.0;
pub const MINIMAL_DISTANCE: f32 = 12_000.0;
pub const REDUCED_DISTANCE: f32 = 5_000.0;

/// Map a distance-to-nearest-player onto a detail tier
pub fn classify_distance(distance: f32) -> DetailLevel {
    if distance > SLEEP_DISTANCE {
        DetailLevel::Sleep
    } else if distance > MINIMAL_DISTANCE {
        DetailLevel::Minimal
    } else if distance > REDUCED_DISTANCE {
        DetailLevel::Reduced
    } else {
        DetailLevel::Full
    }
}

/// Round-robin LOD classifier over the registered agent population
pub struct SignificanceManager {
    registry: Vec<AgentId>,
    cursor: usize,
    accumulator: f32,
    update_interval: f32,
    max_updates_per_batch: usize,
}

impl SignificanceManager {
    pub fn new() -> Self {
        Self {
            registry: Vec::new(),
            cursor: 0,
            accumulator: 0.0,
            update_interval: UPDATE_INTERVAL,
            max_updates_per_batch: MAX_UPDATES_PER_BATCH,
        }
    }

    pub fn with_tuning(update_interval: f32, max_updates_per_batch: usize) -> Self {
        Self {
            update_interval,
            max_updates_per_batch,
            ..Self::new()
        }
    }

    /// Idempotent registration
    pub fn register_agent(&mut self, id: AgentId) {
        if !self.registry.contains(&id) {
            self.registry.push(id);
        }
    }

    /// Idempotent removal; the cursor is reset when it would point past
    /// the shrunken registry
    pub fn unregister_agent(&mut self, id: AgentId) {
        self.registry.retain(|&r| r != id);
        if self.cursor >= self.registry.len() {
            self.cursor = 0;
        }
    }

    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    /// Accumulate time and run a classification batch once the update
    /// interval is reached
    pub fn tick(&mut self, world: &mut World, dt: f32) {
        self.accumulator += dt;
        if self.accumulator < self.update_interval {
            return;
        }
        self.accumulator = 0.0;
        self.run_batch(world);
    }

    fn run_batch(&mut self, world: &mut World) {
        let players = world.player_positions();
        if players.is_empty() {
            return;
        }

        // Purge handles that stopped resolving since the last batch
        let before = self.registry.len();
        self.registry.retain(|&id| world.agents.contains(id));
        if self.registry.len() != before && self.cursor >= self.registry.len() {
            self.cursor = 0;
        }

        let count = self.registry.len();
        if count == 0 {
            return;
        }

        let window = self.max_updates_per_batch.min(count);
        for i in 0..window {
            let id = self.registry[(self.cursor + i) % count];
            if let Some(agent) = world.agents.get_mut(id) {
                let distance = nearest_distance(agent.position, &players);
                agent.apply_detail_level(classify_distance(distance));
            }
        }
        self.cursor = (self.cursor + window) % count;
    }
}

impl Default for SignificanceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn nearest_distance(position: Vec3, players: &[Vec3]) -> f32 {
    players
        .iter()
        .map(|p| position.distance_to(*p))
        .fold(f32::INFINITY, f32::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::agent::EnemyAgent;
    use crate::world::PlayerPawn;

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify_distance(0.0), DetailLevel::Full);
        assert_eq!(classify_distance(4_999.0), DetailLevel::Full);
        // Boundaries are inclusive on the nearer tier (strict >)
        assert_eq!(classify_distance(5_000.0), DetailLevel::Full);
        assert_eq!(classify_distance(5_000.1), DetailLevel::Reduced);
        assert_eq!(classify_distance(12_000.0), DetailLevel::Reduced);
        assert_eq!(classify_distance(12_000.1), DetailLevel::Minimal);
        assert_eq!(classify_distance(20_000.0), DetailLevel::Minimal);
        assert_eq!(classify_distance(20_000.1), DetailLevel::Sleep);
    }

    #[test]
    fn test_classify_monotonic() {
        let samples = [
            0.0, 100.0, 4_000.0, 5_500.0, 9_000.0, 12_500.0, 18_000.0, 25_000.0, 1.0e6,
        ];
        for pair in samples.windows(2) {
            assert!(classify_distance(pair[0]) <= classify_distance(pair[1]));
        }
    }

    #[test]
    fn test_tier_pushed_to_agent() {
        // 10_000 units out: between 5000 and 12_000, so Reduced
        let mut world = World::with_flat_ground();
        world.players.push(PlayerPawn::at(Vec3::new(10_000.0, 0.0, 0.0)));
        let id = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));

        let mut manager = SignificanceManager::new();
        manager.register_agent(id);
        manager.tick(&mut world, 0.25);

        assert_eq!(world.agents.get(id).unwrap().detail_level, DetailLevel::Reduced);
    }

    #[test]
    fn test_nearest_of_all_players_wins() {
        let mut world = World::with_flat_ground();
        world.players.push(PlayerPawn::at(Vec3::new(30_000.0, 0.0, 0.0)));
        world.players.push(PlayerPawn::at(Vec3::new(1_000.0, 0.0, 0.0)));
        let id = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));

        let mut manager = SignificanceManager::new();
        manager.register_agent(id);
        manager.tick(&mut world, 0.25);

        assert_eq!(world.agents.get(id).unwrap().detail_level, DetailLevel::Full);
    }

    #[test]
    fn test_accumulator_gates_batches() {
        let mut world = World::with_flat_ground();
        world.players.push(PlayerPawn::at(Vec3::new(30_000.0, 0.0, 0.0)));
        let id = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));

        let mut manager = SignificanceManager::new();
        manager.register_agent(id);

        // Under the interval: nothing runs
        manager.tick(&mut world, 0.1);
        assert_eq!(world.agents.get(id).unwrap().detail_level, DetailLevel::Full);

        // Crossing it: the batch classifies into Sleep
        manager.tick(&mut world, 0.2);
        assert_eq!(world.agents.get(id).unwrap().detail_level, DetailLevel::Sleep);
    }

    #[test]
    fn test_round_robin_covers_everyone() {
        let mut world = World::with_flat_ground();
        world.players.push(PlayerPawn::at(Vec3::new(30_000.0, 0.0, 0.0)));

        let mut manager = SignificanceManager::new();
        let ids: Vec<_> = (0..75)
            .map(|_| {
                let id = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));
                manager.register_agent(id);
                id
            })
            .collect();

        // 75 agents at 30 per batch: everyone classified within 3 batches
        for _ in 0..3 {
            manager.tick(&mut world, 0.25);
        }
        for id in ids {
            assert_eq!(world.agents.get(id).unwrap().detail_level, DetailLevel::Sleep);
        }
    }

    #[test]
    fn test_no_players_skips_batch() {
        let mut world = World::with_flat_ground();
        let id = world.agents.spawn(EnemyAgent::new(Vec3::new(30_000.0, 0.0, 0.0)));

        let mut manager = SignificanceManager::new();
        manager.register_agent(id);
        manager.tick(&mut world, 0.25);

        assert_eq!(world.agents.get(id).unwrap().detail_level, DetailLevel::Full);
    }

    #[test]
    fn test_purges_stale_handles() {
        let mut world = World::with_flat_ground();
        world.players.push(PlayerPawn::at(Vec3::ZERO));
        let a = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));
        let b = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));

        let mut manager = SignificanceManager::new();
        manager.register_agent(a);
        manager.register_agent(b);
        world.agents.despawn(a);

        manager.tick(&mut world, 0.25);
        assert_eq!(manager.registered_count(), 1);
    }

    #[test]
    fn test_register_idempotent() {
        let mut world = World::with_flat_ground();
        let id = world.agents.spawn(EnemyAgent::new(Vec3::ZERO));

        let mut manager = SignificanceManager::new();
        manager.register_agent(id);
        manager.register_agent(id);
        assert_eq!(manager.registered_count(), 1);

        manager.unregister_agent(id);
        manager.unregister_agent(id);
        assert_eq!(manager.registered_count(), 0);
    }
}

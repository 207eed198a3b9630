//! Cached player detection: line-of-sight, field-of-view and proximity
//!
//! Server-side only. Answers "can this agent detect the player" without
//! re-running expensive traces every query: the primary player reference,
//! line-of-sight results and a coarse 3D agent grid are each cached under
//! their own refresh window. Cached LOS results may be stale by up to the
//! cache lifetime; callers accept that as the price of the fast path.
//!
//! One instance per [`World`]. Access is single-threaded by contract — the
//! cache is owned by the simulation tick and never shared across threads.

use rustc_hash::FxHashMap;

use crate::ai::M_TO_CM;
use crate::util::vec3::Vec3;
use crate::world::agent::AgentId;
use crate::world::nav::TraceSubject;
use crate::world::{PlayerId, World};

/// Seconds between primary-player reference refreshes
pub const CACHE_UPDATE_INTERVAL: f64 = 1.0;

/// Seconds a cached line-of-sight result may live before a qualifying
/// player refresh wipes the whole map
pub const LOS_CACHE_LIFETIME: f64 = 0.5;

/// Seconds between full rebuilds of the coarse detection grid
pub const SPATIAL_GRID_UPDATE_INTERVAL: f64 = 2.0;

/// Hard ceiling on the detection radius parameter, meters
pub const MAX_DETECTION_RADIUS_M: f32 = 50.0;

/// Vertical eye offset for LOS traces, world units
pub const EYE_HEIGHT_OFFSET: f32 = 50.0;

/// Default bucket edge for the coarse detection grid, world units
pub const DEFAULT_DETECTION_BUCKET_SIZE: f32 = 1000.0;

/// 3D cell key for the detection grid
pub type DetectionCellKey = (i32, i32, i32);

/// Per-world detection service
pub struct DetectionCache {
    cached_player: Option<PlayerId>,
    last_player_refresh: f64,
    los_cache: FxHashMap<u64, bool>,
    last_los_clear: f64,
    bucket_size: f32,
    spatial_grid: FxHashMap<DetectionCellKey, Vec<AgentId>>,
    last_grid_update: f64,
    grid_built: bool,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self {
            cached_player: None,
            last_player_refresh: 0.0,
            los_cache: FxHashMap::default(),
            last_los_clear: 0.0,
            bucket_size: DEFAULT_DETECTION_BUCKET_SIZE,
            spatial_grid: FxHashMap::default(),
            last_grid_update: 0.0,
            grid_built: false,
        }
    }

    /// Cached primary player, refreshed when the cache window elapses or
    /// the cached reference has gone invalid. A qualifying refresh also
    /// wipes the LOS cache once its own lifetime has passed.
    pub fn player_character(&mut self, world: &World) -> Option<PlayerId> {
        let now = world.time;
        let invalid = match self.cached_player {
            Some(id) => !world.player(id).map(|p| p.alive).unwrap_or(false),
            None => true,
        };

        if invalid || now - self.last_player_refresh > CACHE_UPDATE_INTERVAL {
            if now - self.last_los_clear > LOS_CACHE_LIFETIME {
                self.los_cache.clear();
                self.last_los_clear = now;
            }
            self.cached_player = world.primary_player();
            self.last_player_refresh = now;
        }
        self.cached_player
    }

    /// Symmetric key over the (observer, target) pair
    fn pair_key(observer: AgentId, target: PlayerId) -> u64 {
        let a = observer.raw();
        // Tag the player handle so it cannot collide with an agent handle
        let b = (1u64 << 63) | target as u64;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        lo.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ hi.rotate_left(31)
    }

    /// Cached eye-to-eye visibility between an agent and a player.
    /// Authority-only; fails closed on invalid handles.
    pub fn has_line_of_sight(&mut self, world: &World, observer: AgentId, target: PlayerId) -> bool {
        if !world.authority {
            return false;
        }
        let Some(agent) = world.agents.get(observer) else {
            tracing::debug!(%observer, "line-of-sight query for stale agent handle");
            return false;
        };
        let Some(player) = world.player(target) else {
            return false;
        };

        let key = Self::pair_key(observer, target);
        if let Some(&cached) = self.los_cache.get(&key) {
            return cached;
        }

        let from = agent.position + Vec3::UNIT_Z * EYE_HEIGHT_OFFSET;
        let to = player.position + Vec3::UNIT_Z * EYE_HEIGHT_OFFSET;
        let visible = match world.tracer.trace_visibility(from, to, Some(observer)) {
            None => true,
            Some(hit) => hit.subject == TraceSubject::Player(target),
        };

        self.los_cache.insert(key, visible);
        visible
    }

    /// Can `agent` detect the cached primary player?
    ///
    /// `detection_radius_m` is in meters and clamps at the hard ceiling
    /// before any distance math. Visibility is always verified regardless
    /// of `require_line_of_sight`; the flag is accepted for call-site
    /// compatibility and callers rely on the strict behavior.
    pub fn is_player_detectable(
        &mut self,
        world: &World,
        agent_id: AgentId,
        detection_radius_m: f32,
        detection_angle_deg: f32,
        require_line_of_sight: bool,
    ) -> bool {
        let _ = require_line_of_sight;

        if !world.authority {
            tracing::debug!("detection query on non-authoritative world");
            return false;
        }
        let Some(agent) = world.agents.get(agent_id) else {
            tracing::debug!(%agent_id, "detection query for stale agent handle");
            return false;
        };
        if !agent.alive {
            return false;
        }
        let Some(player_id) = self.player_character(world) else {
            return false;
        };
        let Some(player) = world.player(player_id) else {
            return false;
        };

        let radius = detection_radius_m.min(MAX_DETECTION_RADIUS_M) * M_TO_CM;
        let to_player = player.position - agent.position;
        if to_player.length_sq() > radius * radius {
            return false;
        }

        if detection_angle_deg < 360.0 {
            let dir = to_player.normalize();
            let cos_half = (detection_angle_deg * 0.5).to_radians().cos();
            if agent.forward.dot(dir) < cos_half {
                return false;
            }
        }

        self.has_line_of_sight(world, agent_id, player_id)
    }

    /// Single-pass detection of one player by many agents. Amortizes the
    /// player lookup; matches are appended to `out` in input order.
    /// Returns the number of agents appended.
    ///
    /// Note the field-of-view branch here engages below 180 degrees, not
    /// the 360-degree threshold of [`Self::is_player_detectable`]; the two
    /// call sites are tuned independently.
    pub fn batch_detect_players(
        &mut self,
        world: &World,
        agents: &[AgentId],
        detection_radius_m: f32,
        detection_angle_deg: f32,
        require_line_of_sight: bool,
        out: &mut Vec<AgentId>,
    ) -> usize {
        if !world.authority {
            tracing::debug!("batch detection on non-authoritative world");
            return 0;
        }
        let Some(player_id) = self.player_character(world) else {
            return 0;
        };
        let Some(player) = world.player(player_id) else {
            return 0;
        };
        let player_pos = player.position;

        let radius = detection_radius_m.min(MAX_DETECTION_RADIUS_M) * M_TO_CM;
        let radius_sq = radius * radius;
        let cos_half = (detection_angle_deg * 0.5).to_radians().cos();

        let mut appended = 0;
        for &agent_id in agents {
            let Some(agent) = world.agents.get(agent_id) else {
                continue;
            };
            if !agent.alive {
                continue;
            }

            let to_player = player_pos - agent.position;
            if to_player.length_sq() > radius_sq {
                continue;
            }

            if detection_angle_deg < 180.0 {
                let dir = to_player.normalize();
                if agent.forward.dot(dir) < cos_half {
                    continue;
                }
            }

            if require_line_of_sight && !self.has_line_of_sight(world, agent_id, player_id) {
                continue;
            }

            out.push(agent_id);
            appended += 1;
        }
        appended
    }

    /// Has the coarse grid's refresh window elapsed?
    pub fn should_update_spatial_grid(&self, world: &World) -> bool {
        !self.grid_built || world.time - self.last_grid_update > SPATIAL_GRID_UPDATE_INTERVAL
    }

    /// The detection subsystem's own coarse 3D grid of agents, rebuilt by
    /// full-world enumeration whenever the refresh window elapses. This is
    /// independent of the crowd coordinator's grid.
    pub fn spatial_bucket_data(
        &mut self,
        world: &World,
        bucket_size: f32,
    ) -> &FxHashMap<DetectionCellKey, Vec<AgentId>> {
        if bucket_size != self.bucket_size {
            self.bucket_size = bucket_size;
            self.grid_built = false;
        }
        if self.should_update_spatial_grid(world) {
            self.rebuild_spatial_grid(world);
        }
        &self.spatial_grid
    }

    fn rebuild_spatial_grid(&mut self, world: &World) {
        for cell in self.spatial_grid.values_mut() {
            cell.clear();
        }
        let inv = 1.0 / self.bucket_size;
        for (id, agent) in world.agents.iter() {
            let key = (
                (agent.position.x * inv).floor() as i32,
                (agent.position.y * inv).floor() as i32,
                (agent.position.z * inv).floor() as i32,
            );
            self.spatial_grid.entry(key).or_default().push(id);
        }
        self.last_grid_update = world.time;
        self.grid_built = true;
    }

    /// Drop everything: player reference, LOS results, grid, timestamps.
    /// Used on level transition and for test isolation.
    pub fn reset_detection_cache(&mut self) {
        self.cached_player = None;
        self.last_player_refresh = 0.0;
        self.los_cache.clear();
        self.last_los_clear = 0.0;
        self.spatial_grid.clear();
        self.last_grid_update = 0.0;
        self.grid_built = false;
    }

    /// Number of cached LOS entries (diagnostics)
    pub fn los_cache_len(&self) -> usize {
        self.los_cache.len()
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}

//! Tactical repositioning during combat
//!
//! Two planners compute "where should this agent stand": a synchronous
//! decision table (retreat / advance / strafe by fire mode, with jitter and
//! a navigation-validated fallback chain) and a background-task variant
//! that scores candidates across shuffled angular sectors. The background
//! variant runs entirely on a pre-collected snapshot — plain positions and
//! `Arc` facade handles — so it never touches live world state off the
//! simulation thread; its result is drained back on the simulation thread.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;

use crate::ai::{CM_TO_M, M_TO_CM};
use crate::util::vec3::Vec3;
use crate::world::agent::{AgentId, FireMode};
use crate::world::nav::{LineTracer, NavMesh, TraceSubject};
use crate::world::{PlayerId, World};

/// Vertical eye offset for line-of-fire checks, world units (the detection
/// subsystem uses its own, smaller offset)
pub const EYE_HEIGHT_OFFSET: f32 = 60.0;

/// Navigation search extent for candidate projection, world units
pub const DEFAULT_NAV_EXTENT: f32 = 500.0;

/// Base offset for a single reposition move, world units
const MOVE_DISTANCE: f32 = 200.0;

/// Angular jitter applied to every directional choice, degrees
const LATERAL_JITTER_DEG: f32 = 30.0;

/// Fallback arc around the target, degrees each side
const FALLBACK_ARC_DEG: f32 = 60.0;

/// Push strength away from crowding allies, fraction of min enemy distance
const REPULSION_PUSH_FACTOR: f32 = 0.3;

/// Retry attempts when the first candidate has no line of sight
const LOS_RETRY_ATTEMPTS: usize = 4;

/// Angular sectors evaluated by the scored variant
const NUM_SECTORS: usize = 8;

/// Sector jitter, degrees each side
const SECTOR_JITTER_DEG: f32 = 15.0;

/// Tuning for reposition planning. Distances suffixed `_m` are meters;
/// the rest are world units.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RepositioningParams {
    pub min_target_distance_m: f32,
    pub max_target_distance_m: f32,
    pub min_enemy_distance: f32,
    pub reposition_attempts: usize,
    pub cover_detection_radius: f32,
    pub prefer_cover_positions: bool,
    pub burst_fire_distance_m: f32,
    pub auto_fire_distance_m: f32,
}

impl Default for RepositioningParams {
    fn default() -> Self {
        Self {
            min_target_distance_m: 1.0,
            max_target_distance_m: 30.0,
            min_enemy_distance: 250.0,
            reposition_attempts: 8,
            cover_detection_radius: 200.0,
            prefer_cover_positions: true,
            burst_fire_distance_m: 12.0,
            auto_fire_distance_m: 8.0,
        }
    }
}

/// Preferred engagement distance and its variation for a fire mode, meters
fn optimal_distance_for(fire_mode: FireMode, params: &RepositioningParams) -> (f32, f32) {
    match fire_mode {
        FireMode::Single => (20.0, 3.0),
        FireMode::Burst => (params.burst_fire_distance_m, 2.5),
        FireMode::Auto => (params.auto_fire_distance_m, 2.0),
    }
}

/// Project onto the navigation surface with a minimum-height correction:
/// a projected point is never returned below the owner's standing height
/// plus a small margin. An unprojectable point passes through unchanged.
fn project_with_height_floor(nav: &dyn NavMesh, point: Vec3, owner_z: f32) -> Vec3 {
    let extent = Vec3::new(DEFAULT_NAV_EXTENT, DEFAULT_NAV_EXTENT, DEFAULT_NAV_EXTENT);
    match nav.project_point(point, extent) {
        Some(mut projected) => {
            if projected.z < owner_z + 50.0 {
                projected.z = owner_z + 50.0;
            }
            projected
        }
        None => point,
    }
}

/// Eye-to-eye visibility from a candidate position toward the target
fn can_see_target_from(
    tracer: &dyn LineTracer,
    position: Vec3,
    target_position: Vec3,
    target: PlayerId,
    ignore: Option<AgentId>,
) -> bool {
    let from = position + Vec3::UNIT_Z * EYE_HEIGHT_OFFSET;
    let to = target_position + Vec3::UNIT_Z * EYE_HEIGHT_OFFSET;
    match tracer.trace_visibility(from, to, ignore) {
        None => true,
        Some(hit) => hit.subject == TraceSubject::Player(target),
    }
}

/// Is there cover geometry close to this position? Checks the four
/// cardinal directions only.
fn is_position_near_cover(tracer: &dyn LineTracer, position: Vec3, cover_radius: f32) -> bool {
    const DIRECTIONS: [Vec3; 4] = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
    ];
    let eye = position + Vec3::UNIT_Z * EYE_HEIGHT_OFFSET;
    DIRECTIONS.iter().any(|dir| {
        tracer
            .trace_visibility(eye, eye + *dir * cover_radius, None)
            .map(|hit| hit.is_cover())
            .unwrap_or(false)
    })
}

/// Distance-weighted repulsion away from nearby allies, applied at a
/// fraction of the minimum spacing. Coincident positions contribute
/// nothing. Returns the pushed position, unprojected.
fn push_away_from_enemies(base: Vec3, enemy_positions: &[Vec3], min_distance: f32) -> Vec3 {
    let mut repulsion = Vec3::ZERO;
    for enemy in enemy_positions {
        let offset = base - *enemy;
        let distance = offset.length();
        if distance < min_distance && distance > 0.0 {
            repulsion += offset.normalize() * (1.0 - distance / min_distance);
        }
    }
    if repulsion.is_nearly_zero(1.0e-4) {
        base
    } else {
        base + repulsion.normalize() * (min_distance * REPULSION_PUSH_FACTOR)
    }
}

/// Cardinal move choices of the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveChoice {
    Forward,
    Backward,
    Left,
    Right,
}

fn choice_offset(choice: MoveChoice, to_target: Vec3, right: Vec3) -> Vec3 {
    match choice {
        MoveChoice::Forward => to_target * MOVE_DISTANCE,
        MoveChoice::Backward => -to_target * MOVE_DISTANCE,
        MoveChoice::Left => -right * MOVE_DISTANCE,
        MoveChoice::Right => right * MOVE_DISTANCE,
    }
}

fn random_cardinal(rng: &mut impl Rng) -> MoveChoice {
    match rng.gen_range(0..4) {
        0 => MoveChoice::Forward,
        1 => MoveChoice::Backward,
        2 => MoveChoice::Left,
        _ => MoveChoice::Right,
    }
}

/// Synchronous reposition target computation.
///
/// Decision table: retreat when inside the minimum distance, advance when
/// beyond the maximum, otherwise strafe/advance tactics picked by the fire
/// mode with bounded random jitter. The candidate is nav-projected, given
/// up to four randomized line-of-sight retries, falls back to an arc
/// around the target, and is finally pushed off nearby allies.
///
/// Invalid handles fail immediately with a zero vector and a log line.
pub fn calculate_reposition_target(
    world: &World,
    agent_id: AgentId,
    target: PlayerId,
    current_distance_m: f32,
    fire_mode: FireMode,
    params: &RepositioningParams,
) -> Vec3 {
    let Some(agent) = world.agents.get(agent_id) else {
        tracing::error!(%agent_id, "reposition requested for stale agent handle");
        return Vec3::ZERO;
    };
    let Some(player) = world.player(target) else {
        tracing::error!(%agent_id, target, "reposition requested against invalid player");
        return Vec3::ZERO;
    };

    let mut rng = rand::thread_rng();
    let agent_pos = agent.position;
    let player_pos = player.position;
    let to_target = (player_pos - agent_pos).horizontal().normalize();
    let right = to_target.cross(Vec3::UNIT_Z).normalize();
    let has_clear_los = can_see_target_from(
        world.tracer.as_ref(),
        agent_pos,
        player_pos,
        target,
        Some(agent_id),
    );

    let choice = if current_distance_m < params.min_target_distance_m {
        MoveChoice::Backward
    } else if current_distance_m > params.max_target_distance_m {
        MoveChoice::Forward
    } else {
        match fire_mode {
            FireMode::Single => {
                // Stable position preferred; strafe, but fall forward when
                // sight is blocked or on a coin flip for unpredictability
                if !has_clear_los || rng.gen_bool(0.5) {
                    MoveChoice::Forward
                } else if rng.gen_bool(0.5) {
                    MoveChoice::Left
                } else {
                    MoveChoice::Right
                }
            }
            FireMode::Burst => {
                if !has_clear_los {
                    MoveChoice::Forward
                } else if rng.gen_bool(0.5) {
                    MoveChoice::Left
                } else {
                    MoveChoice::Right
                }
            }
            FireMode::Auto => {
                if current_distance_m < params.auto_fire_distance_m {
                    // Close-quarters auto fire: back off or slide sideways
                    match rng.gen_range(1..4) {
                        1 => MoveChoice::Backward,
                        2 => MoveChoice::Left,
                        _ => MoveChoice::Right,
                    }
                } else {
                    let pick = random_cardinal(&mut rng);
                    if !has_clear_los {
                        MoveChoice::Forward
                    } else {
                        pick
                    }
                }
            }
        }
    };

    // Bounded angular jitter so strafing is never perfectly predictable
    let jitter = rng
        .gen_range(-LATERAL_JITTER_DEG..LATERAL_JITTER_DEG)
        .to_radians();
    let offset = choice_offset(choice, to_target, right)
        .rotate_z(jitter)
        .normalize()
        * MOVE_DISTANCE;

    let nav = world.nav.as_ref();
    let tracer = world.tracer.as_ref();
    let mut candidate = project_with_height_floor(nav, agent_pos + offset, agent_pos.z);

    // Retry in randomized directions until the target is visible
    if !can_see_target_from(tracer, candidate, player_pos, target, Some(agent_id)) {
        for _ in 0..LOS_RETRY_ATTEMPTS {
            let retry_offset = choice_offset(random_cardinal(&mut rng), to_target, right);
            let multiplier = rng.gen_range(0.7..1.3);
            let test = project_with_height_floor(
                nav,
                agent_pos + retry_offset * multiplier,
                agent_pos.z,
            );
            if can_see_target_from(tracer, test, player_pos, target, Some(agent_id)) {
                candidate = test;
                break;
            }
        }
    }

    // Last resort: an arc around the target at a clamped optimal distance
    if !can_see_target_from(tracer, candidate, player_pos, target, Some(agent_id)) {
        let optimal_m = (current_distance_m * 0.8).clamp(
            params.min_target_distance_m + 1.0,
            params.max_target_distance_m - 1.0,
        );
        let arc = rng
            .gen_range(-FALLBACK_ARC_DEG..FALLBACK_ARC_DEG)
            .to_radians();
        let direction = (-to_target).rotate_z(arc);
        candidate = project_with_height_floor(
            nav,
            player_pos + direction * optimal_m * M_TO_CM,
            agent_pos.z,
        );
    }

    let others = world.agents.live_positions(Some(agent_id));
    let pushed = push_away_from_enemies(candidate, &others, params.min_enemy_distance);
    if pushed != candidate {
        candidate = project_with_height_floor(nav, pushed, agent_pos.z);
    }

    tracing::debug!(%agent_id, ?choice, ?candidate, "reposition target computed");
    candidate
}

// ============================================================================
// Background-task variant
// ============================================================================

/// Everything the scored calculation needs, captured on the simulation
/// thread before dispatch. Plain data plus facade handles only.
#[derive(Clone)]
pub struct RepositionRequest {
    pub agent_position: Vec3,
    pub target_position: Vec3,
    pub target: PlayerId,
    pub current_distance_m: f32,
    pub fire_mode: FireMode,
    pub params: RepositioningParams,
    pub enemy_positions: Vec<Vec3>,
}

impl RepositionRequest {
    /// Snapshot the world state the task will need. Fails on stale handles.
    pub fn capture(
        world: &World,
        agent_id: AgentId,
        target: PlayerId,
        params: RepositioningParams,
    ) -> Option<Self> {
        let agent = world.agents.get(agent_id)?;
        let player = world.player(target)?;
        Some(Self {
            agent_position: agent.position,
            target_position: player.position,
            target,
            current_distance_m: agent.position.distance_to(player.position) * CM_TO_M,
            fire_mode: agent.weapon.fire_mode,
            params,
            enemy_positions: world.agents.live_positions(Some(agent_id)),
        })
    }
}

/// Outcome of a reposition calculation
#[derive(Debug, Clone, Serialize)]
pub struct RepositionResult {
    pub success: bool,
    pub target_position: Vec3,
    pub debug_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Pending,
    Delivered,
    Cancelled,
}

/// Handle to an in-flight background calculation. Poll `try_result` from
/// the simulation thread; completion handlers must run there because they
/// touch live agents.
pub struct RepositionTask {
    rx: Receiver<RepositionResult>,
    status: Arc<Mutex<TaskStatus>>,
}

impl RepositionTask {
    /// Non-blocking poll. `Some` exactly once on completion; `None` after
    /// cancellation even when a late result arrived.
    pub fn try_result(&mut self) -> Option<RepositionResult> {
        {
            let status = self.status.lock();
            if *status != TaskStatus::Pending {
                return None;
            }
        }
        match self.rx.try_recv() {
            Ok(result) => {
                *self.status.lock() = TaskStatus::Delivered;
                Some(result)
            }
            Err(_) => None,
        }
    }

    /// Discard the task. In-flight work is not interrupted; its eventual
    /// result is dropped. Returns the synthesized failure outcome.
    pub fn cancel(&mut self) -> RepositionResult {
        *self.status.lock() = TaskStatus::Cancelled;
        RepositionResult {
            success: false,
            target_position: Vec3::ZERO,
            debug_info: "task cancelled".to_string(),
        }
    }
}

/// Run the scored calculation on the background pool. The snapshot plus
/// `Send + Sync` facades make the worker independent of world state.
pub fn dispatch_reposition(
    request: RepositionRequest,
    nav: Arc<dyn NavMesh>,
    tracer: Arc<dyn LineTracer>,
) -> RepositionTask {
    let (tx, rx) = bounded(1);
    let status = Arc::new(Mutex::new(TaskStatus::Pending));
    let worker_status = Arc::clone(&status);

    rayon::spawn(move || {
        let result = execute_scored_calculation(&request, nav.as_ref(), tracer.as_ref());
        if *worker_status.lock() == TaskStatus::Cancelled {
            return;
        }
        let _ = tx.send(result);
    });

    RepositionTask { rx, status }
}

/// Sector-based candidate scoring. Evaluates up to eight shuffled angular
/// sectors around the target, scores navigable candidates by line of
/// sight, distance-from-optimal, cover proximity and direction change,
/// and returns the best one (or a random-direction fallback).
fn execute_scored_calculation(
    request: &RepositionRequest,
    nav: &dyn NavMesh,
    tracer: &dyn LineTracer,
) -> RepositionResult {
    let mut rng = rand::thread_rng();
    let params = &request.params;

    let (base_optimal, variation) = optimal_distance_for(request.fire_mode, params);
    let optimal_m = base_optimal + rng.gen_range(-variation..variation);

    let mut sectors: Vec<f32> = (0..NUM_SECTORS)
        .map(|i| i as f32 * 360.0 / NUM_SECTORS as f32)
        .collect();
    // Fisher-Yates shuffle for unpredictable search order
    for i in 0..sectors.len() {
        let j = rng.gen_range(i..sectors.len());
        sectors.swap(i, j);
    }

    let attempts = request.params.reposition_attempts.min(NUM_SECTORS);
    let mut best: Option<(Vec3, f32)> = None;
    let mut valid = 0usize;
    let mut with_los = 0usize;
    let mut near_cover = 0usize;

    let extent = Vec3::new(DEFAULT_NAV_EXTENT, DEFAULT_NAV_EXTENT, DEFAULT_NAV_EXTENT);
    let current_dir = (request.agent_position - request.target_position)
        .horizontal()
        .normalize();

    for i in 0..attempts {
        let base_angle = sectors[i % sectors.len()];
        let angle = (base_angle + rng.gen_range(-SECTOR_JITTER_DEG..SECTOR_JITTER_DEG)).to_radians();
        let mut direction = Vec3::from_yaw(angle);

        // Occasional vertical spread for multi-level layouts
        if i % 4 == 0 && rng.gen_bool(0.5) {
            direction.z = rng.gen_range(-100.0..100.0) / (optimal_m * M_TO_CM);
        }

        let distance_mod = rng.gen_range(0.8..1.2);
        let raw = request.target_position + direction * optimal_m * M_TO_CM * distance_mod;

        let Some(projected) = nav.project_point(raw, extent) else {
            continue;
        };
        let candidate =
            project_with_height_floor(nav, projected, request.agent_position.z);
        valid += 1;

        let has_los = can_see_target_from(
            tracer,
            candidate,
            request.target_position,
            request.target,
            None,
        );
        let mut score = 0.0;
        if has_los {
            score += 50.0;
            with_los += 1;
        }

        let distance_diff =
            (candidate.distance_to(request.target_position) * CM_TO_M - optimal_m).abs();
        score -= distance_diff * 5.0;

        if params.prefer_cover_positions
            && is_position_near_cover(tracer, candidate, params.cover_detection_radius)
        {
            score += 30.0;
            near_cover += 1;
            if has_los {
                score += 20.0;
            }
        }

        // Reward ending up on the far side of the target
        let new_dir = (candidate - request.target_position).horizontal().normalize();
        let dot = current_dir.dot(new_dir);
        if dot < 0.0 {
            score += 15.0 * dot.abs();
        }

        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((candidate, score));
        }
    }

    let mut debug_info = format!(
        "optimal={optimal_m:.1}m fire_mode={:?} attempts={attempts} valid={valid} with_los={with_los} near_cover={near_cover}",
        request.fire_mode
    );

    let position = match best {
        Some((pos, score)) => {
            debug_info.push_str(&format!(" best_score={score:.1}"));
            pos
        }
        None => {
            debug_info.push_str(" fallback=random");
            let direction = Vec3::from_yaw(rng.gen_range(0.0..std::f32::consts::TAU));
            request.target_position + direction * optimal_m * M_TO_CM
        }
    };

    let pushed =
        push_away_from_enemies(position, &request.enemy_positions, params.min_enemy_distance);
    let position = if pushed != position {
        project_with_height_floor(nav, pushed, request.agent_position.z)
    } else {
        position
    };

    RepositionResult {
        success: true,
        target_position: position,
        debug_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::agent::EnemyAgent;
    use crate::world::PlayerPawn;
    use std::time::Duration;

    fn combat_world(agent_pos: Vec3, player_pos: Vec3) -> (World, AgentId) {
        let mut world = World::with_flat_ground();
        world.players.push(PlayerPawn::at(player_pos));
        let id = world.agents.spawn(EnemyAgent::new(agent_pos));
        (world, id)
    }

    #[test]
    fn test_invalid_agent_returns_zero() {
        let (mut world, id) = combat_world(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));
        world.agents.despawn(id);

        let result = calculate_reposition_target(
            &world,
            id,
            0,
            10.0,
            FireMode::Single,
            &RepositioningParams::default(),
        );
        assert_eq!(result, Vec3::ZERO);
    }

    #[test]
    fn test_invalid_player_returns_zero() {
        let (world, id) = combat_world(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));
        let result = calculate_reposition_target(
            &world,
            id,
            7,
            10.0,
            FireMode::Single,
            &RepositioningParams::default(),
        );
        assert_eq!(result, Vec3::ZERO);
    }

    #[test]
    fn test_too_close_retreats() {
        // Agent 0.5 m from the player: must back away
        let (world, id) = combat_world(Vec3::new(50.0, 0.0, 0.0), Vec3::ZERO);
        let params = RepositioningParams::default();

        for _ in 0..10 {
            let result =
                calculate_reposition_target(&world, id, 0, 0.5, FireMode::Single, &params);
            let old_dist = 50.0;
            let new_dist = result.horizontal().distance_to(Vec3::ZERO);
            assert!(new_dist > old_dist, "retreat went inward: {new_dist}");
        }
    }

    #[test]
    fn test_too_far_advances() {
        // Agent 40 m out with a 30 m maximum: must close in
        let (world, id) = combat_world(Vec3::new(4000.0, 0.0, 0.0), Vec3::ZERO);
        let params = RepositioningParams::default();

        for _ in 0..10 {
            let result =
                calculate_reposition_target(&world, id, 0, 40.0, FireMode::Burst, &params);
            let new_dist = result.horizontal().distance_to(Vec3::ZERO);
            assert!(new_dist < 4000.0, "advance went outward: {new_dist}");
        }
    }

    #[test]
    fn test_height_floor_applied() {
        let (world, id) = combat_world(Vec3::new(1000.0, 0.0, 0.0), Vec3::ZERO);
        let result = calculate_reposition_target(
            &world,
            id,
            0,
            10.0,
            FireMode::Auto,
            &RepositioningParams::default(),
        );
        // The flat plane projects to z=0 and the floor lifts it to
        // owner z + 50
        assert!((result.z - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_push_away_from_enemies() {
        let enemies = vec![Vec3::new(100.0, 0.0, 0.0)];
        let pushed = push_away_from_enemies(Vec3::ZERO, &enemies, 250.0);
        // Pushed along -X, away from the ally
        assert!(pushed.x < 0.0);
        assert!((pushed.length() - 250.0 * 0.3).abs() < 1e-3);
    }

    #[test]
    fn test_push_ignores_coincident() {
        let enemies = vec![Vec3::ZERO];
        let pushed = push_away_from_enemies(Vec3::ZERO, &enemies, 250.0);
        assert_eq!(pushed, Vec3::ZERO);
    }

    #[test]
    fn test_push_noop_when_clear() {
        let enemies = vec![Vec3::new(10_000.0, 0.0, 0.0)];
        let base = Vec3::new(5.0, 5.0, 0.0);
        assert_eq!(push_away_from_enemies(base, &enemies, 250.0), base);
    }

    #[test]
    fn test_async_task_completes() {
        let (world, id) = combat_world(Vec3::new(1500.0, 0.0, 0.0), Vec3::ZERO);
        let request =
            RepositionRequest::capture(&world, id, 0, RepositioningParams::default()).unwrap();
        let mut task = dispatch_reposition(request, world.nav.clone(), world.tracer.clone());

        let mut result = None;
        for _ in 0..200 {
            if let Some(r) = task.try_result() {
                result = Some(r);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let result = result.expect("task did not complete");
        assert!(result.success);
        // Candidate is on the plane, lifted by the height floor
        assert!((result.target_position.z - 50.0).abs() < 1e-3);
        // And within sane range of the target for any fire mode
        let dist_m = result.target_position.horizontal().distance_to(Vec3::ZERO) * CM_TO_M;
        assert!(dist_m > 1.0 && dist_m < 45.0, "distance {dist_m} m");
        // Delivered exactly once
        assert!(task.try_result().is_none());
    }

    #[test]
    fn test_async_capture_fails_on_stale_agent() {
        let (mut world, id) = combat_world(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));
        world.agents.despawn(id);
        assert!(
            RepositionRequest::capture(&world, id, 0, RepositioningParams::default()).is_none()
        );
    }

    #[test]
    fn test_cancel_discards_late_result() {
        let (world, id) = combat_world(Vec3::new(1500.0, 0.0, 0.0), Vec3::ZERO);
        let request =
            RepositionRequest::capture(&world, id, 0, RepositioningParams::default()).unwrap();
        let mut task = dispatch_reposition(request, world.nav.clone(), world.tracer.clone());

        let outcome = task.cancel();
        assert!(!outcome.success);
        assert_eq!(outcome.target_position, Vec3::ZERO);

        // Even if the worker finished, the result stays discarded
        std::thread::sleep(Duration::from_millis(50));
        assert!(task.try_result().is_none());
    }

    #[test]
    fn test_optimal_distance_by_fire_mode() {
        let params = RepositioningParams::default();
        assert_eq!(optimal_distance_for(FireMode::Single, &params).0, 20.0);
        assert_eq!(optimal_distance_for(FireMode::Burst, &params).0, 12.0);
        assert_eq!(optimal_distance_for(FireMode::Auto, &params).0, 8.0);
    }
}

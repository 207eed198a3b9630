//! The concrete enemy behavior states
//!
//! Patrol loop: Idle -> (timeout) -> Patrol -> (arrival) -> Idle, broken
//! by detection into Chase -> Attack and unwound through Return. Each
//! living state runs its perception check at the agent's LOD-driven
//! interval, so distant agents look for the player far less often.

use rand::Rng;

use crate::ai::crowd::NAV_SEARCH_EXTENT;
use crate::ai::fsm::{
    EnemyEvent, EnemyState, FsmCore, FsmEvent, StateId, TimerKey,
};
use crate::ai::reposition::{
    calculate_reposition_target, dispatch_reposition, RepositionRequest, RepositionTask,
    RepositioningParams,
};
use crate::ai::{AiContext, CM_TO_M};
use crate::util::vec3::Vec3;
use crate::world::agent::AgentId;

/// Facing interpolation speed while attacking from a standstill
const ATTACK_FACING_SPEED: f32 = 10.0;

/// Patrol destinations are picked at least this fraction of the radius out
const PATROL_MIN_RADIUS_FRACTION: f32 = 0.3;

/// Random patrol picks before falling back to the corner ring
const PATROL_PICK_ATTEMPTS: usize = 4;

/// Build the state object for a configured state id
pub fn create_state(id: StateId) -> Box<dyn EnemyState> {
    match id {
        StateId::Idle => Box::new(IdleState::default()),
        StateId::Patrol => Box::new(PatrolState::default()),
        StateId::Chase => Box::new(ChaseState::default()),
        StateId::Attack => Box::new(AttackState::default()),
        StateId::Return => Box::new(ReturnState::default()),
        StateId::Dead => Box::new(DeadState),
    }
}

/// Straight trace from the muzzle socket to the target's center mass
fn has_clear_line_of_fire(
    world: &crate::world::World,
    muzzle: Vec3,
    player_pos: Vec3,
    player: crate::world::PlayerId,
) -> bool {
    let aim = player_pos + Vec3::UNIT_Z * 50.0;
    match world.tracer.trace_visibility(muzzle, aim, None) {
        None => true,
        Some(hit) => hit.subject == crate::world::nav::TraceSubject::Player(player),
    }
}

/// Run the detection check at the agent's perception cadence; queues a
/// `PlayerSeen` event (with the player as source) on a positive result.
fn perceive_player(
    agent: AgentId,
    last_check: &mut f64,
    core: &mut FsmCore,
    ctx: &mut AiContext,
) -> bool {
    let now = ctx.world.time;
    let interval = ctx
        .world
        .agents
        .get(agent)
        .map(|a| a.perception_interval)
        .unwrap_or(0.5) as f64;
    if now - *last_check < interval {
        return false;
    }
    *last_check = now;

    let sight_radius = core.config.sight_radius_m;
    let sight_angle = core.config.sight_angle_deg;
    if ctx
        .detection
        .is_player_detectable(ctx.world, agent, sight_radius, sight_angle, true)
    {
        if let Some(player) = ctx.detection.player_character(ctx.world) {
            core.enqueue_event(FsmEvent::from_player(EnemyEvent::PlayerSeen, player));
            return true;
        }
    }
    false
}

// ============================================================================
// Idle
// ============================================================================

#[derive(Debug, Default)]
pub struct IdleState {
    last_perception: f64,
}

impl EnemyState for IdleState {
    fn id(&self) -> StateId {
        StateId::Idle
    }

    fn on_enter(&mut self, agent: AgentId, core: &mut FsmCore, ctx: &mut AiContext) {
        ctx.crowd.stop_agent(ctx.world, agent);
        let idle_time = core.config.idle_time;
        core.start_timer(TimerKey::IdleTimeout, idle_time, ctx.world.time);
        self.last_perception = 0.0;
    }

    fn on_exit(&mut self, _agent: AgentId, core: &mut FsmCore, _ctx: &mut AiContext) {
        core.stop_timer(TimerKey::IdleTimeout);
    }

    fn on_tick(&mut self, agent: AgentId, _dt: f32, core: &mut FsmCore, ctx: &mut AiContext) {
        perceive_player(agent, &mut self.last_perception, core, ctx);
    }
}

// ============================================================================
// Patrol
// ============================================================================

#[derive(Debug, Default)]
pub struct PatrolState {
    last_perception: f64,
}

impl PatrolState {
    /// Random reachable point around the spawn anchor, with a fixed corner
    /// ring as the fallback when random picks keep missing the navmesh
    fn pick_patrol_point(spawn: Vec3, radius: f32, ctx: &AiContext) -> Option<Vec3> {
        let mut rng = rand::thread_rng();

        for _ in 0..PATROL_PICK_ATTEMPTS {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let distance = rng.gen_range(radius * PATROL_MIN_RADIUS_FRACTION..radius);
            let candidate = spawn + Vec3::from_yaw(angle) * distance;
            if let Some(projected) = ctx.world.nav.project_point(candidate, NAV_SEARCH_EXTENT) {
                return Some(projected);
            }
        }

        let corners = [
            spawn + Vec3::new(radius, radius, 0.0),
            spawn + Vec3::new(-radius, radius, 0.0),
            spawn + Vec3::new(-radius, -radius, 0.0),
            spawn + Vec3::new(radius, -radius, 0.0),
        ];
        corners
            .into_iter()
            .find_map(|corner| ctx.world.nav.project_point(corner, NAV_SEARCH_EXTENT))
    }
}

impl EnemyState for PatrolState {
    fn id(&self) -> StateId {
        StateId::Patrol
    }

    fn on_enter(&mut self, agent: AgentId, core: &mut FsmCore, ctx: &mut AiContext) {
        let Some(state) = ctx.world.agents.get(agent) else {
            return;
        };
        let spawn = state.spawn_point;
        let radius = core
            .config
            .patrol_radius
            .min(core.config.max_patrol_distance * 0.5);

        match Self::pick_patrol_point(spawn, radius, ctx) {
            Some(point) => ctx.crowd.request_agent_move(agent, point),
            None => {
                tracing::warn!(%agent, "no reachable patrol point around spawn");
            }
        }
        self.last_perception = 0.0;
    }

    fn on_tick(&mut self, agent: AgentId, _dt: f32, core: &mut FsmCore, ctx: &mut AiContext) {
        if perceive_player(agent, &mut self.last_perception, core, ctx) {
            return;
        }

        // Leash: a patrol that drifted too far from its anchor turns back
        if let Some(state) = ctx.world.agents.get(agent) {
            if state.position.distance_to(state.spawn_point) > core.config.max_patrol_distance {
                core.enqueue_event(FsmEvent::new(EnemyEvent::LeashBroken));
            }
        }
    }
}

// ============================================================================
// Chase
// ============================================================================

#[derive(Debug, Default)]
pub struct ChaseState {
    last_repath: f64,
    lost_sight_since: Option<f64>,
}

impl EnemyState for ChaseState {
    fn id(&self) -> StateId {
        StateId::Chase
    }

    fn on_enter(&mut self, _agent: AgentId, _core: &mut FsmCore, _ctx: &mut AiContext) {
        self.last_repath = f64::NEG_INFINITY;
        self.lost_sight_since = None;
    }

    fn on_tick(&mut self, agent: AgentId, _dt: f32, core: &mut FsmCore, ctx: &mut AiContext) {
        let now = ctx.world.time;
        let Some(player_id) = ctx.detection.player_character(ctx.world) else {
            core.enqueue_event(FsmEvent::new(EnemyEvent::TargetLost));
            return;
        };
        let Some(player_pos) = ctx.world.player(player_id).map(|p| p.position) else {
            core.enqueue_event(FsmEvent::new(EnemyEvent::TargetLost));
            return;
        };
        let Some(agent_pos) = ctx.world.agents.get(agent).map(|a| a.position) else {
            return;
        };

        let distance_m = agent_pos.distance_to(player_pos) * CM_TO_M;
        if distance_m <= core.config.attack_range_m {
            core.enqueue_event(FsmEvent::from_player(EnemyEvent::TargetInRange, player_id));
            return;
        }

        if now - self.last_repath >= core.config.chase_repath_interval as f64 {
            ctx.crowd.request_agent_move(agent, player_pos);
            self.last_repath = now;
        }

        if ctx.detection.has_line_of_sight(ctx.world, agent, player_id) {
            self.lost_sight_since = None;
        } else {
            match self.lost_sight_since {
                None => self.lost_sight_since = Some(now),
                Some(since) if now - since > core.config.lost_sight_timeout as f64 => {
                    core.enqueue_event(FsmEvent::new(EnemyEvent::TargetLost));
                }
                Some(_) => {}
            }
        }
    }
}

// ============================================================================
// Attack
// ============================================================================

#[derive(Default)]
pub struct AttackState {
    last_shot: f64,
    last_reposition: f64,
    pending: Option<RepositionTask>,
    params: RepositioningParams,
}

impl std::fmt::Debug for AttackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttackState")
            .field("last_shot", &self.last_shot)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

impl EnemyState for AttackState {
    fn id(&self) -> StateId {
        StateId::Attack
    }

    fn on_enter(&mut self, agent: AgentId, core: &mut FsmCore, ctx: &mut AiContext) {
        ctx.crowd.stop_agent(ctx.world, agent);
        let now = ctx.world.time;
        // First shot shortly after engaging; first reposition one full
        // interval later
        self.last_shot = now - core.config.shot_interval as f64 * 0.5;
        self.last_reposition = now;
    }

    fn on_exit(&mut self, _agent: AgentId, _core: &mut FsmCore, _ctx: &mut AiContext) {
        if let Some(mut task) = self.pending.take() {
            task.cancel();
        }
    }

    fn on_event(
        &mut self,
        agent: AgentId,
        event: FsmEvent,
        _core: &mut FsmCore,
        ctx: &mut AiContext,
    ) {
        // Getting hit breaks the stance right away: a quick synchronous
        // sidestep instead of waiting for the scored background pass
        if event.kind == EnemyEvent::TookDamage {
            let Some(player_id) = ctx.detection.player_character(ctx.world) else {
                return;
            };
            let (fire_mode, distance_m) = match (
                ctx.world.agents.get(agent),
                ctx.world.player(player_id),
            ) {
                (Some(state), Some(player)) => (
                    state.weapon.fire_mode,
                    state.position.distance_to(player.position) * CM_TO_M,
                ),
                _ => return,
            };
            let target = calculate_reposition_target(
                ctx.world,
                agent,
                player_id,
                distance_m,
                fire_mode,
                &self.params,
            );
            if !target.is_nearly_zero(1.0e-4) {
                ctx.crowd.request_agent_move(agent, target);
            }
        }
    }

    fn on_tick(&mut self, agent: AgentId, dt: f32, core: &mut FsmCore, ctx: &mut AiContext) {
        let now = ctx.world.time;
        let Some(player_id) = ctx.detection.player_character(ctx.world) else {
            core.enqueue_event(FsmEvent::new(EnemyEvent::TargetLost));
            return;
        };
        let Some(player_pos) = ctx.world.player(player_id).map(|p| p.position) else {
            core.enqueue_event(FsmEvent::new(EnemyEvent::TargetLost));
            return;
        };

        let Some(state) = ctx.world.agents.get_mut(agent) else {
            return;
        };
        let agent_pos = state.position;
        let to_player = (player_pos - agent_pos).horizontal().normalize();
        if !to_player.is_nearly_zero(1.0e-4) {
            state.forward = state
                .forward
                .interp_to(to_player, dt, ATTACK_FACING_SPEED)
                .normalize();
        }
        let muzzle = state.muzzle_location();

        let distance_m = agent_pos.distance_to(player_pos) * CM_TO_M;
        if distance_m > core.config.attack_range_m * 1.2 {
            core.enqueue_event(FsmEvent::from_player(EnemyEvent::TargetOutOfRange, player_id));
        }

        // Drain a finished reposition task; its callback runs here, on the
        // simulation thread, because it touches live agent state
        if let Some(task) = self.pending.as_mut() {
            if let Some(result) = task.try_result() {
                self.pending = None;
                if result.success {
                    ctx.crowd.request_agent_move(agent, result.target_position);
                    tracing::debug!(%agent, info = %result.debug_info, "reposition applied");
                } else {
                    tracing::debug!(%agent, info = %result.debug_info, "reposition failed");
                }
            }
        }

        if self.pending.is_none()
            && now - self.last_reposition >= core.config.reposition_interval as f64
        {
            if let Some(request) = RepositionRequest::capture(ctx.world, agent, player_id, self.params)
            {
                self.pending = Some(dispatch_reposition(
                    request,
                    ctx.world.nav.clone(),
                    ctx.world.tracer.clone(),
                ));
                self.last_reposition = now;
            }
        }

        // Line of fire is traced from the muzzle socket, not eye height;
        // the cached eye-level LOS can disagree near low cover
        if now - self.last_shot >= core.config.shot_interval as f64
            && has_clear_line_of_fire(ctx.world, muzzle, player_pos, player_id)
        {
            self.last_shot = now;
            if let Some(state) = ctx.world.agents.get_mut(agent) {
                state.shots_fired += 1;
                tracing::debug!(%agent, total = state.shots_fired, distance_m, "shot fired");
            }
        }
    }
}

// ============================================================================
// Return
// ============================================================================

#[derive(Debug, Default)]
pub struct ReturnState {
    last_perception: f64,
}

impl EnemyState for ReturnState {
    fn id(&self) -> StateId {
        StateId::Return
    }

    fn on_enter(&mut self, agent: AgentId, _core: &mut FsmCore, ctx: &mut AiContext) {
        if let Some(spawn) = ctx.world.agents.get(agent).map(|a| a.spawn_point) {
            ctx.crowd.request_agent_move(agent, spawn);
        }
        self.last_perception = 0.0;
    }

    fn on_event(
        &mut self,
        _agent: AgentId,
        event: FsmEvent,
        core: &mut FsmCore,
        _ctx: &mut AiContext,
    ) {
        if event.kind == EnemyEvent::ReachedTarget {
            core.enqueue_event(FsmEvent::new(EnemyEvent::ReturnComplete));
        }
    }

    fn on_tick(&mut self, agent: AgentId, _dt: f32, core: &mut FsmCore, ctx: &mut AiContext) {
        perceive_player(agent, &mut self.last_perception, core, ctx);
    }
}

// ============================================================================
// Dead
// ============================================================================

#[derive(Debug)]
pub struct DeadState;

impl EnemyState for DeadState {
    fn id(&self) -> StateId {
        StateId::Dead
    }

    fn on_enter(&mut self, agent: AgentId, _core: &mut FsmCore, ctx: &mut AiContext) {
        ctx.crowd.stop_agent(ctx.world, agent);
        tracing::debug!(%agent, "entered terminal state");
    }

    fn on_tick(&mut self, _agent: AgentId, _dt: f32, _core: &mut FsmCore, _ctx: &mut AiContext) {}
}

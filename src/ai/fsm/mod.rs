//! Per-agent finite state machines
//!
//! Each enemy runs one [`FsmInstance`] built from a [`BehaviorConfig`]: a
//! set of state objects, a flattened `(state, event) -> target` transition
//! map, an external event queue and sim-clock timers. The instance is
//! driven exclusively through [`FsmInstance::master_tick`], invoked by the
//! global scheduler; events raised while a tick is in flight are queued and
//! drained in order rather than processed recursively.

pub mod states;

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::ai::AiContext;
use crate::world::agent::AgentId;
use crate::world::PlayerId;

/// External and internal stimuli the state machines react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyEvent {
    PlayerSeen,
    TookDamage,
    Died,
    ReachedTarget,
    IdleTimeout,
    ReturnComplete,
    TargetInRange,
    TargetOutOfRange,
    TargetLost,
    LeashBroken,
}

/// Who caused an event, when known
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventSource {
    Player(PlayerId),
    Agent(AgentId),
}

/// An event plus its optional instigator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsmEvent {
    pub kind: EnemyEvent,
    pub source: Option<EventSource>,
}

impl FsmEvent {
    pub fn new(kind: EnemyEvent) -> Self {
        Self { kind, source: None }
    }

    pub fn from_player(kind: EnemyEvent, player: PlayerId) -> Self {
        Self {
            kind,
            source: Some(EventSource::Player(player)),
        }
    }
}

/// The behavior states an enemy can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Idle,
    Patrol,
    Chase,
    Attack,
    Return,
    Dead,
}

/// One edge of the behavior graph
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub event: EnemyEvent,
    pub target: StateId,
    /// Seconds to wait before the state change is performed
    pub delay: f32,
}

impl Transition {
    pub fn immediate(event: EnemyEvent, target: StateId) -> Self {
        Self {
            event,
            target,
            delay: 0.0,
        }
    }

    pub fn delayed(event: EnemyEvent, target: StateId, delay: f32) -> Self {
        Self {
            event,
            target,
            delay,
        }
    }
}

/// A state plus its outgoing transitions
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub id: StateId,
    pub transitions: Vec<Transition>,
}

/// Behavior asset: the state graph and the tuning values states read.
/// Shared across every agent spawned from the same archetype.
#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    pub initial_state: StateId,
    pub states: Vec<StateConfig>,
    /// Seconds standing still before patrol resumes
    pub idle_time: f32,
    /// Patrol point distance from the spawn point, world units
    pub patrol_radius: f32,
    /// Leash: beyond this distance from spawn the agent turns back
    pub max_patrol_distance: f32,
    /// Detection radius, meters
    pub sight_radius_m: f32,
    /// Detection cone, degrees
    pub sight_angle_deg: f32,
    /// Attack engagement range, meters
    pub attack_range_m: f32,
    /// Seconds between chase path refreshes
    pub chase_repath_interval: f32,
    /// Seconds without sight of the target before the chase is abandoned
    pub lost_sight_timeout: f32,
    /// Seconds between shots while attacking
    pub shot_interval: f32,
    /// Seconds between repositioning attempts while attacking
    pub reposition_interval: f32,
}

impl BehaviorConfig {
    /// Default soldier behavior graph
    pub fn standard() -> Arc<Self> {
        use EnemyEvent::*;
        use StateId::*;

        let mut config = Self {
            initial_state: Idle,
            states: vec![
                StateConfig {
                    id: Idle,
                    transitions: vec![
                        Transition::immediate(IdleTimeout, Patrol),
                        Transition::immediate(PlayerSeen, Chase),
                        Transition::immediate(TookDamage, Chase),
                        Transition::immediate(Died, Dead),
                    ],
                },
                StateConfig {
                    id: Patrol,
                    transitions: vec![
                        Transition::immediate(ReachedTarget, Idle),
                        Transition::immediate(PlayerSeen, Chase),
                        Transition::immediate(TookDamage, Chase),
                        Transition::immediate(LeashBroken, Return),
                        Transition::immediate(Died, Dead),
                    ],
                },
                StateConfig {
                    id: Chase,
                    transitions: vec![
                        Transition::immediate(TargetInRange, Attack),
                        Transition::immediate(TargetLost, Return),
                        Transition::immediate(Died, Dead),
                    ],
                },
                StateConfig {
                    id: Attack,
                    transitions: vec![
                        // Brief hesitation before breaking position to chase
                        Transition::delayed(TargetOutOfRange, Chase, 0.3),
                        Transition::immediate(TargetLost, Return),
                        Transition::immediate(Died, Dead),
                    ],
                },
                StateConfig {
                    id: Return,
                    transitions: vec![
                        Transition::immediate(ReturnComplete, Idle),
                        Transition::immediate(PlayerSeen, Chase),
                        Transition::immediate(TookDamage, Chase),
                        Transition::immediate(Died, Dead),
                    ],
                },
                StateConfig {
                    id: Dead,
                    transitions: vec![],
                },
            ],
            idle_time: 5.0,
            patrol_radius: 500.0,
            max_patrol_distance: 3000.0,
            sight_radius_m: 30.0,
            sight_angle_deg: 120.0,
            attack_range_m: 25.0,
            chase_repath_interval: 0.5,
            lost_sight_timeout: 5.0,
            shot_interval: 1.0,
            reposition_interval: 2.5,
        };
        config.ensure_critical_transitions();
        Arc::new(config)
    }

    /// The graph is unusable without these two edges; repair rather than
    /// reject, matching how behavior assets are validated on load
    pub fn ensure_critical_transitions(&mut self) {
        self.ensure_transition(StateId::Idle, EnemyEvent::IdleTimeout, StateId::Patrol);
        self.ensure_transition(StateId::Return, EnemyEvent::ReturnComplete, StateId::Idle);
    }

    fn ensure_transition(&mut self, from: StateId, event: EnemyEvent, target: StateId) {
        let Some(state) = self.states.iter_mut().find(|s| s.id == from) else {
            return;
        };
        if !state.transitions.iter().any(|t| t.event == event) {
            tracing::warn!(?from, ?event, ?target, "behavior graph missing required transition, adding default");
            state.transitions.push(Transition::immediate(event, target));
        }
    }
}

/// FSM-owned timers, keyed so a restart replaces the previous instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerKey {
    IdleTimeout,
    DelayedTransition(StateId),
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTimer {
    key: TimerKey,
    deadline: f64,
}

/// Everything of the FSM except the state objects themselves; handed to
/// state callbacks so they can queue events and manage timers while their
/// own box is temporarily out of the state map
pub struct FsmCore {
    pub config: Arc<BehaviorConfig>,
    current: StateId,
    transition_map: HashMap<(StateId, EnemyEvent), (StateId, f32)>,
    queue: VecDeque<FsmEvent>,
    timers: Vec<ScheduledTimer>,
}

impl FsmCore {
    pub fn current_state(&self) -> StateId {
        self.current
    }

    pub fn enqueue_event(&mut self, event: FsmEvent) {
        self.queue.push_back(event);
    }

    /// (Re)start a named timer `duration` seconds from `now`
    pub fn start_timer(&mut self, key: TimerKey, duration: f32, now: f64) {
        self.stop_timer(key);
        self.timers.push(ScheduledTimer {
            key,
            deadline: now + duration as f64,
        });
    }

    pub fn stop_timer(&mut self, key: TimerKey) {
        self.timers.retain(|t| t.key != key);
    }

    pub fn has_timer(&self, key: TimerKey) -> bool {
        self.timers.iter().any(|t| t.key == key)
    }

    fn take_due_timers(&mut self, now: f64) -> Vec<TimerKey> {
        let mut due = Vec::new();
        self.timers.retain(|t| {
            if t.deadline <= now {
                due.push(t.key);
                false
            } else {
                true
            }
        });
        due
    }

    fn transition_for(&self, event: EnemyEvent) -> Option<(StateId, f32)> {
        self.transition_map.get(&(self.current, event)).copied()
    }
}

/// Behavior a state must implement. Default bodies make every callback but
/// the tick optional.
pub trait EnemyState: Send + std::fmt::Debug {
    fn id(&self) -> StateId;

    fn on_enter(&mut self, _agent: AgentId, _core: &mut FsmCore, _ctx: &mut AiContext) {}

    fn on_exit(&mut self, _agent: AgentId, _core: &mut FsmCore, _ctx: &mut AiContext) {}

    fn on_event(
        &mut self,
        _agent: AgentId,
        _event: FsmEvent,
        _core: &mut FsmCore,
        _ctx: &mut AiContext,
    ) {
    }

    fn on_timer(&mut self, _agent: AgentId, _key: TimerKey, _core: &mut FsmCore, _ctx: &mut AiContext) {
    }

    fn on_tick(&mut self, agent: AgentId, dt: f32, core: &mut FsmCore, ctx: &mut AiContext);
}

/// Upper bound on events drained per master tick; anything beyond this in
/// one tick indicates an event feedback loop
const MAX_EVENTS_PER_TICK: usize = 16;

/// One agent's state machine
pub struct FsmInstance {
    core: FsmCore,
    states: HashMap<StateId, Box<dyn EnemyState>>,
    entered: bool,
}

impl std::fmt::Debug for FsmInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsmInstance")
            .field("current", &self.core.current)
            .field("queued", &self.core.queue.len())
            .finish()
    }
}

impl FsmInstance {
    pub fn new(config: Arc<BehaviorConfig>) -> Self {
        let mut transition_map = HashMap::new();
        let mut states: HashMap<StateId, Box<dyn EnemyState>> = HashMap::new();

        for state in &config.states {
            states.insert(state.id, states::create_state(state.id));
            for t in &state.transitions {
                transition_map.insert((state.id, t.event), (t.target, t.delay));
            }
        }

        let current = config.initial_state;
        Self {
            core: FsmCore {
                config,
                current,
                transition_map,
                queue: VecDeque::new(),
                timers: Vec::new(),
            },
            states,
            entered: false,
        }
    }

    /// Default soldier FSM
    pub fn standard() -> Self {
        Self::new(BehaviorConfig::standard())
    }

    pub fn current_state(&self) -> StateId {
        self.core.current
    }

    /// Inject an external event; processed on the next master tick
    pub fn enqueue_event(&mut self, event: FsmEvent) {
        self.core.enqueue_event(event);
    }

    /// Drive this machine for one scheduler slot: enter the initial state
    /// on first contact, fire due timers, drain the event queue, then tick
    /// the active state.
    pub fn master_tick(&mut self, agent: AgentId, dt: f32, ctx: &mut AiContext) {
        if !ctx.world.agents.contains(agent) {
            return;
        }

        if !self.entered {
            self.entered = true;
            let current = self.core.current;
            self.with_state(current, ctx, |state, core, ctx| {
                state.on_enter(agent, core, ctx);
            });
        }

        // A dead agent that never received its event still has to leave
        // the living states
        let alive = ctx.world.agents.get(agent).map(|a| a.alive).unwrap_or(false);
        if !alive && self.core.current != StateId::Dead {
            self.core.enqueue_event(FsmEvent::new(EnemyEvent::Died));
        }

        let now = ctx.world.time;
        for key in self.core.take_due_timers(now) {
            match key {
                TimerKey::IdleTimeout => {
                    if self.core.current == StateId::Idle {
                        self.core.enqueue_event(FsmEvent::new(EnemyEvent::IdleTimeout));
                    }
                }
                TimerKey::DelayedTransition(target) => {
                    self.change_state(agent, target, ctx);
                }
            }
        }

        let mut drained = 0;
        while drained < MAX_EVENTS_PER_TICK {
            let Some(event) = self.core.queue.pop_front() else {
                break;
            };
            drained += 1;
            self.process_event(agent, event, ctx);
        }
        if drained == MAX_EVENTS_PER_TICK && !self.core.queue.is_empty() {
            tracing::warn!(%agent, pending = self.core.queue.len(), "event queue still backed up after drain cap");
        }

        let current = self.core.current;
        self.with_state(current, ctx, |state, core, ctx| {
            state.on_tick(agent, dt, core, ctx);
        });
    }

    fn process_event(&mut self, agent: AgentId, event: FsmEvent, ctx: &mut AiContext) {
        let current = self.core.current;
        self.with_state(current, ctx, |state, core, ctx| {
            state.on_event(agent, event, core, ctx);
        });

        let Some((target, delay)) = self.core.transition_for(event.kind) else {
            tracing::trace!(%agent, ?event, state = ?self.core.current, "no transition for event");
            return;
        };

        if delay > 0.0 {
            // A repeat of the same event must not keep pushing the
            // deadline out, or the transition would never fire
            if !self.core.has_timer(TimerKey::DelayedTransition(target)) {
                let now = ctx.world.time;
                self.core
                    .start_timer(TimerKey::DelayedTransition(target), delay, now);
            }
        } else {
            self.change_state(agent, target, ctx);
        }
    }

    fn change_state(&mut self, agent: AgentId, target: StateId, ctx: &mut AiContext) {
        if self.core.current == target {
            return;
        }
        if !self.states.contains_key(&target) {
            tracing::error!(%agent, ?target, "transition into unconfigured state ignored");
            return;
        }

        let previous = self.core.current;
        self.with_state(previous, ctx, |state, core, ctx| {
            state.on_exit(agent, core, ctx);
        });

        // Transitions scheduled from the old state die with it
        self.core
            .timers
            .retain(|t| !matches!(t.key, TimerKey::DelayedTransition(_)));

        self.core.current = target;
        self.with_state(target, ctx, |state, core, ctx| {
            state.on_enter(agent, core, ctx);
        });

        tracing::debug!(%agent, from = ?previous, to = ?target, "state change");
    }

    /// Run a closure with a state box temporarily removed from the map so
    /// the core can be borrowed mutably alongside it
    fn with_state<F>(&mut self, id: StateId, ctx: &mut AiContext, f: F)
    where
        F: FnOnce(&mut Box<dyn EnemyState>, &mut FsmCore, &mut AiContext),
    {
        if let Some(mut state) = self.states.remove(&id) {
            f(&mut state, &mut self.core, ctx);
            self.states.insert(id, state);
        }
    }
}

//! Two-backend movement capability for enemy agents
//!
//! Agents move through one of two motors: a full character motor (walking
//! physics profile, used at the highest detail level) or a lightweight
//! floating motor (used at every reduced detail level). Exactly one motor is
//! enabled at a time; schedulers talk to whichever is active through the
//! same small surface and never need to know which one it is.

use crate::util::vec3::Vec3;

/// Character motor defaults (walking profile)
pub const CHARACTER_MAX_WALK_SPEED: f32 = 450.0;
pub const CHARACTER_ACCELERATION: f32 = 2048.0;

/// Floating motor defaults (lightweight profile)
pub const FLOATING_MAX_SPEED: f32 = 450.0;
pub const FLOATING_ACCELERATION: f32 = 1024.0;

/// Speed below which a backend switch does not carry velocity over
const CARRY_OVER_MIN_SPEED: f32 = 10.0;

/// Which motor is currently enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorBackend {
    Character,
    Floating,
}

/// One motor: velocity chases `input * max_speed` at a fixed acceleration
#[derive(Debug, Clone)]
pub struct Motor {
    pub max_speed: f32,
    pub acceleration: f32,
    pub velocity: Vec3,
    pub enabled: bool,
    /// Direction requested this tick; consumed by `integrate`
    input: Vec3,
}

impl Motor {
    fn new(max_speed: f32, acceleration: f32, enabled: bool) -> Self {
        Self {
            max_speed,
            acceleration,
            velocity: Vec3::ZERO,
            enabled,
            input: Vec3::ZERO,
        }
    }

    fn add_input(&mut self, direction: Vec3) {
        self.input += direction;
    }

    fn stop_immediately(&mut self) {
        self.velocity = Vec3::ZERO;
        self.input = Vec3::ZERO;
    }

    /// Advance velocity toward the requested input and return the
    /// displacement for this tick. The input vector is consumed.
    fn integrate(&mut self, dt: f32) -> Vec3 {
        let desired = if self.input.is_nearly_zero(1.0e-4) {
            Vec3::ZERO
        } else {
            self.input.normalize() * self.max_speed
        };
        self.input = Vec3::ZERO;

        let delta = desired - self.velocity;
        let max_step = self.acceleration * dt;
        self.velocity += delta.clamp_length(max_step);
        self.velocity * dt
    }
}

/// The agent-facing movement capability: two motors, one enabled
#[derive(Debug, Clone)]
pub struct MovementRig {
    character: Motor,
    floating: Motor,
}

impl MovementRig {
    /// New rig with the character motor enabled (full detail default)
    pub fn new() -> Self {
        Self {
            character: Motor::new(CHARACTER_MAX_WALK_SPEED, CHARACTER_ACCELERATION, true),
            floating: Motor::new(FLOATING_MAX_SPEED, FLOATING_ACCELERATION, false),
        }
    }

    pub fn active_backend(&self) -> MotorBackend {
        if self.character.enabled {
            MotorBackend::Character
        } else {
            MotorBackend::Floating
        }
    }

    pub fn is_enabled(&self, backend: MotorBackend) -> bool {
        match backend {
            MotorBackend::Character => self.character.enabled,
            MotorBackend::Floating => self.floating.enabled,
        }
    }

    fn active(&self) -> &Motor {
        if self.character.enabled {
            &self.character
        } else {
            &self.floating
        }
    }

    fn active_mut(&mut self) -> &mut Motor {
        if self.character.enabled {
            &mut self.character
        } else {
            &mut self.floating
        }
    }

    /// Max speed of whichever motor is active
    pub fn max_speed(&self) -> f32 {
        self.active().max_speed
    }

    pub fn set_max_speed(&mut self, speed: f32) {
        self.active_mut().max_speed = speed;
    }

    /// Queue a movement input direction for this tick
    pub fn add_input(&mut self, direction: Vec3) {
        self.active_mut().add_input(direction);
    }

    /// Zero velocity and drop any queued input on the active motor
    pub fn stop_immediately(&mut self) {
        self.active_mut().stop_immediately();
    }

    pub fn velocity(&self) -> Vec3 {
        self.active().velocity
    }

    /// Integrate the active motor and return this tick's displacement
    pub fn integrate(&mut self, dt: f32) -> Vec3 {
        self.active_mut().integrate(dt)
    }

    /// Switch the enabled motor, carrying velocity across the swap.
    /// Returns the direction handed to the new backend, if any.
    pub fn switch_to(&mut self, backend: MotorBackend) -> Option<Vec3> {
        if self.active_backend() == backend {
            return None;
        }

        let (velocity, direction) = carry_over_velocity(self.active().velocity);

        match backend {
            MotorBackend::Character => {
                self.floating.stop_immediately();
                self.floating.enabled = false;
                self.character.enabled = true;
                self.character.max_speed = CHARACTER_MAX_WALK_SPEED;
                self.character.velocity = velocity;
                if let Some(dir) = direction {
                    self.character.add_input(dir);
                }
            }
            MotorBackend::Floating => {
                self.character.stop_immediately();
                self.character.enabled = false;
                self.floating.enabled = true;
                self.floating.velocity = velocity;
                if let Some(dir) = direction {
                    self.floating.add_input(dir);
                }
            }
        }

        direction
    }
}

impl Default for MovementRig {
    fn default() -> Self {
        Self::new()
    }
}

/// What a backend switch transfers: the old velocity, and the input
/// direction to seed into the new backend when the agent was in motion
fn carry_over_velocity(old_velocity: Vec3) -> (Vec3, Option<Vec3>) {
    if old_velocity.length() > CARRY_OVER_MIN_SPEED {
        (old_velocity, Some(old_velocity.normalize()))
    } else {
        (Vec3::ZERO, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_character() {
        let rig = MovementRig::new();
        assert_eq!(rig.active_backend(), MotorBackend::Character);
        assert!(rig.is_enabled(MotorBackend::Character));
        assert!(!rig.is_enabled(MotorBackend::Floating));
    }

    #[test]
    fn test_integrate_accelerates_toward_input() {
        let mut rig = MovementRig::new();
        rig.set_max_speed(300.0);
        rig.add_input(Vec3::UNIT_X);
        let disp = rig.integrate(0.1);

        assert!(disp.x > 0.0);
        assert!(rig.velocity().x > 0.0);
        assert!(rig.velocity().length() <= 300.0 + 1e-3);
    }

    #[test]
    fn test_velocity_reaches_max_speed() {
        let mut rig = MovementRig::new();
        rig.set_max_speed(300.0);
        for _ in 0..100 {
            rig.add_input(Vec3::UNIT_X);
            rig.integrate(0.05);
        }
        assert!((rig.velocity().length() - 300.0).abs() < 1.0);
    }

    #[test]
    fn test_stop_immediately() {
        let mut rig = MovementRig::new();
        rig.add_input(Vec3::UNIT_X);
        rig.integrate(0.1);
        rig.stop_immediately();
        assert_eq!(rig.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_no_input_decelerates() {
        let mut rig = MovementRig::new();
        for _ in 0..20 {
            rig.add_input(Vec3::UNIT_X);
            rig.integrate(0.05);
        }
        let moving = rig.velocity().length();
        for _ in 0..100 {
            rig.integrate(0.05);
        }
        assert!(rig.velocity().length() < moving);
        assert!(rig.velocity().is_nearly_zero(1.0));
    }

    #[test]
    fn test_switch_carries_velocity() {
        let mut rig = MovementRig::new();
        for _ in 0..50 {
            rig.add_input(Vec3::UNIT_X);
            rig.integrate(0.05);
        }
        let before = rig.velocity();
        assert!(before.length() > CARRY_OVER_MIN_SPEED);

        let seeded = rig.switch_to(MotorBackend::Floating);
        assert_eq!(rig.active_backend(), MotorBackend::Floating);
        assert_eq!(rig.velocity(), before);
        assert!(seeded.is_some());
        assert!(seeded.unwrap().approx_eq(before.normalize(), 1e-5));
    }

    #[test]
    fn test_switch_at_rest_carries_nothing() {
        let mut rig = MovementRig::new();
        let seeded = rig.switch_to(MotorBackend::Floating);
        assert!(seeded.is_none());
        assert_eq!(rig.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_switch_to_same_backend_is_noop() {
        let mut rig = MovementRig::new();
        assert!(rig.switch_to(MotorBackend::Character).is_none());
        assert_eq!(rig.active_backend(), MotorBackend::Character);
    }

    #[test]
    fn test_carry_over_threshold() {
        let (vel, dir) = carry_over_velocity(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(vel, Vec3::ZERO);
        assert!(dir.is_none());

        let (vel, dir) = carry_over_velocity(Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(vel, Vec3::new(100.0, 0.0, 0.0));
        assert!(dir.unwrap().approx_eq(Vec3::UNIT_X, 1e-5));
    }
}

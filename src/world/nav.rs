//! World facades: navigation projection and visibility tracing
//!
//! The engine-owned navigation mesh and collision world are consumed
//! through these two traits. Both are `Send + Sync` so the background
//! reposition task can query them off the simulation thread.

use crate::util::vec3::Vec3;
use crate::world::agent::AgentId;
use crate::world::PlayerId;

/// What a visibility trace ran into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceSubject {
    Agent(AgentId),
    Player(PlayerId),
    Geometry,
}

/// A blocking hit along a visibility trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    pub subject: TraceSubject,
    /// Bounding extent of the blocker (used by cover heuristics)
    pub extent: Vec3,
}

impl TraceHit {
    /// Cover heuristic: tall, reasonably large static geometry counts
    pub fn is_cover(&self) -> bool {
        matches!(self.subject, TraceSubject::Geometry)
            && self.extent.z > 80.0
            && self.extent.length() > 100.0
    }
}

/// Projection of arbitrary points onto the walkable surface
pub trait NavMesh: Send + Sync {
    /// Project `point` onto the nearest walkable location within `extent`.
    /// Returns `None` when no walkable surface is in range.
    fn project_point(&self, point: Vec3, extent: Vec3) -> Option<Vec3>;
}

/// Straight-line trace against the visibility collision channel
pub trait LineTracer: Send + Sync {
    /// First blocking hit between `from` and `to`, ignoring `ignore`.
    /// `None` means the segment is clear.
    fn trace_visibility(&self, from: Vec3, to: Vec3, ignore: Option<AgentId>) -> Option<TraceHit>;
}

// ============================================================================
// Demo / test implementations
// ============================================================================

/// Circular unwalkable region in a [`PlaneNavMesh`]
#[derive(Debug, Clone, Copy)]
pub struct NavHole {
    pub center: Vec3,
    pub radius: f32,
}

/// Flat walkable plane at a fixed height, with optional circular holes
#[derive(Debug, Clone, Default)]
pub struct PlaneNavMesh {
    pub height: f32,
    pub holes: Vec<NavHole>,
}

impl PlaneNavMesh {
    pub fn flat(height: f32) -> Self {
        Self {
            height,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(height: f32, holes: Vec<NavHole>) -> Self {
        Self { height, holes }
    }

    fn in_hole(&self, point: Vec3) -> bool {
        self.holes
            .iter()
            .any(|h| point.horizontal().distance_to(h.center.horizontal()) < h.radius)
    }
}

impl NavMesh for PlaneNavMesh {
    fn project_point(&self, point: Vec3, extent: Vec3) -> Option<Vec3> {
        if (point.z - self.height).abs() > extent.z {
            return None;
        }
        if self.in_hole(point) {
            return None;
        }
        Some(Vec3::new(point.x, point.y, self.height))
    }
}

/// Axis-aligned blocking box for [`BoxObstacleTracer`]
#[derive(Debug, Clone, Copy)]
pub struct ObstacleBox {
    pub center: Vec3,
    pub extent: Vec3,
}

impl ObstacleBox {
    pub fn new(center: Vec3, extent: Vec3) -> Self {
        Self { center, extent }
    }

    /// Slab test: does the segment pass through this box?
    fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let dir = to - from;
        let mut t_min: f32 = 0.0;
        let mut t_max: f32 = 1.0;

        for axis in 0..3 {
            let (origin, delta, center, half) = match axis {
                0 => (from.x, dir.x, self.center.x, self.extent.x),
                1 => (from.y, dir.y, self.center.y, self.extent.y),
                _ => (from.z, dir.z, self.center.z, self.extent.z),
            };
            let lo = center - half;
            let hi = center + half;

            if delta.abs() < 1.0e-8 {
                if origin < lo || origin > hi {
                    return false;
                }
            } else {
                let inv = 1.0 / delta;
                let mut t0 = (lo - origin) * inv;
                let mut t1 = (hi - origin) * inv;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return false;
                }
            }
        }
        true
    }
}

/// Visibility tracer over a set of static boxes; pawns never block the
/// visibility channel here, only geometry does
#[derive(Debug, Clone, Default)]
pub struct BoxObstacleTracer {
    pub boxes: Vec<ObstacleBox>,
}

impl BoxObstacleTracer {
    pub fn new(boxes: Vec<ObstacleBox>) -> Self {
        Self { boxes }
    }
}

impl LineTracer for BoxObstacleTracer {
    fn trace_visibility(&self, from: Vec3, to: Vec3, _ignore: Option<AgentId>) -> Option<TraceHit> {
        for b in &self.boxes {
            if b.intersects_segment(from, to) {
                return Some(TraceHit {
                    subject: TraceSubject::Geometry,
                    extent: b.extent,
                });
            }
        }
        None
    }
}

/// Tracer with nothing to hit; every trace is clear
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearTracer;

impl LineTracer for ClearTracer {
    fn trace_visibility(&self, _from: Vec3, _to: Vec3, _ignore: Option<AgentId>) -> Option<TraceHit> {
        None
    }
}

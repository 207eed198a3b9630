//! Enemy AI scheduling and spatial coordination core
//!
//! The gameplay-AI layer of a multiplayer shooter, reduced to the parts
//! that do real scheduling work: a time-sliced FSM dispatcher with an
//! adaptive chunk controller, distance-based LOD classification that
//! throttles per-agent tick and replication cadence, crowd movement with
//! batched path validation and spatial-hash collision avoidance, cached
//! line-of-sight detection with time-bucketed invalidation, and tactical
//! reposition planning with a background-task variant.
//!
//! Engine concerns (navigation mesh projection, visibility traces, player
//! enumeration) enter through the facade traits in [`world::nav`]; the
//! rest of the crate is engine-agnostic and runs headless.

pub mod ai;
pub mod config;
pub mod util;
pub mod world;

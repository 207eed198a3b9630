//! Runtime configuration
//!
//! Every scheduler constant has a fixed default for behavioral parity and
//! an environment override for tuning a deployment without a rebuild.
//!
//! # Environment Variables
//!
//! - `SUSPENSE_AI_FSM_BUDGET_MS` - wall-clock budget per FSM pass (default: 3.0)
//! - `SUSPENSE_AI_FSM_CHUNK_SIZE` - starting chunk size (default: 30)
//! - `SUSPENSE_AI_SIGNIFICANCE_INTERVAL` - seconds between LOD batches (default: 0.25)
//! - `SUSPENSE_AI_SIGNIFICANCE_BATCH` - agents classified per batch (default: 30)
//! - `SUSPENSE_AI_CROWD_CELL_SIZE` - crowd grid cell size (default: 200.0)
//! - `SUSPENSE_AI_MAX_PATH_REQUESTS` - path requests serviced per tick (default: 10)
//! - `SUSPENSE_AI_DETECTION_BUCKET_SIZE` - detection grid bucket edge (default: 1000.0)
//! - `SUSPENSE_AI_TICK_RATE` - simulation tick rate in Hz (default: 60)
//! - `SUSPENSE_AI_AGENT_COUNT` - agents spawned by the demo (default: 64)
//! - `SUSPENSE_AI_SIM_SECONDS` - demo run length in seconds (default: 20.0)

use thiserror::Error;

use crate::ai::scheduler::{
    INITIAL_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_TIME_SLICE_BUDGET_MS, MIN_CHUNK_SIZE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("fsm_chunk_size {0} outside [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]")]
    ChunkOutOfBounds(usize),
}

/// AI core runtime configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Wall-clock budget for one FSM scheduling pass, milliseconds
    pub fsm_budget_ms: f64,
    /// Starting chunk size for the adaptive controller
    pub fsm_chunk_size: usize,
    /// Seconds between LOD classification batches
    pub significance_interval: f32,
    /// Agents classified per LOD batch
    pub significance_batch: usize,
    /// Crowd collision grid cell size, world units
    pub crowd_cell_size: f32,
    /// Path requests serviced per crowd tick
    pub max_path_requests: usize,
    /// Detection grid bucket edge, world units
    pub detection_bucket_size: f32,
    /// Simulation tick rate, Hz
    pub tick_rate: u32,
    /// Demo binary: agents to spawn
    pub agent_count: usize,
    /// Demo binary: run length, seconds
    pub sim_seconds: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            fsm_budget_ms: MAX_TIME_SLICE_BUDGET_MS,
            fsm_chunk_size: INITIAL_CHUNK_SIZE,
            significance_interval: 0.25,
            significance_batch: 30,
            crowd_cell_size: 200.0,
            max_path_requests: 10,
            detection_bucket_size: 1000.0,
            tick_rate: 60,
            agent_count: 64,
            sim_seconds: 20.0,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {} '{}', using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl AiConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let defaults = Self::default();
        Self {
            fsm_budget_ms: env_parse("SUSPENSE_AI_FSM_BUDGET_MS", defaults.fsm_budget_ms),
            fsm_chunk_size: env_parse("SUSPENSE_AI_FSM_CHUNK_SIZE", defaults.fsm_chunk_size),
            significance_interval: env_parse(
                "SUSPENSE_AI_SIGNIFICANCE_INTERVAL",
                defaults.significance_interval,
            ),
            significance_batch: env_parse(
                "SUSPENSE_AI_SIGNIFICANCE_BATCH",
                defaults.significance_batch,
            ),
            crowd_cell_size: env_parse("SUSPENSE_AI_CROWD_CELL_SIZE", defaults.crowd_cell_size),
            max_path_requests: env_parse(
                "SUSPENSE_AI_MAX_PATH_REQUESTS",
                defaults.max_path_requests,
            ),
            detection_bucket_size: env_parse(
                "SUSPENSE_AI_DETECTION_BUCKET_SIZE",
                defaults.detection_bucket_size,
            ),
            tick_rate: env_parse("SUSPENSE_AI_TICK_RATE", defaults.tick_rate),
            agent_count: env_parse("SUSPENSE_AI_AGENT_COUNT", defaults.agent_count),
            sim_seconds: env_parse("SUSPENSE_AI_SIM_SECONDS", defaults.sim_seconds),
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { name, value })
            }
        }

        positive("fsm_budget_ms", self.fsm_budget_ms)?;
        positive("significance_interval", self.significance_interval as f64)?;
        positive("crowd_cell_size", self.crowd_cell_size as f64)?;
        positive("detection_bucket_size", self.detection_bucket_size as f64)?;
        positive("tick_rate", self.tick_rate as f64)?;
        positive("max_path_requests", self.max_path_requests as f64)?;
        positive("significance_batch", self.significance_batch as f64)?;

        if self.fsm_chunk_size < MIN_CHUNK_SIZE || self.fsm_chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkOutOfBounds(self.fsm_chunk_size));
        }
        Ok(())
    }
}

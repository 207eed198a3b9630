//! Simulation tick performance monitoring
//!
//! Keeps a rolling window of recent tick durations and grades the average
//! against the frame budget. The demo loop reads the grade for its health
//! report; callers can also use it to gate spawning more agents into a
//! world that is already struggling.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples kept in the rolling window (~3 seconds at 60 Hz)
const WINDOW_SAMPLES: usize = 180;

/// Samples needed before the grade is considered meaningful
const MIN_SAMPLES: usize = 10;

/// Health grade for recent ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Well under budget, room to grow the population
    Excellent,
    /// Normal operation
    Good,
    /// Near budget, stop adding agents
    Warning,
    /// Over budget, sustained
    Critical,
}

impl TickStatus {
    pub fn can_add_agents(&self) -> bool {
        matches!(self, TickStatus::Excellent | TickStatus::Good)
    }

    fn from_budget_ratio(ratio: f32) -> Self {
        match ratio {
            r if r < 0.3 => TickStatus::Excellent,
            r if r < 0.7 => TickStatus::Good,
            r if r < 1.0 => TickStatus::Warning,
            _ => TickStatus::Critical,
        }
    }
}

/// Rolling tick-duration monitor
pub struct TickMonitor {
    window: VecDeque<Duration>,
    /// Target tick duration (budget)
    target: Duration,
    status: TickStatus,
    in_flight: Option<Instant>,
}

impl TickMonitor {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_SAMPLES),
            target: Duration::from_secs_f32(1.0 / tick_rate as f32),
            status: TickStatus::Excellent,
            in_flight: None,
        }
    }

    /// Mark the start of a tick; paired with [`Self::tick_end`]
    pub fn tick_start(&mut self) {
        self.in_flight = Some(Instant::now());
    }

    /// Close the measurement opened by [`Self::tick_start`]
    pub fn tick_end(&mut self) {
        if let Some(started) = self.in_flight.take() {
            self.record(started.elapsed());
        }
    }

    /// Feed a duration directly (tests, external timing sources)
    pub fn record(&mut self, duration: Duration) {
        if self.window.len() == WINDOW_SAMPLES {
            self.window.pop_front();
        }
        self.window.push_back(duration);

        if self.window.len() >= MIN_SAMPLES {
            let ratio = self.average().as_secs_f32() / self.target.as_secs_f32();
            self.status = TickStatus::from_budget_ratio(ratio);
        }
    }

    pub fn average(&self) -> Duration {
        match self.window.len() {
            0 => Duration::ZERO,
            n => self.window.iter().sum::<Duration>() / n as u32,
        }
    }

    /// 95th percentile tick duration over the window
    pub fn p95(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.window.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (sorted.len() * 95).div_ceil(100);
        sorted[rank.saturating_sub(1)]
    }

    pub fn status(&self) -> TickStatus {
        self.status
    }

    /// Budget usage as a percentage (0-100+)
    pub fn budget_usage_percent(&self) -> f32 {
        (self.average().as_secs_f32() / self.target.as_secs_f32()) * 100.0
    }
}

impl Default for TickMonitor {
    fn default() -> Self {
        Self::new(60)
    }
}

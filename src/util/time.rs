//! Time constants and helpers for the fixed-step simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A simulation tick index. Monotonically increasing, 60 per second.
pub type Tick = u32;

/// Fixed simulation rate
pub const SIMULATION_TPS: u32 = 60;
/// Full snapshots broadcast per second
pub const SNAPSHOT_TPS: u32 = 20;

/// Ticks between snapshot broadcasts
pub const TICK_PERIOD: Tick = SIMULATION_TPS / SNAPSHOT_TPS;
/// How late (in ticks) a client input may arrive and still be applied
pub const RECEIVE_WINDOW: Tick = SIMULATION_TPS / 2;
/// Ticks the server lags its broadcast state behind its own clock,
/// absorbing input jitter before a tick is finalized
pub const SERVER_LATENESS: Tick = RECEIVE_WINDOW;
/// Event history the server must retain. Also the minimum tick count before
/// the first broadcast, so the window subtractions never underflow.
pub const MAX_LATENESS: Tick = SERVER_LATENESS + TICK_PERIOD + RECEIVE_WINDOW;
/// Ticks between metadata (names, terrain) broadcasts
pub const METADATA_TICK_PERIOD: Tick = SIMULATION_TPS * 2;

/// Fixed timestep in seconds (1/60)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lateness_window_covers_all_delay_sources() {
        // A broadcast at tick T incorporates events down to T - RECEIVE_WINDOW;
        // history pruned below T - MAX_LATENESS must never be needed again.
        assert_eq!(MAX_LATENESS, SERVER_LATENESS + TICK_PERIOD + RECEIVE_WINDOW);
        assert!(MAX_LATENESS > SERVER_LATENESS + TICK_PERIOD);
    }

    #[test]
    fn sixty_ticks_is_one_second() {
        assert!((tick_delta() * SIMULATION_TPS as f32 - 1.0).abs() < f32::EPSILON);
    }
}

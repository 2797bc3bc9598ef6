use std::time::{Duration, Instant};

use crate::config::GameConfig;

/// Which timers fired on a single poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub tick: bool,
    pub spawn: bool,
}

/// Drives simulation steps and food spawns off two independent intervals.
///
/// A timer fires when the time since it last fired reaches its interval,
/// and its baseline then resets to the polling instant. A late poll fires
/// once, so missed ticks merge instead of queueing up.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    tick_interval: Duration,
    spawn_interval: Duration,
    last_tick: Instant,
    last_spawn: Instant,
}

impl SimulationClock {
    pub fn new(config: &GameConfig, now: Instant) -> Self {
        Self::with_intervals(config.tick_interval(), config.food_interval(), now)
    }

    pub fn with_intervals(tick_interval: Duration, spawn_interval: Duration, now: Instant) -> Self {
        SimulationClock { tick_interval, spawn_interval, last_tick: now, last_spawn: now }
    }

    pub fn poll(&mut self, now: Instant) -> Due {
        Due {
            tick: fire(&mut self.last_tick, self.tick_interval, now),
            spawn: fire(&mut self.last_spawn, self.spawn_interval, now),
        }
    }
}

fn fire(last: &mut Instant, interval: Duration, now: Instant) -> bool {
    if now.saturating_duration_since(*last) >= interval {
        *last = now;
        true
    } else {
        false
    }
}

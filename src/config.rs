use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{GridSize, TermInt};

const MIN_SIDE: TermInt = 5;

/// Match settings, fixed for the lifetime of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Time between simulation steps
    pub tick_interval_ms: u64,
    /// Time between food spawns
    pub food_interval_ms: u64,
    pub initial_snake_length: usize,
    pub min_height: TermInt,
    pub min_width: TermInt,
    pub port: u16,
    /// Seconds of "Beginning Match in N" before play starts
    pub countdown_secs: u64,
    /// How long end-of-match banners stay up
    pub banner_ms: u64,
    /// Upper bound on a single readiness wait in the game loops
    pub poll_interval_ms: u64,
    /// Pending turns buffered per snake between ticks
    pub turn_queue_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            food_interval_ms: 4000,
            initial_snake_length: 4,
            min_height: 10,
            min_width: 20,
            port: 12000,
            countdown_secs: 3,
            banner_ms: 3000,
            poll_interval_ms: 5,
            turn_queue_len: 3,
        }
    }
}

impl GameConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: GameConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(config)
    }

    /// Food spawns in `[2, h-2] x [2, w-2]` and a fresh snake has to fit
    /// inside the border, so the smallest field is 5x5.
    pub fn validate(&self) -> Result<()> {
        if self.initial_snake_length < 1 {
            bail!("initial_snake_length must be at least 1");
        }
        if self.min_height < MIN_SIDE || self.min_width < MIN_SIDE {
            bail!(
                "minimum grid {}x{} is below {}x{}",
                self.min_height,
                self.min_width,
                MIN_SIDE,
                MIN_SIDE
            );
        }
        let interior = (self.min_width - 2) as usize;
        if self.initial_snake_length > interior {
            bail!(
                "initial_snake_length {} does not fit the {} column interior",
                self.initial_snake_length,
                interior
            );
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn food_interval(&self) -> Duration {
        Duration::from_millis(self.food_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn banner_duration(&self) -> Duration {
        Duration::from_millis(self.banner_ms)
    }

    pub fn min_grid(&self) -> GridSize {
        GridSize::new(self.min_height, self.min_width)
    }
}

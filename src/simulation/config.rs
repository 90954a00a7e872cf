//! Simulation configuration
//!
//! Defaults reproduce the 9x64 city of a 1280x720 window.

use anyhow::{bail, Result};

use super::types::{
    COLUMN_WIDTH, MAX_PEDESTRIANS, MAX_VEHICLES, OUT_OF_BOUNDS_MARGIN, ROAD_UNIT, ROW_HEIGHT,
    SPAWN_CHANCE, SPAWN_PERIOD_MS,
};

/// Default grid rows
pub const DEFAULT_ROWS: usize = 9;

/// Default grid columns
pub const DEFAULT_COLS: usize = 64;

/// Default tick length (one 60 Hz frame)
pub const DEFAULT_TICK_MS: u32 = 16;

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Grid rows
    pub rows: usize,
    /// Grid columns; must be a multiple of the road unit
    pub cols: usize,
    /// Seed for generation and every later random decision
    pub seed: u64,
    /// Simulated milliseconds per tick
    pub tick_ms: u32,
    /// Period of the boundary spawner
    pub spawn_period_ms: u32,
    /// Concurrent pedestrian cap
    pub max_pedestrians: usize,
    /// Concurrent vehicle cap
    pub max_vehicles: usize,
    /// A spawn node fires with probability 1 / spawn_chance
    pub spawn_chance: u32,
    /// Distance past the world edge at which agents are retired
    pub bounds_margin: i32,
    /// Seed the map with agents right after generation
    pub initial_population: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            seed: 0,
            tick_ms: DEFAULT_TICK_MS,
            spawn_period_ms: SPAWN_PERIOD_MS,
            max_pedestrians: MAX_PEDESTRIANS,
            max_vehicles: MAX_VEHICLES,
            spawn_chance: SPAWN_CHANCE,
            bounds_margin: OUT_OF_BOUNDS_MARGIN,
            initial_population: true,
        }
    }
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// World width in units
    pub fn world_width(&self) -> i32 {
        self.cols as i32 * COLUMN_WIDTH
    }

    /// World height in units
    pub fn world_height(&self) -> i32 {
        self.rows as i32 * ROW_HEIGHT
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 {
            bail!("grid needs at least one row");
        }
        if self.cols < ROAD_UNIT || self.cols % ROAD_UNIT != 0 {
            bail!(
                "grid columns must be a positive multiple of {}, got {}",
                ROAD_UNIT,
                self.cols
            );
        }
        if self.tick_ms == 0 {
            bail!("tick length must be positive");
        }
        if self.spawn_chance == 0 {
            bail!("spawn chance denominator must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_world_matches_window() {
        let config = SimConfig::default();
        assert_eq!(config.world_width(), 1280);
        assert_eq!(config.world_height(), 720);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_columns_must_fit_road_units() {
        let config = SimConfig {
            cols: 30,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

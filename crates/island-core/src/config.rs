//! Configuration types for the simulation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest grid the engine accepts, in cells
pub const MAX_GRID_CELLS: usize = 1 << 20;

/// Check grid dimensions and return the cell count
pub fn grid_cell_count(width: i32, height: i32) -> Result<usize> {
    if width < 1 || height < 1 {
        return Err(Error::Validation(format!(
            "Grid must be at least 1x1, got {}x{}",
            width, height
        )));
    }
    match width.checked_mul(height) {
        Some(cells) if cells as usize <= MAX_GRID_CELLS => Ok(cells as usize),
        _ => Err(Error::Validation(format!(
            "Grid {}x{} exceeds {} cells",
            width, height, MAX_GRID_CELLS
        ))),
    }
}

/// World configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Width of the world grid
    pub width: i32,
    /// Height of the world grid
    pub height: i32,
    /// Probability that a cell starts with plants (0.0 to 1.0)
    pub plant_density: f32,
    /// Maximum plant units per cell
    pub max_plants_per_cell: u8,
    /// Probability that a cell starts with an animal (0.0 to 1.0)
    pub animal_density: f32,
    /// Per-tick probability that a cell below the cap grows one plant unit
    pub plant_regrowth_probability: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 30,
            height: 15,
            plant_density: 0.5,
            max_plants_per_cell: 4,
            animal_density: 1.0 / 11.0,
            plant_regrowth_probability: 0.05,
        }
    }
}

/// Energy and aging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Starting energy of initial animals, as a fraction of max energy
    pub initial_energy_fraction: f32,
    /// Energy cost of every movement attempt
    pub move_cost: f32,
    /// Maintenance cost paid every tick
    pub aging_cost: f32,
    /// Animals older than this die
    pub max_age: u32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial_energy_fraction: 0.8,
            move_cost: 0.3,
            aging_cost: 0.5,
            max_age: 100,
        }
    }
}

/// Feeding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedingConfig {
    /// A kill only succeeds while the 3x3 block around the prey holds fewer
    /// animals than this
    pub predation_capacity: usize,
    /// Probability that a kill leaves one plant unit behind
    pub carcass_plant_probability: f32,
}

impl Default for FeedingConfig {
    fn default() -> Self {
        Self {
            predation_capacity: 7,
            carcass_plant_probability: 0.3,
        }
    }
}

/// Reproduction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    /// Minimum energy, as a fraction of max energy, for both parents
    pub energy_threshold: f32,
    /// Probability that an eligible animal looks for a partner
    pub probability: f32,
    /// Maximum number of live animals per species
    pub max_per_species: usize,
    /// Reproduction only happens while the 3x3 block around the parent holds
    /// fewer animals than this
    pub neighborhood_capacity: usize,
    /// Fraction of its energy each parent keeps
    pub parent_energy_retained: f32,
    /// Offspring energy as a fraction of max energy
    pub offspring_energy_fraction: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.6,
            probability: 0.25,
            max_per_species: 60,
            neighborhood_capacity: 6,
            parent_energy_retained: 0.6,
            offspring_energy_fraction: 0.5,
        }
    }
}

/// Clock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Delay between the end of one tick and the start of the next
    pub tick_interval_ms: u64,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
    /// Spawn the clock paused
    pub start_paused: bool,
}

impl ClockConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            max_ticks: None,
            start_paused: false,
        }
    }
}

/// Which phases a tick runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickSchedule {
    /// Aging, movement, feeding, regrowth, reproduction
    #[default]
    AllPhases,
    /// Aging, then a coin flip between movement and feeding, then regrowth
    /// and reproduction
    MoveOrFeed,
}

/// Full simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Random seed for reproducibility; `None` seeds from entropy
    pub seed: Option<u64>,
    pub schedule: TickSchedule,
    pub world: WorldConfig,
    pub energy: EnergyConfig,
    pub feeding: FeedingConfig,
    pub reproduction: ReproductionConfig,
    pub clock: ClockConfig,
    /// Emit population metrics every N ticks (0 disables)
    pub metrics_interval: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            schedule: TickSchedule::default(),
            world: WorldConfig::default(),
            energy: EnergyConfig::default(),
            feeding: FeedingConfig::default(),
            reproduction: ReproductionConfig::default(),
            clock: ClockConfig::default(),
            metrics_interval: 50,
        }
    }
}

impl SimConfig {
    /// Default configuration with the given grid size
    pub fn with_size(width: i32, height: i32) -> Self {
        Self {
            world: WorldConfig {
                width,
                height,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let world = &self.world;
        grid_cell_count(world.width, world.height)?;
        if world.max_plants_per_cell == 0 {
            return Err(Error::Validation(
                "max_plants_per_cell must be at least 1".to_string(),
            ));
        }

        check_probability("world.plant_density", world.plant_density)?;
        check_probability("world.animal_density", world.animal_density)?;
        check_probability(
            "world.plant_regrowth_probability",
            world.plant_regrowth_probability,
        )?;
        check_probability(
            "feeding.carcass_plant_probability",
            self.feeding.carcass_plant_probability,
        )?;
        check_probability("reproduction.probability", self.reproduction.probability)?;
        check_probability(
            "reproduction.energy_threshold",
            self.reproduction.energy_threshold,
        )?;
        check_probability(
            "reproduction.parent_energy_retained",
            self.reproduction.parent_energy_retained,
        )?;
        check_fraction(
            "energy.initial_energy_fraction",
            self.energy.initial_energy_fraction,
        )?;
        check_fraction(
            "reproduction.offspring_energy_fraction",
            self.reproduction.offspring_energy_fraction,
        )?;

        if self.energy.move_cost < 0.0 || self.energy.aging_cost < 0.0 {
            return Err(Error::Validation(
                "Energy costs must not be negative".to_string(),
            ));
        }
        if self.energy.max_age == 0 {
            return Err(Error::Validation("max_age must be at least 1".to_string()));
        }
        if self.clock.tick_interval_ms == 0 {
            return Err(Error::Validation(
                "tick_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_probability(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_fraction(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be within (0, 1], got {}",
            name, value
        )))
    }
}

/// Headless runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub simulation: SimConfig,
    /// Log species counts every N ticks
    pub report_interval_ticks: u64,
    /// Print the final grid to stdout on shutdown
    pub print_final_grid: bool,
}

impl RunnerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.simulation.validate()?;
        Ok(config)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            simulation: SimConfig::with_size(30, 15),
            report_interval_ticks: 10,
            print_final_grid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let world_config = WorldConfig::default();
        assert_eq!(world_config.width, 30);
        assert_eq!(world_config.height, 15);
        assert_eq!(world_config.max_plants_per_cell, 4);

        let energy_config = EnergyConfig::default();
        assert_eq!(energy_config.max_age, 100);

        let clock_config = ClockConfig::default();
        assert_eq!(clock_config.tick_interval(), Duration::from_millis(500));

        assert!(SimConfig::default().validate().is_ok());
        assert!(RunnerConfig::default().simulation.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SimConfig::with_size(0, 10);
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        config = SimConfig::with_size(70_000, 70_000);
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        config = SimConfig::with_size(i32::MAX, 2);
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        config = SimConfig::with_size(1024, 1024);
        assert!(config.validate().is_ok());

        config = SimConfig::with_size(5, 5);
        config.world.plant_regrowth_probability = 1.5;
        assert!(config.validate().is_err());

        config = SimConfig::with_size(5, 5);
        config.reproduction.offspring_energy_fraction = 0.0;
        assert!(config.validate().is_err());

        config = SimConfig::with_size(5, 5);
        config.energy.move_cost = -1.0;
        assert!(config.validate().is_err());

        config = SimConfig::with_size(5, 5);
        config.clock.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json_str(
            r#"{ "seed": 9, "schedule": "move_or_feed", "world": { "width": 8, "height": 4 } }"#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(9));
        assert_eq!(config.schedule, TickSchedule::MoveOrFeed);
        assert_eq!(config.world.width, 8);
        assert_eq!(config.world.max_plants_per_cell, 4);
        assert_eq!(config.reproduction.max_per_species, 60);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            SimConfig::from_json_str("{ not json"),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            SimConfig::from_json_str(r#"{ "world": { "width": -3 } }"#),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = SimConfig::with_size(12, 7);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.world.width, 12);
        assert_eq!(deserialized.metrics_interval, config.metrics_interval);
    }
}

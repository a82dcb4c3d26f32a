//! Tick engine.
//!
//! [`Simulation`] owns the configuration, the species catalog and the seeded
//! RNG. Each call to [`Simulation::tick`] clones the published grid into a
//! [`World`], runs the phases on that private copy and publishes the result
//! as a new snapshot. Only one tick is computed at a time; readers go through
//! the [`SnapshotPublisher`] and never block the engine.

use crate::snapshot::{SnapshotPublisher, WorldSnapshot};
use crate::world::World;
use island_core::{Error, Result, SimConfig, SpeciesCatalog, SpeciesId, TickSchedule};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, event, info, instrument, Level};

/// Observable state of the tick engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnginePhase {
    Idle = 0,
    Computing = 1,
    Publishing = 2,
}

impl EnginePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EnginePhase::Computing,
            2 => EnginePhase::Publishing,
            _ => EnginePhase::Idle,
        }
    }
}

struct EngineState {
    rng: ChaCha8Rng,
}

pub struct Simulation {
    config: SimConfig,
    catalog: Arc<SpeciesCatalog>,
    publisher: Arc<SnapshotPublisher>,
    state: Mutex<EngineState>,
    phase: AtomicU8,
    seed: u64,
}

impl Simulation {
    /// Default configuration and the standard species table on a
    /// `width` x `height` grid
    pub fn initialize(width: i32, height: i32, seed: Option<u64>) -> Result<Self> {
        let mut config = SimConfig::with_size(width, height);
        config.seed = seed;
        Self::new(config, Arc::new(SpeciesCatalog::standard()))
    }

    /// Generate a random initial world from `config`
    pub fn new(config: SimConfig, catalog: Arc<SpeciesCatalog>) -> Result<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world = World::generate(&config, &catalog, &mut rng)?;

        info!(
            event = "simulation_initialized",
            seed = seed,
            width = config.world.width,
            height = config.world.height,
            population = world.grid().population(),
            plants = world.grid().total_plants(),
            species = catalog.len(),
            "Island generated"
        );

        Ok(Self::assemble(config, catalog, world, rng, seed))
    }

    /// Start from a prepared world instead of a generated one
    pub fn from_world(
        config: SimConfig,
        catalog: Arc<SpeciesCatalog>,
        world: World,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;

        let grid = world.grid();
        if grid.width != config.world.width || grid.height != config.world.height {
            return Err(Error::Validation(format!(
                "world is {}x{} but the configuration says {}x{}",
                grid.width, grid.height, config.world.width, config.world.height
            )));
        }
        if grid.max_plants() != config.world.max_plants_per_cell {
            return Err(Error::Validation(format!(
                "world caps plants at {} per cell but the configuration says {}",
                grid.max_plants(),
                config.world.max_plants_per_cell
            )));
        }
        for animal in grid.animals() {
            catalog.lookup(animal.species)?;
        }
        world.verify_invariants()?;

        let rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(Self::assemble(config, catalog, world, rng, seed))
    }

    fn assemble(
        config: SimConfig,
        catalog: Arc<SpeciesCatalog>,
        world: World,
        rng: ChaCha8Rng,
        seed: u64,
    ) -> Self {
        Self {
            config,
            catalog,
            publisher: Arc::new(SnapshotPublisher::new(world.into_snapshot())),
            state: Mutex::new(EngineState { rng }),
            phase: AtomicU8::new(EnginePhase::Idle as u8),
            seed,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<SpeciesCatalog> {
        &self.catalog
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    /// Seed actually in use, also when the configuration left it open
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Compute and publish one tick.
    ///
    /// Fails with `ConcurrentTickViolation` if another tick is still being
    /// computed. On any error nothing is published and the previous snapshot
    /// stays visible.
    #[instrument(skip(self), fields(seed = self.seed))]
    pub fn tick(&self) -> Result<Arc<WorldSnapshot>> {
        let mut state = self
            .state
            .try_lock()
            .ok_or(Error::ConcurrentTickViolation)?;

        self.set_phase(EnginePhase::Computing);
        let world = match self.compute(&mut state.rng) {
            Ok(world) => world,
            Err(e) => {
                self.set_phase(EnginePhase::Idle);
                return Err(e);
            }
        };

        self.set_phase(EnginePhase::Publishing);
        let snapshot = Arc::new(world.into_snapshot());
        self.publisher.publish(snapshot.clone());
        self.set_phase(EnginePhase::Idle);
        drop(state);

        let summary = snapshot.summary();
        debug!(
            tick = snapshot.tick(),
            population = snapshot.population(),
            births = summary.births,
            deaths = summary.deaths(),
            kills = summary.kills,
            plants_eaten = summary.plants_eaten,
            plants_grown = summary.plants_grown,
            "Tick published"
        );

        let interval = self.config.metrics_interval;
        if interval > 0 && snapshot.tick() % interval == 0 {
            self.emit_population_metrics(&snapshot);
        }

        Ok(snapshot)
    }

    fn compute(&self, rng: &mut ChaCha8Rng) -> Result<World> {
        let previous = self.publisher.current();
        let mut world = World::from_snapshot(&previous);
        drop(previous);

        world.begin_tick();
        world.age_and_cull(&self.config.energy)?;

        match self.config.schedule {
            TickSchedule::AllPhases => {
                world.move_animals(&self.catalog, &self.config.energy, rng)?;
                world.feed(&self.catalog, &self.config.feeding, rng)?;
            }
            TickSchedule::MoveOrFeed => {
                if rng.gen_bool(0.5) {
                    world.move_animals(&self.catalog, &self.config.energy, rng)?;
                } else {
                    world.feed(&self.catalog, &self.config.feeding, rng)?;
                }
            }
        }

        world.regrow_plants(self.config.world.plant_regrowth_probability, rng);
        world.reproduce(&self.catalog, &self.config.reproduction, rng)?;

        if cfg!(debug_assertions) {
            world.verify_invariants()?;
        }

        Ok(world)
    }

    /// Run `ticks` ticks back to back and return the last snapshot
    pub fn run(&self, ticks: u64) -> Result<Arc<WorldSnapshot>> {
        let mut snapshot = self.current_snapshot();
        for _ in 0..ticks {
            snapshot = self.tick()?;
        }
        Ok(snapshot)
    }

    fn emit_population_metrics(&self, snapshot: &WorldSnapshot) {
        let grid = snapshot.grid();
        let energies: Vec<f32> = snapshot.animals().map(|a| a.energy).collect();
        let avg_energy = if energies.is_empty() {
            0.0
        } else {
            energies.iter().sum::<f32>() / energies.len() as f32
        };
        let oldest = snapshot.animals().map(|a| a.age).max().unwrap_or(0);
        let summary = snapshot.summary();

        info!(
            event = "population_metrics",
            tick = snapshot.tick(),
            total_population = snapshot.population(),
            species_alive = snapshot.species_counts().len(),
            total_plants = grid.total_plants(),
            avg_energy = avg_energy,
            oldest = oldest,
            births = summary.births,
            deaths_of_age = summary.deaths_of_age,
            deaths_of_starvation = summary.deaths_of_starvation,
            kills = summary.kills,
            "Population metrics snapshot"
        );

        for (species, count) in snapshot.species_counts() {
            event!(
                Level::INFO,
                gauge_name = "species_population",
                gauge_value = *count,
                species = %species,
                tick = snapshot.tick(),
                "Species population gauge"
            );
        }

        event!(
            Level::INFO,
            gauge_name = "plants_total",
            gauge_value = grid.total_plants(),
            tick = snapshot.tick(),
            "Plant gauge"
        );
    }

    pub fn current_snapshot(&self) -> Arc<WorldSnapshot> {
        self.publisher.current()
    }

    pub fn species_counts(&self) -> BTreeMap<SpeciesId, usize> {
        self.publisher.species_counts()
    }

    pub fn char_at(&self, x: i32, y: i32) -> Result<&'static str> {
        self.current_snapshot().char_at(x, y)
    }

    pub fn plants_at(&self, x: i32, y: i32) -> Result<u8> {
        self.current_snapshot().plants_at(x, y)
    }
}

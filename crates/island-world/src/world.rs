//! The working copy of the world and the per-tick phases.
//!
//! A tick runs the phases in a fixed order (aging, movement, feeding, plant
//! regrowth, reproduction) and every phase sees the results of the ones before
//! it. Reordering them changes the simulation outcome.
//!
//! Each phase snapshots the occupied cells in row-major order before it
//! starts and only processes an entry while the same animal still holds that
//! cell. Row-major order is therefore the tie-break for contested cells, an
//! animal is handled at most once per phase, and newborns wait for the next
//! tick.

use crate::animal::{Animal, Death};
use crate::grid::Grid;
use crate::snapshot::{TickSummary, WorldSnapshot};
use island_core::{
    AnimalId, Diet, Direction, EnergyConfig, Error, FeedingConfig, Position, ReproductionConfig,
    Result, SimConfig, Species, SpeciesCatalog, SpeciesId,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

/// Result of a single movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved(Position),
    /// The step ran into the grid edge
    Absorbed,
    /// The destination holds another animal
    Blocked(Position),
}

/// Result of a feeding attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Hunted { prey: SpeciesId, at: Position },
    Grazed,
    Nothing,
}

/// Mutable world state, exclusively owned by the tick that computes it
#[derive(Debug, Clone)]
pub struct World {
    grid: Grid,
    tick: u64,
    next_animal_id: u64,
    summary: TickSummary,
}

impl World {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            tick: 0,
            next_animal_id: 1,
            summary: TickSummary::default(),
        }
    }

    /// Build the initial world: random plant seeding, then an animal of a
    /// random species in each cell with probability `animal_density`
    pub fn generate(config: &SimConfig, catalog: &SpeciesCatalog, rng: &mut ChaCha8Rng) -> Result<Self> {
        let mut world = Self::new(Grid::from_config(&config.world, rng)?);
        let positions: Vec<Position> = world.grid.positions().collect();
        let mut counts: BTreeMap<SpeciesId, usize> = BTreeMap::new();

        for pos in positions {
            if rng.gen::<f32>() >= config.world.animal_density {
                continue;
            }
            let species = catalog.random(rng);
            let count = counts.entry(species.id).or_insert(0);
            if *count >= config.reproduction.max_per_species {
                continue;
            }
            *count += 1;
            let energy = species.max_energy * config.energy.initial_energy_fraction;
            world.spawn(species, pos, energy)?;
        }

        Ok(world)
    }

    /// Working copy of a published snapshot
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Self {
        Self {
            grid: snapshot.grid().clone(),
            tick: snapshot.tick(),
            next_animal_id: snapshot.next_animal_id(),
            summary: TickSummary::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn summary(&self) -> &TickSummary {
        &self.summary
    }

    /// Place a new animal of `species` at `pos` with a fresh id
    pub fn spawn(&mut self, species: &Species, pos: Position, energy: f32) -> Result<AnimalId> {
        if let Some(existing) = self.grid.occupant(pos)? {
            return Err(Error::InvariantViolation(format!(
                "cannot spawn at {}: cell already holds {}",
                pos, existing.id
            )));
        }
        let id = self.allocate_id();
        self.grid.place(pos, Animal::new(id, species, pos, energy))?;
        Ok(id)
    }

    fn allocate_id(&mut self) -> AnimalId {
        let id = AnimalId(self.next_animal_id);
        self.next_animal_id += 1;
        id
    }

    pub fn species_counts(&self) -> BTreeMap<SpeciesId, usize> {
        let mut counts = BTreeMap::new();
        for animal in self.grid.animals() {
            *counts.entry(animal.species).or_insert(0) += 1;
        }
        counts
    }

    /// Start a new tick: bump the counter and reset the event counts
    pub fn begin_tick(&mut self) {
        self.tick += 1;
        self.summary = TickSummary::default();
    }

    fn holds(&self, pos: Position, id: AnimalId) -> Result<bool> {
        Ok(matches!(self.grid.occupant(pos)?, Some(animal) if animal.id == id))
    }

    fn occupant_at(&mut self, pos: Position) -> Result<&mut Animal> {
        self.grid
            .occupant_mut(pos)?
            .ok_or_else(|| Error::InvariantViolation(format!("expected an animal at {}", pos)))
    }

    fn remove_dead(&mut self, pos: Position, cause: Death) -> Result<()> {
        if let Some(mut animal) = self.grid.take(pos)? {
            animal.mark_dead();
            match cause {
                Death::OldAge => self.summary.deaths_of_age += 1,
                Death::Starvation => self.summary.deaths_of_starvation += 1,
                Death::Eaten => self.summary.kills += 1,
            }
            trace!(
                animal_id = %animal.id,
                species = %animal.species,
                age = animal.age,
                cause = ?cause,
                tick = self.tick,
                "Animal died"
            );
        }
        Ok(())
    }

    /// Phase 1: every animal ages; the dead leave the grid
    pub fn age_and_cull(&mut self, config: &EnergyConfig) -> Result<()> {
        for (pos, id) in self.grid.roster() {
            if !self.holds(pos, id)? {
                continue;
            }
            let death = self.occupant_at(pos)?.age_tick(config);
            if let Some(cause) = death {
                self.remove_dead(pos, cause)?;
            }
        }
        Ok(())
    }

    /// Phase 2: every animal that feels like it takes up to `move_speed`
    /// random steps
    pub fn move_animals(
        &mut self,
        catalog: &SpeciesCatalog,
        config: &EnergyConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        for (pos, id) in self.grid.roster() {
            if !self.holds(pos, id)? {
                continue;
            }

            let (speed, wants_to_move) = {
                let animal = self.occupant_at(pos)?;
                animal.heading = None;
                let species = catalog.lookup(animal.species)?;
                (species.move_speed, animal.wants_to_move(species, rng))
            };
            if !wants_to_move {
                continue;
            }

            let mut current = pos;
            for _ in 0..speed {
                match self.step_animal(current, Direction::random(rng), config.move_cost)? {
                    StepOutcome::Moved(to) => current = to,
                    StepOutcome::Absorbed => {}
                    StepOutcome::Blocked(_) => break,
                }
                // Exhausted animals stop where they are
                if self.occupant_at(current)?.energy <= 0.0 {
                    break;
                }
            }
        }

        self.cull_exhausted()
    }

    /// Move the animal at `from` one step. The attempt costs `move_cost`
    /// even when the animal ends up where it started. A step into an
    /// occupied cell is rejected and recorded as the animal's heading.
    pub fn step_animal(&mut self, from: Position, direction: Direction, move_cost: f32) -> Result<StepOutcome> {
        self.grid.check(from)?;
        let target = from.step(direction);
        let dest = self.grid.clamp(target.x, target.y);
        let blocked = dest != from && self.grid.is_occupied(dest)?;

        let animal = self.occupant_at(from)?;
        animal.consume_energy(move_cost);
        self.summary.moves += 1;

        if dest == from {
            return Ok(StepOutcome::Absorbed);
        }
        if blocked {
            self.occupant_at(from)?.heading = Some(dest);
            self.summary.blocked_moves += 1;
            return Ok(StepOutcome::Blocked(dest));
        }

        self.grid.move_occupant(from, dest)?;
        Ok(StepOutcome::Moved(dest))
    }

    fn cull_exhausted(&mut self) -> Result<()> {
        for (pos, id) in self.grid.roster() {
            let exhausted = matches!(
                self.grid.occupant(pos)?,
                Some(animal) if animal.id == id && animal.energy <= 0.0
            );
            if exhausted {
                self.remove_dead(pos, Death::Starvation)?;
            }
        }
        Ok(())
    }

    /// Phase 3: every animal tries to eat at its post-move position
    pub fn feed(
        &mut self,
        catalog: &SpeciesCatalog,
        config: &FeedingConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        for (pos, id) in self.grid.roster() {
            if self.holds(pos, id)? {
                self.try_to_eat(pos, catalog, config, rng)?;
            }
        }
        Ok(())
    }

    /// Feeding for the animal at `pos`, dispatched on its diet
    pub fn try_to_eat(
        &mut self,
        pos: Position,
        catalog: &SpeciesCatalog,
        config: &FeedingConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<FeedOutcome> {
        let species_id = self.occupant_at(pos)?.species;
        let species = catalog.lookup(species_id)?;

        match species.diet {
            Diet::Herbivore => self.graze(pos, species),
            Diet::Predator => self.hunt(pos, species, catalog, config, rng),
            Diet::Omnivore { .. } => {
                let outcome = self.hunt(pos, species, catalog, config, rng)?;
                if outcome != FeedOutcome::Nothing {
                    return Ok(outcome);
                }
                if self.occupant_at(pos)?.wants_plants(species) {
                    self.graze(pos, species)
                } else {
                    Ok(FeedOutcome::Nothing)
                }
            }
        }
    }

    fn graze(&mut self, pos: Position, species: &Species) -> Result<FeedOutcome> {
        if !self.grid.remove_plant(pos)? {
            return Ok(FeedOutcome::Nothing);
        }
        self.occupant_at(pos)?
            .add_energy(species.energy_gain_on_plant, species);
        self.summary.plants_eaten += 1;
        Ok(FeedOutcome::Grazed)
    }

    /// Kill the animal in the cell the hunter last bumped into and take its
    /// place
    fn hunt(
        &mut self,
        pos: Position,
        species: &Species,
        catalog: &SpeciesCatalog,
        config: &FeedingConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<FeedOutcome> {
        let Some(target) = self.occupant_at(pos)?.heading else {
            return Ok(FeedOutcome::Nothing);
        };

        let prey = match self.grid.occupant(target)? {
            Some(prey) if prey.alive && catalog.can_eat(species.id, prey.species) => prey.species,
            _ => return Ok(FeedOutcome::Nothing),
        };
        if self.grid.occupancy_around(target) >= config.predation_capacity {
            return Ok(FeedOutcome::Nothing);
        }

        self.remove_dead(target, Death::Eaten)?;
        self.grid.move_occupant(pos, target)?;

        let hunter = self.occupant_at(target)?;
        hunter.add_energy(species.energy_gain_on_eat, species);
        hunter.record_kill();
        hunter.heading = None;
        let hunter_id = hunter.id;

        if rng.gen::<f32>() < config.carcass_plant_probability {
            self.grid.add_plant(target)?;
        }

        trace!(
            hunter_id = %hunter_id,
            hunter = %species.id,
            prey = %prey,
            x = target.x,
            y = target.y,
            tick = self.tick,
            "Predation"
        );

        Ok(FeedOutcome::Hunted { prey, at: target })
    }

    /// Phase 4: plants regrow independently of feeding
    pub fn regrow_plants(&mut self, probability: f32, rng: &mut ChaCha8Rng) {
        let grown = self.grid.regrow_plants(probability, rng);
        self.summary.plants_grown += grown as u32;
    }

    /// Phase 5: well-fed animals with a well-fed partner nearby produce
    /// offspring, subject to per-species and per-neighborhood caps
    pub fn reproduce(
        &mut self,
        catalog: &SpeciesCatalog,
        config: &ReproductionConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        let mut counts = self.species_counts();
        let mut bred: HashSet<AnimalId> = HashSet::new();

        for (pos, id) in self.grid.roster() {
            if bred.contains(&id) || !self.holds(pos, id)? {
                continue;
            }

            let species_id = self.occupant_at(pos)?.species;
            let species = catalog.lookup(species_id)?;
            if !self.occupant_at(pos)?.can_breed(species, config) {
                continue;
            }
            if counts.get(&species_id).copied().unwrap_or(0) >= config.max_per_species {
                continue;
            }
            if self.grid.occupancy_around(pos) >= config.neighborhood_capacity {
                continue;
            }
            if rng.gen::<f32>() >= config.probability {
                continue;
            }

            let partner = self.grid.neighborhood(pos).find_map(|neighbor| {
                if neighbor == pos {
                    return None;
                }
                match self.grid.occupant(neighbor) {
                    Ok(Some(mate))
                        if mate.species == species_id
                            && !bred.contains(&mate.id)
                            && mate.can_breed(species, config) =>
                    {
                        Some((neighbor, mate.id))
                    }
                    _ => None,
                }
            });
            let Some((partner_pos, partner_id)) = partner else {
                continue;
            };

            let nest = self
                .grid
                .neighborhood(pos)
                .find(|neighbor| matches!(self.grid.is_occupied(*neighbor), Ok(false)));
            let Some(nest) = nest else {
                continue;
            };

            let child_id = self.allocate_id();
            let child = self
                .occupant_at(pos)?
                .breed(child_id, nest, species, config);
            self.occupant_at(partner_pos)?.pay_breeding_cost(config);
            self.grid.place(nest, child)?;

            bred.insert(id);
            bred.insert(partner_id);
            bred.insert(child_id);
            *counts.entry(species_id).or_insert(0) += 1;
            self.summary.births += 1;

            trace!(
                parent_id = %id,
                partner_id = %partner_id,
                child_id = %child_id,
                species = %species_id,
                x = nest.x,
                y = nest.y,
                tick = self.tick,
                "Offspring born"
            );
        }

        Ok(())
    }

    /// Check the structural invariants of the grid
    pub fn verify_invariants(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for (pos, cell) in self.grid.iter() {
            if cell.plants() > self.grid.max_plants() {
                return Err(Error::InvariantViolation(format!(
                    "cell {} holds {} plants, cap is {}",
                    pos,
                    cell.plants(),
                    self.grid.max_plants()
                )));
            }
            let Some(animal) = cell.occupant() else {
                continue;
            };
            if !animal.alive {
                return Err(Error::InvariantViolation(format!(
                    "dead animal {} still occupies {}",
                    animal.id, pos
                )));
            }
            if animal.position != pos {
                return Err(Error::InvariantViolation(format!(
                    "animal {} stored at {} believes it is at {}",
                    animal.id, pos, animal.position
                )));
            }
            if !seen.insert(animal.id) {
                return Err(Error::InvariantViolation(format!(
                    "animal {} occupies more than one cell",
                    animal.id
                )));
            }
        }

        Ok(())
    }

    /// Freeze the world into a publishable snapshot
    pub fn into_snapshot(self) -> WorldSnapshot {
        WorldSnapshot::new(self.tick, self.grid, self.summary, self.next_animal_id)
    }
}

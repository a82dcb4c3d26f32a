//! Animal state and lifecycle.

use island_core::{AnimalId, Diet, EnergyConfig, Position, ReproductionConfig, Species, SpeciesId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Why an animal died
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Death {
    OldAge,
    Starvation,
    Eaten,
}

/// An animal in the simulation. Owned by the grid slot of the cell it stands on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub species: SpeciesId,
    pub position: Position,
    pub energy: f32,
    pub age: u32,
    pub alive: bool,
    pub kills: u32,
    pub offspring: u32,
    /// Cell this animal last bumped into while moving; the hunting target
    pub heading: Option<Position>,
}

impl Animal {
    pub fn new(id: AnimalId, species: &Species, position: Position, energy: f32) -> Self {
        Self {
            id,
            species: species.id,
            position,
            energy: energy.clamp(0.0, species.max_energy),
            age: 0,
            alive: true,
            kills: 0,
            offspring: 0,
            heading: None,
        }
    }

    /// A newborn of `species` with the configured share of max energy
    pub fn offspring(
        id: AnimalId,
        species: &Species,
        position: Position,
        config: &ReproductionConfig,
    ) -> Self {
        Self::new(
            id,
            species,
            position,
            species.max_energy * config.offspring_energy_fraction,
        )
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn energy_fraction(&self, species: &Species) -> f32 {
        self.energy / species.max_energy
    }

    pub fn consume_energy(&mut self, amount: f32) {
        self.energy = (self.energy - amount).max(0.0);
    }

    pub fn add_energy(&mut self, amount: f32, species: &Species) {
        self.energy = (self.energy + amount).clamp(0.0, species.max_energy);
    }

    /// Movement likelihood is proportional to remaining energy
    pub fn wants_to_move(&self, species: &Species, rng: &mut ChaCha8Rng) -> bool {
        if !self.alive || species.move_speed == 0 {
            return false;
        }
        rng.gen::<f32>() < self.energy_fraction(species)
    }

    /// Advance age by one tick and pay the maintenance cost
    pub fn age_tick(&mut self, config: &EnergyConfig) -> Option<Death> {
        self.age += 1;
        self.consume_energy(config.aging_cost);

        let death = if self.age > config.max_age {
            Some(Death::OldAge)
        } else if self.energy <= 0.0 {
            Some(Death::Starvation)
        } else {
            None
        };

        if death.is_some() {
            self.alive = false;
        }
        death
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// Whether the diet allows grazing right now
    pub fn wants_plants(&self, species: &Species) -> bool {
        match species.diet {
            Diet::Herbivore => true,
            Diet::Predator => false,
            Diet::Omnivore {
                plant_fallback_below,
            } => self.energy < plant_fallback_below * species.max_energy,
        }
    }

    pub fn can_breed(&self, species: &Species, config: &ReproductionConfig) -> bool {
        self.alive && self.energy >= config.energy_threshold * species.max_energy
    }

    /// Produce an offspring at `position` and pay this parent's share of the cost
    pub fn breed(
        &mut self,
        child_id: AnimalId,
        position: Position,
        species: &Species,
        config: &ReproductionConfig,
    ) -> Animal {
        self.pay_breeding_cost(config);
        Animal::offspring(child_id, species, position, config)
    }

    pub fn pay_breeding_cost(&mut self, config: &ReproductionConfig) {
        self.energy *= config.parent_energy_retained;
        self.offspring += 1;
    }

    pub fn record_kill(&mut self) {
        self.kills += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use island_core::SpeciesCatalog;
    use rand::SeedableRng;

    fn species(id: SpeciesId) -> Species {
        SpeciesCatalog::standard().get(id).unwrap().clone()
    }

    #[test]
    fn test_animal_creation() {
        let wolf = species(SpeciesId::Wolf);
        let animal = Animal::new(AnimalId(1), &wolf, Position::new(2, 3), 500.0);

        assert_eq!(animal.species, SpeciesId::Wolf);
        assert_eq!(animal.position, Position::new(2, 3));
        assert_eq!(animal.energy, wolf.max_energy);
        assert!(animal.is_alive());
    }

    #[test]
    fn test_energy_management() {
        let rabbit = species(SpeciesId::Rabbit);
        let mut animal = Animal::new(AnimalId(1), &rabbit, Position::new(0, 0), 10.0);

        animal.consume_energy(4.0);
        assert_eq!(animal.energy, 6.0);

        animal.consume_energy(100.0);
        assert_eq!(animal.energy, 0.0);

        animal.add_energy(1000.0, &rabbit);
        assert_eq!(animal.energy, rabbit.max_energy);
    }

    #[test]
    fn test_aging_and_death() {
        let config = EnergyConfig {
            aging_cost: 1.0,
            max_age: 3,
            ..Default::default()
        };
        let rabbit = species(SpeciesId::Rabbit);
        let mut animal = Animal::new(AnimalId(1), &rabbit, Position::new(0, 0), 20.0);

        assert_eq!(animal.age_tick(&config), None);
        assert_eq!(animal.age_tick(&config), None);
        assert_eq!(animal.age_tick(&config), None);
        assert_eq!(animal.energy, 17.0);
        assert_eq!(animal.age_tick(&config), Some(Death::OldAge));
        assert!(!animal.is_alive());

        let mut starving = Animal::new(AnimalId(2), &rabbit, Position::new(0, 0), 0.5);
        assert_eq!(starving.age_tick(&config), Some(Death::Starvation));
        assert_eq!(starving.energy, 0.0);
    }

    #[test]
    fn test_movement_likelihood() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let rabbit = species(SpeciesId::Rabbit);
        let caterpillar = species(SpeciesId::Caterpillar);

        let full = Animal::new(AnimalId(1), &rabbit, Position::new(0, 0), rabbit.max_energy);
        let empty = Animal::new(AnimalId(2), &rabbit, Position::new(0, 0), 0.0);
        let still = Animal::new(AnimalId(3), &caterpillar, Position::new(0, 0), 10.0);

        for _ in 0..50 {
            assert!(full.wants_to_move(&rabbit, &mut rng));
            assert!(!empty.wants_to_move(&rabbit, &mut rng));
            assert!(!still.wants_to_move(&caterpillar, &mut rng));
        }
    }

    #[test]
    fn test_wants_plants_by_diet() {
        let bear = species(SpeciesId::Bear);
        let wolf = species(SpeciesId::Wolf);
        let deer = species(SpeciesId::Deer);

        let hungry_bear = Animal::new(AnimalId(1), &bear, Position::new(0, 0), 10.0);
        let fed_bear = Animal::new(AnimalId(2), &bear, Position::new(0, 0), 140.0);
        let wolf_animal = Animal::new(AnimalId(3), &wolf, Position::new(0, 0), 1.0);
        let deer_animal = Animal::new(AnimalId(4), &deer, Position::new(0, 0), 60.0);

        assert!(hungry_bear.wants_plants(&bear));
        assert!(!fed_bear.wants_plants(&bear));
        assert!(!wolf_animal.wants_plants(&wolf));
        assert!(deer_animal.wants_plants(&deer));
    }

    #[test]
    fn test_breeding() {
        let config = ReproductionConfig::default();
        let sheep = species(SpeciesId::Sheep);
        let mut parent = Animal::new(AnimalId(1), &sheep, Position::new(1, 1), 40.0);

        assert!(parent.can_breed(&sheep, &config));

        let child = parent.breed(AnimalId(9), Position::new(2, 1), &sheep, &config);
        assert_eq!(child.id, AnimalId(9));
        assert_eq!(child.position, Position::new(2, 1));
        assert_eq!(child.energy, sheep.max_energy * 0.5);
        assert_eq!(child.age, 0);
        assert!((parent.energy - 24.0).abs() < 1e-4);
        assert_eq!(parent.offspring, 1);
        assert!(!parent.can_breed(&sheep, &config));
    }
}

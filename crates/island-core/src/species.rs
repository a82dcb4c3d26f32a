//! Species catalog.
//!
//! Every behavioral difference between animals is data in a [`Species`]
//! record. The engine uses a single `Animal` type and dispatches feeding on
//! the closed [`Diet`] enum, so adding a species is a table edit.

use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identity of a species. Ordering is the catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpeciesId {
    Wolf,
    Fox,
    Bear,
    Eagle,
    Boar,
    Rabbit,
    Mouse,
    Deer,
    Sheep,
    Goat,
    Duck,
    Caterpillar,
}

impl SpeciesId {
    pub const COUNT: usize = 12;

    pub fn all() -> [SpeciesId; Self::COUNT] {
        use SpeciesId::*;
        [
            Wolf, Fox, Bear, Eagle, Boar, Rabbit, Mouse, Deer, Sheep, Goat, Duck, Caterpillar,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpeciesId::Wolf => "wolf",
            SpeciesId::Fox => "fox",
            SpeciesId::Bear => "bear",
            SpeciesId::Eagle => "eagle",
            SpeciesId::Boar => "boar",
            SpeciesId::Rabbit => "rabbit",
            SpeciesId::Mouse => "mouse",
            SpeciesId::Deer => "deer",
            SpeciesId::Sheep => "sheep",
            SpeciesId::Goat => "goat",
            SpeciesId::Duck => "duck",
            SpeciesId::Caterpillar => "caterpillar",
        }
    }

    /// Display token used by renderers
    pub fn emoji(&self) -> &'static str {
        match self {
            SpeciesId::Wolf => "🐺",
            SpeciesId::Fox => "🦊",
            SpeciesId::Bear => "🐻",
            SpeciesId::Eagle => "🦅",
            SpeciesId::Boar => "🐗",
            SpeciesId::Rabbit => "🐰",
            SpeciesId::Mouse => "🐭",
            SpeciesId::Deer => "🦌",
            SpeciesId::Sheep => "🐑",
            SpeciesId::Goat => "🐐",
            SpeciesId::Duck => "🦆",
            SpeciesId::Caterpillar => "🐛",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Feeding behavior variant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Diet {
    /// Eats plants in its own cell, never hunts
    Herbivore,
    /// Hunts the species on its prey list, never eats plants
    Predator,
    /// Hunts first, eats plants when energy is below the given fraction of max energy
    Omnivore { plant_fallback_below: f32 },
}

/// Immutable trait profile shared by all animals of a species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    /// Maximum number of steps per movement phase
    pub move_speed: u8,
    pub max_energy: f32,
    pub diet: Diet,
    /// Species this one may hunt
    pub prey: Vec<SpeciesId>,
    pub energy_gain_on_eat: f32,
    pub energy_gain_on_plant: f32,
}

impl Species {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn emoji(&self) -> &'static str {
        self.id.emoji()
    }

    pub fn eats_plants(&self) -> bool {
        !matches!(self.diet, Diet::Predator)
    }

    pub fn hunts(&self) -> bool {
        !matches!(self.diet, Diet::Herbivore)
    }

    fn validate(&self) -> Result<()> {
        if self.move_speed > 4 {
            return Err(Error::Validation(format!(
                "{}: move_speed {} exceeds 4",
                self.id, self.move_speed
            )));
        }
        if !(self.max_energy > 0.0) {
            return Err(Error::Validation(format!(
                "{}: max_energy must be positive",
                self.id
            )));
        }
        if self.energy_gain_on_eat < 0.0 || self.energy_gain_on_plant < 0.0 {
            return Err(Error::Validation(format!(
                "{}: energy gains must not be negative",
                self.id
            )));
        }
        match self.diet {
            Diet::Herbivore if !self.prey.is_empty() => Err(Error::Validation(format!(
                "{}: herbivores cannot have prey",
                self.id
            ))),
            Diet::Omnivore { plant_fallback_below } if !(0.0..=1.0).contains(&plant_fallback_below) => {
                Err(Error::Validation(format!(
                    "{}: plant_fallback_below must be within [0, 1]",
                    self.id
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Read-only table of species, shared by reference with every operation
/// that needs traits.
#[derive(Debug, Clone)]
pub struct SpeciesCatalog {
    species: Vec<Species>,
    slots: [Option<usize>; SpeciesId::COUNT],
}

impl SpeciesCatalog {
    /// Build a catalog from an arbitrary set of species. Entries are kept in
    /// `SpeciesId` order.
    pub fn new(mut species: Vec<Species>) -> Result<Self> {
        if species.is_empty() {
            return Err(Error::Validation("Species catalog is empty".to_string()));
        }
        species.sort_by_key(|s| s.id);

        let mut slots = [None; SpeciesId::COUNT];
        for (idx, entry) in species.iter().enumerate() {
            entry.validate()?;
            if slots[entry.id.index()].replace(idx).is_some() {
                return Err(Error::Validation(format!("Duplicate species {}", entry.id)));
            }
        }

        debug!(species = species.len(), "Species catalog built");
        Ok(Self { species, slots })
    }

    /// The built-in island fauna
    pub fn standard() -> Self {
        use SpeciesId::*;

        let table = vec![
            predator(Wolf, 3, 80.0, &[Rabbit, Mouse, Goat, Sheep, Deer, Duck], 25.0),
            predator(Fox, 2, 40.0, &[Rabbit, Mouse, Duck, Caterpillar], 15.0),
            omnivore(Bear, 2, 150.0, 0.5, &[Rabbit, Mouse, Goat, Sheep, Deer, Duck, Fox], 40.0, 10.0),
            predator(Eagle, 4, 30.0, &[Rabbit, Mouse, Duck, Fox], 12.0),
            omnivore(Boar, 2, 70.0, 0.6, &[Mouse, Caterpillar], 8.0, 8.0),
            herbivore(Rabbit, 2, 20.0, 5.0),
            herbivore(Mouse, 1, 10.0, 3.0),
            herbivore(Deer, 4, 60.0, 12.0),
            herbivore(Sheep, 3, 50.0, 10.0),
            herbivore(Goat, 3, 45.0, 10.0),
            omnivore(Duck, 4, 15.0, 0.8, &[Caterpillar], 4.0, 3.0),
            herbivore(Caterpillar, 0, 10.0, 2.0),
        ];

        let mut slots = [None; SpeciesId::COUNT];
        for (idx, entry) in table.iter().enumerate() {
            slots[entry.id.index()] = Some(idx);
        }
        Self {
            species: table,
            slots,
        }
    }

    /// All species in catalog order
    pub fn all(&self) -> &[Species] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.slots[id.index()].map(|idx| &self.species[idx])
    }

    /// Like [`get`](Self::get) but treats a missing species as an error
    pub fn lookup(&self, id: SpeciesId) -> Result<&Species> {
        self.get(id)
            .ok_or_else(|| Error::Validation(format!("Species {} is not in the catalog", id)))
    }

    pub fn contains(&self, id: SpeciesId) -> bool {
        self.slots[id.index()].is_some()
    }

    /// Uniform pick among the catalog entries
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> &Species {
        &self.species[rng.gen_range(0..self.species.len())]
    }

    /// Species-to-species diet check
    pub fn can_eat(&self, hunter: SpeciesId, prey: SpeciesId) -> bool {
        self.get(hunter)
            .map(|species| species.hunts() && species.prey.contains(&prey))
            .unwrap_or(false)
    }
}

impl Default for SpeciesCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn herbivore(id: SpeciesId, move_speed: u8, max_energy: f32, plant_gain: f32) -> Species {
    Species {
        id,
        move_speed,
        max_energy,
        diet: Diet::Herbivore,
        prey: Vec::new(),
        energy_gain_on_eat: 0.0,
        energy_gain_on_plant: plant_gain,
    }
}

fn predator(id: SpeciesId, move_speed: u8, max_energy: f32, prey: &[SpeciesId], gain: f32) -> Species {
    Species {
        id,
        move_speed,
        max_energy,
        diet: Diet::Predator,
        prey: prey.to_vec(),
        energy_gain_on_eat: gain,
        energy_gain_on_plant: 0.0,
    }
}

fn omnivore(
    id: SpeciesId,
    move_speed: u8,
    max_energy: f32,
    plant_fallback_below: f32,
    prey: &[SpeciesId],
    gain: f32,
    plant_gain: f32,
) -> Species {
    Species {
        id,
        move_speed,
        max_energy,
        diet: Diet::Omnivore {
            plant_fallback_below,
        },
        prey: prey.to_vec(),
        energy_gain_on_eat: gain,
        energy_gain_on_plant: plant_gain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = SpeciesCatalog::standard();
        assert_eq!(catalog.len(), SpeciesId::COUNT);

        // The standard table must pass the same checks as a custom one
        let rebuilt = SpeciesCatalog::new(catalog.all().to_vec());
        assert!(rebuilt.is_ok());

        for species in catalog.all() {
            assert!(species.move_speed <= 4);
            assert!(species.max_energy >= 10.0 && species.max_energy <= 150.0);
        }
    }

    #[test]
    fn test_all_is_ordered_by_id() {
        let catalog = SpeciesCatalog::standard();
        let ids: Vec<SpeciesId> = catalog.all().iter().map(|s| s.id).collect();
        assert_eq!(ids, SpeciesId::all().to_vec());
    }

    #[test]
    fn test_diet_predicates() {
        let catalog = SpeciesCatalog::standard();

        assert!(catalog.can_eat(SpeciesId::Wolf, SpeciesId::Rabbit));
        assert!(!catalog.can_eat(SpeciesId::Wolf, SpeciesId::Bear));
        assert!(!catalog.can_eat(SpeciesId::Rabbit, SpeciesId::Mouse));
        assert!(catalog.can_eat(SpeciesId::Bear, SpeciesId::Fox));

        for id in SpeciesId::all() {
            let species = catalog.get(id).unwrap();
            if species.diet == Diet::Herbivore {
                assert!(SpeciesId::all().iter().all(|prey| !catalog.can_eat(id, *prey)));
                assert!(species.eats_plants());
            }
        }

        assert!(!catalog.get(SpeciesId::Wolf).unwrap().eats_plants());
        assert!(catalog.get(SpeciesId::Boar).unwrap().eats_plants());
    }

    #[test]
    fn test_custom_catalog_rejects_bad_entries() {
        let duplicate = vec![
            herbivore(SpeciesId::Rabbit, 2, 20.0, 5.0),
            herbivore(SpeciesId::Rabbit, 1, 10.0, 5.0),
        ];
        assert!(SpeciesCatalog::new(duplicate).is_err());

        let too_fast = vec![herbivore(SpeciesId::Deer, 9, 60.0, 12.0)];
        assert!(SpeciesCatalog::new(too_fast).is_err());

        let mut hunting_herbivore = herbivore(SpeciesId::Goat, 3, 45.0, 10.0);
        hunting_herbivore.prey.push(SpeciesId::Mouse);
        assert!(SpeciesCatalog::new(vec![hunting_herbivore]).is_err());

        assert!(SpeciesCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_lookup_missing_species() {
        let catalog = SpeciesCatalog::new(vec![
            predator(SpeciesId::Wolf, 3, 80.0, &[SpeciesId::Rabbit], 25.0),
            herbivore(SpeciesId::Rabbit, 2, 20.0, 5.0),
        ])
        .unwrap();

        assert!(catalog.contains(SpeciesId::Wolf));
        assert!(catalog.lookup(SpeciesId::Bear).is_err());
        assert!(!catalog.can_eat(SpeciesId::Bear, SpeciesId::Rabbit));
    }

    #[test]
    fn test_random_only_returns_catalog_species() {
        let catalog = SpeciesCatalog::new(vec![
            herbivore(SpeciesId::Rabbit, 2, 20.0, 5.0),
            herbivore(SpeciesId::Mouse, 1, 10.0, 3.0),
        ])
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..100 {
            let id = catalog.random(&mut rng).id;
            assert!(id == SpeciesId::Rabbit || id == SpeciesId::Mouse);
        }
    }
}

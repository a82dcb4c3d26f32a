//! Published world snapshots.
//!
//! A [`WorldSnapshot`] is an immutable, fully owned copy of the world after a
//! tick. The [`SnapshotPublisher`] holds the visible one; readers clone the
//! `Arc` and never observe a partially written grid.

use crate::animal::Animal;
use crate::grid::Grid;
use island_core::{Position, Result, SpeciesId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Event counts for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub births: u32,
    pub deaths_of_age: u32,
    pub deaths_of_starvation: u32,
    pub kills: u32,
    pub plants_eaten: u32,
    pub plants_grown: u32,
    /// Movement attempts, including ones absorbed by an edge
    pub moves: u32,
    pub blocked_moves: u32,
}

impl TickSummary {
    pub fn deaths(&self) -> u32 {
        self.deaths_of_age + self.deaths_of_starvation + self.kills
    }
}

/// Immutable view of the world at the end of a tick. Only the engine
/// builds one; the serialized form is for comparison and export.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    tick: u64,
    grid: Grid,
    species_counts: BTreeMap<SpeciesId, usize>,
    summary: TickSummary,
    next_animal_id: u64,
}

impl WorldSnapshot {
    pub(crate) fn new(tick: u64, grid: Grid, summary: TickSummary, next_animal_id: u64) -> Self {
        let mut species_counts = BTreeMap::new();
        for animal in grid.animals() {
            *species_counts.entry(animal.species).or_insert(0) += 1;
        }

        Self {
            tick,
            grid,
            species_counts,
            summary,
            next_animal_id,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn width(&self) -> i32 {
        self.grid.width
    }

    pub fn height(&self) -> i32 {
        self.grid.height
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn summary(&self) -> &TickSummary {
        &self.summary
    }

    pub(crate) fn next_animal_id(&self) -> u64 {
        self.next_animal_id
    }

    /// Live animals per species. Species with no animals are absent.
    pub fn species_counts(&self) -> &BTreeMap<SpeciesId, usize> {
        &self.species_counts
    }

    pub fn count_of(&self, species: SpeciesId) -> usize {
        self.species_counts.get(&species).copied().unwrap_or(0)
    }

    /// Counts keyed by display token, for presentation
    pub fn counts_by_emoji(&self) -> BTreeMap<&'static str, usize> {
        self.species_counts
            .iter()
            .map(|(species, count)| (species.emoji(), *count))
            .collect()
    }

    pub fn population(&self) -> usize {
        self.species_counts.values().sum()
    }

    pub fn animals(&self) -> impl Iterator<Item = &Animal> + '_ {
        self.grid.animals()
    }

    pub fn animal_at(&self, x: i32, y: i32) -> Result<Option<&Animal>> {
        self.grid.occupant(Position::new(x, y))
    }

    pub fn plants_at(&self, x: i32, y: i32) -> Result<u8> {
        self.grid.plants(Position::new(x, y))
    }

    pub fn char_at(&self, x: i32, y: i32) -> Result<&'static str> {
        self.grid.char_at(Position::new(x, y))
    }

    /// Text rendering: one line per row, occupant emoji, plant level digit
    /// or `.` for bare ground
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (pos, cell) in self.grid.iter() {
            match cell.occupant() {
                Some(animal) => out.push_str(animal.species.emoji()),
                None if cell.plants() > 0 => {
                    let _ = write!(out, "{:>2}", cell.plants());
                }
                None => out.push_str(" ."),
            }
            if pos.x == self.grid.width - 1 {
                out.push('\n');
            }
        }
        out
    }

    /// Canonical binary encoding, used to compare snapshots bit for bit
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Holds the currently visible snapshot
pub struct SnapshotPublisher {
    current: RwLock<Arc<WorldSnapshot>>,
}

impl SnapshotPublisher {
    pub fn new(initial: WorldSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Swap in a new snapshot. Only the tick engine publishes.
    pub(crate) fn publish(&self, snapshot: Arc<WorldSnapshot>) {
        *self.current.write() = snapshot;
    }

    pub fn current(&self) -> Arc<WorldSnapshot> {
        self.current.read().clone()
    }

    pub fn species_counts(&self) -> BTreeMap<SpeciesId, usize> {
        self.current().species_counts().clone()
    }

    /// Tick number of the visible snapshot
    pub fn version(&self) -> u64 {
        self.current.read().tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use island_core::{AnimalId, SpeciesCatalog};

    fn sample_grid() -> Grid {
        let catalog = SpeciesCatalog::standard();
        let mut grid = Grid::new(3, 2, 4).unwrap();
        let wolf = catalog.get(SpeciesId::Wolf).unwrap();
        let rabbit = catalog.get(SpeciesId::Rabbit).unwrap();

        grid.place(Position::new(0, 0), Animal::new(AnimalId(1), wolf, Position::new(0, 0), 50.0))
            .unwrap();
        grid.place(Position::new(2, 1), Animal::new(AnimalId(2), rabbit, Position::new(2, 1), 10.0))
            .unwrap();
        grid.place(Position::new(1, 1), Animal::new(AnimalId(3), rabbit, Position::new(1, 1), 10.0))
            .unwrap();
        grid.set_plants(Position::new(1, 0), 3).unwrap();
        grid
    }

    #[test]
    fn test_species_counts() {
        let snapshot = WorldSnapshot::new(4, sample_grid(), TickSummary::default(), 4);

        assert_eq!(snapshot.tick(), 4);
        assert_eq!(snapshot.count_of(SpeciesId::Wolf), 1);
        assert_eq!(snapshot.count_of(SpeciesId::Rabbit), 2);
        assert_eq!(snapshot.count_of(SpeciesId::Bear), 0);
        assert_eq!(snapshot.population(), 3);
        assert_eq!(snapshot.counts_by_emoji().get("🐰"), Some(&2));
    }

    #[test]
    fn test_queries() {
        let snapshot = WorldSnapshot::new(0, sample_grid(), TickSummary::default(), 4);

        assert_eq!(snapshot.char_at(0, 0).unwrap(), "🐺");
        assert_eq!(snapshot.char_at(1, 0).unwrap(), "");
        assert_eq!(snapshot.plants_at(1, 0).unwrap(), 3);
        assert_eq!(snapshot.animal_at(2, 1).unwrap().unwrap().id, AnimalId(2));
        assert!(snapshot.animal_at(3, 0).is_err());
    }

    #[test]
    fn test_render_text() {
        let snapshot = WorldSnapshot::new(0, sample_grid(), TickSummary::default(), 4);
        let text = snapshot.render_text();

        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.lines().next().unwrap(), "🐺 3 .");
    }

    #[test]
    fn test_publish_swaps_whole_snapshot() {
        let publisher = SnapshotPublisher::new(WorldSnapshot::new(
            0,
            Grid::new(3, 2, 4).unwrap(),
            TickSummary::default(),
            1,
        ));
        let held = publisher.current();

        publisher.publish(Arc::new(WorldSnapshot::new(
            1,
            sample_grid(),
            TickSummary::default(),
            4,
        )));

        // A reader holding the old Arc keeps its view
        assert_eq!(held.tick(), 0);
        assert_eq!(held.population(), 0);

        assert_eq!(publisher.version(), 1);
        assert_eq!(publisher.current().population(), 3);
        assert_eq!(publisher.species_counts().get(&SpeciesId::Rabbit), Some(&2));
    }

    #[test]
    fn test_to_bytes_is_stable() {
        let a = WorldSnapshot::new(2, sample_grid(), TickSummary::default(), 4);
        let b = WorldSnapshot::new(2, sample_grid(), TickSummary::default(), 4);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());

        let c = WorldSnapshot::new(3, sample_grid(), TickSummary::default(), 4);
        assert_ne!(a.to_bytes().unwrap(), c.to_bytes().unwrap());
    }
}

//! 2D grid for the world.

use crate::animal::Animal;
use island_core::{grid_cell_count, AnimalId, Error, Position, Result, WorldConfig};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One grid cell: a plant count and a single animal slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    plants: u8,
    occupant: Option<Animal>,
}

impl Cell {
    pub fn plants(&self) -> u8 {
        self.plants
    }

    pub fn occupant(&self) -> Option<&Animal> {
        self.occupant.as_ref()
    }

    pub fn is_vacant(&self) -> bool {
        self.occupant.is_none()
    }
}

/// A bounded 2D grid. Coordinates never wrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridData")]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    max_plants: u8,
    cells: Vec<Cell>,
}

/// Decoded form of a grid, checked before it becomes a [`Grid`]
#[derive(Deserialize)]
struct GridData {
    width: i32,
    height: i32,
    max_plants: u8,
    cells: Vec<Cell>,
}

impl TryFrom<GridData> for Grid {
    type Error = Error;

    fn try_from(data: GridData) -> Result<Self> {
        let size = grid_cell_count(data.width, data.height)?;
        if data.cells.len() != size {
            return Err(Error::InvariantViolation(format!(
                "{}x{} grid decoded with {} cells",
                data.width,
                data.height,
                data.cells.len()
            )));
        }

        let grid = Self {
            width: data.width,
            height: data.height,
            max_plants: data.max_plants,
            cells: data.cells,
        };
        for (pos, cell) in grid.iter() {
            if cell.plants > grid.max_plants {
                return Err(Error::InvariantViolation(format!(
                    "cell {} holds {} plants, cap is {}",
                    pos, cell.plants, grid.max_plants
                )));
            }
            if let Some(animal) = &cell.occupant {
                if animal.position != pos {
                    return Err(Error::InvariantViolation(format!(
                        "animal {} stored at {} believes it is at {}",
                        animal.id, pos, animal.position
                    )));
                }
            }
        }
        Ok(grid)
    }
}

impl Grid {
    /// Empty grid. Fails with `Validation` for dimensions below 1x1 or above
    /// the engine's cell cap.
    pub fn new(width: i32, height: i32, max_plants: u8) -> Result<Self> {
        let size = grid_cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            max_plants,
            cells: vec![Cell::default(); size],
        })
    }

    /// Create a grid from world configuration, seeding plants only
    pub fn from_config(config: &WorldConfig, rng: &mut ChaCha8Rng) -> Result<Self> {
        let mut grid = Self::new(config.width, config.height, config.max_plants_per_cell)?;

        for cell in &mut grid.cells {
            if rng.gen::<f32>() < config.plant_density {
                cell.plants = rng.gen_range(1..=config.max_plants_per_cell);
            }
        }

        Ok(grid)
    }

    pub fn max_plants(&self) -> u8 {
        self.max_plants
    }

    /// Fail with `OutOfBounds` unless `pos` lies on the grid
    pub fn check(&self, pos: Position) -> Result<()> {
        if pos.in_bounds(self.width, self.height) {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn cell(&self, pos: Position) -> Result<&Cell> {
        self.check(pos)?;
        Ok(&self.cells[self.index(pos)])
    }

    pub fn cell_at(&self, x: i32, y: i32) -> Result<&Cell> {
        self.cell(Position::new(x, y))
    }

    fn cell_mut(&mut self, pos: Position) -> Result<&mut Cell> {
        self.check(pos)?;
        let index = self.index(pos);
        Ok(&mut self.cells[index])
    }

    pub fn occupant(&self, pos: Position) -> Result<Option<&Animal>> {
        Ok(self.cell(pos)?.occupant.as_ref())
    }

    pub fn occupant_mut(&mut self, pos: Position) -> Result<Option<&mut Animal>> {
        Ok(self.cell_mut(pos)?.occupant.as_mut())
    }

    pub fn is_occupied(&self, pos: Position) -> Result<bool> {
        Ok(!self.cell(pos)?.is_vacant())
    }

    /// Replace the slot at `pos`, returning the previous occupant. A placed
    /// animal has its position updated to `pos`.
    pub fn set_occupant(&mut self, pos: Position, animal: Option<Animal>) -> Result<Option<Animal>> {
        let cell = self.cell_mut(pos)?;
        let animal = animal.map(|mut animal| {
            animal.position = pos;
            animal
        });
        Ok(std::mem::replace(&mut cell.occupant, animal))
    }

    /// Put an animal into an empty slot
    pub fn place(&mut self, pos: Position, animal: Animal) -> Result<()> {
        if let Some(existing) = self.occupant(pos)? {
            return Err(Error::InvariantViolation(format!(
                "cannot place {} at {}: cell already holds {}",
                animal.id, pos, existing.id
            )));
        }
        self.set_occupant(pos, Some(animal))?;
        Ok(())
    }

    pub fn take(&mut self, pos: Position) -> Result<Option<Animal>> {
        self.set_occupant(pos, None)
    }

    /// Transfer the occupant of `from` into the empty slot at `to`
    pub fn move_occupant(&mut self, from: Position, to: Position) -> Result<()> {
        self.check(to)?;
        if self.is_occupied(to)? {
            return Err(Error::InvariantViolation(format!(
                "cannot move into occupied cell {}",
                to
            )));
        }
        let animal = self.take(from)?.ok_or_else(|| {
            Error::InvariantViolation(format!("no animal to move at {}", from))
        })?;
        self.set_occupant(to, Some(animal))?;
        Ok(())
    }

    pub fn plants(&self, pos: Position) -> Result<u8> {
        Ok(self.cell(pos)?.plants)
    }

    /// Set the plant count, clamped to the per-cell cap
    pub fn set_plants(&mut self, pos: Position, plants: u8) -> Result<()> {
        let max = self.max_plants;
        self.cell_mut(pos)?.plants = plants.min(max);
        Ok(())
    }

    /// Add one plant unit. Returns false when the cell is already at the cap.
    pub fn add_plant(&mut self, pos: Position) -> Result<bool> {
        let max = self.max_plants;
        let cell = self.cell_mut(pos)?;
        if cell.plants < max {
            cell.plants += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove one plant unit. Returns false when there is none.
    pub fn remove_plant(&mut self, pos: Position) -> Result<bool> {
        let cell = self.cell_mut(pos)?;
        if cell.plants > 0 {
            cell.plants -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Every cell below the cap gains one unit with probability `rate`.
    /// Returns the number of units grown.
    pub fn regrow_plants(&mut self, rate: f32, rng: &mut ChaCha8Rng) -> usize {
        let max = self.max_plants;
        let mut grown = 0;
        for cell in &mut self.cells {
            if cell.plants < max && rng.gen::<f32>() < rate {
                cell.plants += 1;
                grown += 1;
            }
        }
        grown
    }

    /// Clamp signed coordinates onto the grid
    pub fn clamp(&self, x: i32, y: i32) -> Position {
        Position::new(x, y).clamp(self.width, self.height)
    }

    /// In-bounds cells of the 3x3 block centered on `pos`, center included,
    /// in row-major offset order
    pub fn neighborhood(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dx| {
                let neighbor = pos.add(dx, dy);
                neighbor.in_bounds(self.width, self.height).then_some(neighbor)
            })
        })
    }

    /// Number of animals in the 3x3 block centered on `pos`
    pub fn occupancy_around(&self, pos: Position) -> usize {
        self.neighborhood(pos)
            .filter(|neighbor| !self.cells[self.index(*neighbor)].is_vacant())
            .count()
    }

    fn index(&self, pos: Position) -> usize {
        debug_assert!(
            pos.in_bounds(self.width, self.height),
            "position {} outside {}x{} grid",
            pos,
            self.width,
            self.height
        );
        let pos = pos.clamp(self.width, self.height);
        (pos.y * self.width + pos.x) as usize
    }

    /// Get position from index
    pub fn index_to_pos(&self, index: usize) -> Position {
        let x = (index as i32) % self.width;
        let y = (index as i32) / self.width;
        Position::new(x, y)
    }

    /// Iterator over all positions, row-major
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.cells.len()).map(move |i| self.index_to_pos(i))
    }

    /// Iterator over all cells with positions, row-major
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.index_to_pos(i), cell))
    }

    pub fn animals(&self) -> impl Iterator<Item = &Animal> + '_ {
        self.cells.iter().filter_map(|cell| cell.occupant.as_ref())
    }

    /// Occupied positions with their animal ids, row-major
    pub fn roster(&self) -> Vec<(Position, AnimalId)> {
        self.iter()
            .filter_map(|(pos, cell)| cell.occupant.as_ref().map(|animal| (pos, animal.id)))
            .collect()
    }

    pub fn population(&self) -> usize {
        self.animals().count()
    }

    pub fn total_plants(&self) -> usize {
        self.cells.iter().map(|cell| cell.plants as usize).sum()
    }

    /// Occupant emoji, or an empty string for a vacant cell
    pub fn char_at(&self, pos: Position) -> Result<&'static str> {
        Ok(self
            .occupant(pos)?
            .map(|animal| animal.species.emoji())
            .unwrap_or(""))
    }
}

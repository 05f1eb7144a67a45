//! Minesweeper game-state engine.
//!
//! The [`GameEngine`] owns the board and is the sole authority over game
//! progression: mine placement is deferred to the first reveal (so the first
//! move never hits a mine), reveals cascade through zero-count regions, and
//! the engine tracks win/loss itself. Rendering, input handling, and timers
//! belong to the caller, which observes the game through read-only
//! [`BoardSnapshot`]/[`CellView`] projections.

use core::ops::Index;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub use cell::*;
pub use engine::*;
pub use error::*;
pub use generator::*;
pub use types::*;
pub use view::*;

mod cell;
mod engine;
mod error;
mod generator;
mod types;
mod view;

/// Immutable board parameters for one game.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub rows: Coord,
    pub cols: Coord,
    pub mines: CellCount,
}

impl BoardConfig {
    pub const BEGINNER: Self = Self::new_unchecked(9, 9, 10);
    pub const INTERMEDIATE: Self = Self::new_unchecked(16, 16, 40);
    pub const EXPERT: Self = Self::new_unchecked(16, 32, 99);
    pub const IMPOSSIBLE: Self = Self::new_unchecked(18, 50, 199);

    pub const fn new_unchecked(rows: Coord, cols: Coord, mines: CellCount) -> Self {
        Self { rows, cols, mines }
    }

    pub fn new(rows: Coord, cols: Coord, mines: CellCount) -> Result<Self> {
        let config = Self::new_unchecked(rows, cols, mines);
        config.validate()?;
        Ok(config)
    }

    /// A board needs at least one row and column, and at least one safe cell
    /// so a first reveal is always possible.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 || self.mines >= self.total_cells() {
            Err(GameError::InvalidConfig)
        } else {
            Ok(())
        }
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.rows, self.cols)
    }

    pub const fn safe_cells(&self) -> CellCount {
        self.total_cells() - self.mines
    }

    pub const fn contains(&self, coords: Coord2) -> bool {
        coords.0 < self.rows && coords.1 < self.cols
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        if self.contains(coords) {
            Ok(coords)
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    pub const fn size(&self) -> Coord2 {
        (self.rows, self.cols)
    }
}

/// Mine positions for one game, plus the per-cell adjacent-mine counts
/// derived once at construction. Immutable after placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineLayout {
    mine_mask: Array2<bool>,
    adjacent: Array2<u8>,
    mine_count: CellCount,
}

impl MineLayout {
    pub fn from_mine_mask(mine_mask: Array2<bool>) -> Self {
        let mine_count = mine_mask
            .iter()
            .filter(|&&is_mine| is_mine)
            .count()
            .try_into()
            .unwrap();

        let mut adjacent = Array2::zeros(mine_mask.raw_dim());
        for ((row, col), count) in adjacent.indexed_iter_mut() {
            let center = (row.try_into().unwrap(), col.try_into().unwrap());
            *count = mine_mask
                .iter_neighbors(center)
                .filter(|&pos| mine_mask[pos.to_nd_index()])
                .count()
                .try_into()
                .unwrap();
        }

        Self {
            mine_mask,
            adjacent,
            mine_count,
        }
    }

    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(GameError::OutOfBounds);
            }
            mine_mask[coords.to_nd_index()] = true;
        }

        Ok(Self::from_mine_mask(mine_mask))
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.mine_mask.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn board_config(&self) -> BoardConfig {
        let (rows, cols) = self.size();
        BoardConfig::new_unchecked(rows, cols, self.mine_count)
    }

    pub fn total_cells(&self) -> CellCount {
        self.mine_mask.len().try_into().unwrap()
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn contains_mine(&self, coords: Coord2) -> bool {
        self[coords]
    }

    pub fn adjacent_mine_count(&self, coords: Coord2) -> u8 {
        self.adjacent[coords.to_nd_index()]
    }

    pub fn iter_mines(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.mine_mask
            .indexed_iter()
            .filter(|&(_, &is_mine)| is_mine)
            .map(|((row, col), _)| (row.try_into().unwrap(), col.try_into().unwrap()))
    }
}

impl Index<Coord2> for MineLayout {
    type Output = bool;

    fn index(&self, coords: Coord2) -> &Self::Output {
        &self.mine_mask[coords.to_nd_index()]
    }
}

/// Outcome of a flag toggle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlagOutcome {
    NoChange,
    Changed,
}

impl FlagOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}

/// Outcome of a reveal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    HitMine,
    Won,
}

impl RevealOutcome {
    pub const fn has_update(self) -> bool {
        use RevealOutcome::*;
        match self {
            NoChange => false,
            Revealed => true,
            HitMine => true,
            Won => true,
        }
    }
}

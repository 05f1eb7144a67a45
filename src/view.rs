use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// What a caller is allowed to see of one cell.
///
/// `is_mine` is only truthful once the cell is revealed or the game is over;
/// until then it reads `false` so a presentation layer cannot leak hidden
/// mine locations. Flag, reveal, and adjacency data are always populated
/// (adjacency is 0 before mines are placed).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub is_mine: bool,
    pub is_flagged: bool,
    pub is_revealed: bool,
    pub adjacent_mines: u8,
}

/// Full read-only projection of the board, for rendering or diffing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub config: BoardConfig,
    pub state: GameState,
    pub revealed_count: CellCount,
    pub flagged_count: CellCount,
    pub mines_left: isize,
    pub cells: Array2<CellView>,
}

impl BoardSnapshot {
    pub fn from_engine(engine: &GameEngine) -> Self {
        let (rows, cols) = engine.size();
        let cells = Array2::from_shape_fn((rows.into(), cols.into()), |(row, col)| {
            let coords = (row.try_into().unwrap(), col.try_into().unwrap());
            engine.view_of(coords)
        });

        Self {
            config: engine.config(),
            state: engine.state(),
            revealed_count: engine.revealed_count(),
            flagged_count: engine.flagged_count(),
            mines_left: engine.mines_left(),
            cells,
        }
    }

    pub fn cell(&self, coords: Coord2) -> &CellView {
        &self.cells[coords.to_nd_index()]
    }
}

impl GameEngine {
    pub fn cell_view(&self, coords: Coord2) -> Result<CellView> {
        let coords = self.config().validate_coords(coords)?;
        Ok(self.view_of(coords))
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot::from_engine(self)
    }

    fn view_of(&self, coords: Coord2) -> CellView {
        let cell = self
            .cell_at(coords)
            .unwrap_or(BoardCell::Hidden);
        let disclosed = cell.is_revealed() || self.state().is_terminal();

        CellView {
            is_mine: disclosed && self.has_mine_at(coords),
            is_flagged: cell.is_flagged(),
            is_revealed: cell.is_revealed(),
            adjacent_mines: self.adjacent_mines_at(coords),
        }
    }
}

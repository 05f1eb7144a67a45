use core::num::Saturating;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;

use ndarray::Array2;

use crate::*;

/// Game progression. `Won` and `Lost` are terminal; only [`GameEngine::reveal`]
/// moves the state forward.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameState {
    /// Fresh board, mines not placed yet.
    NotStarted,
    /// Mines placed, moves accepted.
    InProgress,
    Won,
    Lost,
}

impl GameState {
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Sole authority over one game's board and progression.
///
/// Mine placement is deferred to the first reveal so the clicked cell can be
/// excluded from placement, guaranteeing the first move never loses. The
/// board is owned exclusively by the engine; callers observe it through
/// [`CellView`]/[`BoardSnapshot`] projections.
#[derive(Clone, Debug)]
pub struct GameEngine {
    config: BoardConfig,
    layout: Option<MineLayout>,
    board: Array2<BoardCell>,
    revealed_count: Saturating<CellCount>,
    flagged_count: Saturating<CellCount>,
    state: GameState,
    triggered_mine: Option<Coord2>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    seed: u64,
    changed: Vec<Coord2>,
}

impl GameEngine {
    /// New game with an entropy-derived placement seed.
    pub fn new(config: BoardConfig) -> Result<Self> {
        Self::with_seed(config, rand::random())
    }

    /// New game whose mine placement is fully determined by `seed` and the
    /// first revealed cell.
    pub fn with_seed(config: BoardConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            layout: None,
            board: Array2::default(config.size().to_nd_index()),
            revealed_count: Saturating(0),
            flagged_count: Saturating(0),
            state: Default::default(),
            triggered_mine: None,
            started_at: None,
            ended_at: None,
            seed,
            changed: Vec::new(),
        })
    }

    /// New game over a pre-placed layout, for replays and tests. The first
    /// reveal skips placement but still starts the game.
    pub fn from_layout(layout: MineLayout) -> Result<Self> {
        let mut engine = Self::with_seed(layout.board_config(), 0)?;
        engine.layout = Some(layout);
        Ok(engine)
    }

    /// Discards all current state and begins a fresh game.
    pub fn start_new_game(&mut self, config: BoardConfig) -> Result<()> {
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn config(&self) -> BoardConfig {
        self.config
    }

    pub fn size(&self) -> Coord2 {
        self.config.size()
    }

    pub fn total_mines(&self) -> CellCount {
        self.config.mines
    }

    /// Remaining-mine estimate shown by counters: mines minus flags, may go
    /// negative when over-flagged. Display-only.
    pub fn mines_left(&self) -> isize {
        (self.config.mines as isize) - (self.flagged_count.0 as isize)
    }

    pub fn revealed_count(&self) -> CellCount {
        self.revealed_count.0
    }

    pub fn flagged_count(&self) -> CellCount {
        self.flagged_count.0
    }

    pub fn cell_at(&self, coords: Coord2) -> Result<BoardCell> {
        let coords = self.config.validate_coords(coords)?;
        Ok(self.board[coords.to_nd_index()])
    }

    /// The mine that ended the game, if it ended in a loss.
    pub fn triggered_mine(&self) -> Option<Coord2> {
        self.triggered_mine
    }

    /// Cells touched by the most recent `reveal`/`toggle_flag`, so a caller
    /// can update a display incrementally instead of diffing snapshots.
    pub fn changed_cells(&self) -> &[Coord2] {
        self.changed.as_slice()
    }

    /// Seconds since mine placement, frozen once the game ends. 0 before the
    /// first reveal.
    pub fn elapsed_secs(&self) -> u64 {
        match self.started_at {
            Some(started_at) => self
                .ended_at
                .unwrap_or_else(Instant::now)
                .duration_since(started_at)
                .as_secs(),
            None => 0,
        }
    }

    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let coords = self.config.validate_coords(coords)?;
        self.changed.clear();

        if self.state.is_terminal()
            || !matches!(self.board[coords.to_nd_index()], BoardCell::Hidden)
        {
            return Ok(RevealOutcome::NoChange);
        }

        if self.layout.is_none() {
            let layout = RandomMineGenerator::new(self.seed, coords).generate(self.config);
            self.layout = Some(layout);
        }
        if self.state.is_initial() {
            self.state = GameState::InProgress;
            self.started_at = Some(Instant::now());
        }

        Ok(self.reveal_hidden_cell(coords))
    }

    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<FlagOutcome> {
        use BoardCell::*;
        use FlagOutcome::*;

        let coords = self.config.validate_coords(coords)?;
        self.changed.clear();

        if self.state.is_terminal() {
            return Ok(NoChange);
        }

        Ok(match self.board[coords.to_nd_index()] {
            Hidden => {
                self.board[coords.to_nd_index()] = Flagged;
                self.flagged_count += 1;
                self.changed.push(coords);
                Changed
            }
            Flagged => {
                self.board[coords.to_nd_index()] = Hidden;
                self.flagged_count -= 1;
                self.changed.push(coords);
                Changed
            }
            Revealed(_) | Mine | Exploded => NoChange,
        })
    }

    pub(crate) fn has_mine_at(&self, coords: Coord2) -> bool {
        self.layout
            .as_ref()
            .is_some_and(|layout| layout.contains_mine(coords))
    }

    pub(crate) fn adjacent_mines_at(&self, coords: Coord2) -> u8 {
        self.layout
            .as_ref()
            .map_or(0, |layout| layout.adjacent_mine_count(coords))
    }

    fn reveal_hidden_cell(&mut self, coords: Coord2) -> RevealOutcome {
        if self.has_mine_at(coords) {
            self.board[coords.to_nd_index()] = BoardCell::Exploded;
            self.changed.push(coords);
            self.triggered_mine = Some(coords);
            self.disclose_mines();
            self.end_game(false);
            return RevealOutcome::HitMine;
        }

        self.open_safe_cell(coords);
        if self.adjacent_mines_at(coords) == 0 {
            self.flood_from(coords);
        }

        if self.revealed_count == Saturating(self.config.safe_cells()) {
            self.end_game(true);
            RevealOutcome::Won
        } else {
            RevealOutcome::Revealed
        }
    }

    fn open_safe_cell(&mut self, coords: Coord2) {
        let count = self.adjacent_mines_at(coords);
        self.board[coords.to_nd_index()] = BoardCell::Revealed(count);
        self.revealed_count += 1;
        self.changed.push(coords);
    }

    /// Worklist reveal of the connected zero region around `origin`, plus its
    /// numbered border. Bounded by board size; flags, mines, and
    /// already-revealed cells stop the cascade.
    fn flood_from(&mut self, origin: Coord2) {
        let mut visited = BTreeSet::from([origin]);
        let mut to_visit: VecDeque<Coord2> = self
            .board
            .iter_neighbors(origin)
            .filter(|&pos| matches!(self.board[pos.to_nd_index()], BoardCell::Hidden))
            .filter(|&pos| !self.has_mine_at(pos))
            .collect();

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            if !matches!(self.board[visit_coords.to_nd_index()], BoardCell::Hidden)
                || self.has_mine_at(visit_coords)
            {
                continue;
            }

            self.open_safe_cell(visit_coords);

            if self.adjacent_mines_at(visit_coords) == 0 {
                to_visit.extend(
                    self.board
                        .iter_neighbors(visit_coords)
                        .filter(|&pos| {
                            matches!(self.board[pos.to_nd_index()], BoardCell::Hidden)
                        })
                        .filter(|&pos| !self.has_mine_at(pos))
                        .filter(|pos| !visited.contains(pos)),
                );
            }
        }
    }

    /// On loss, show every mine the player had not flagged. Flagged mines
    /// keep their flag and flagged non-mines are left alone.
    fn disclose_mines(&mut self) {
        let mines: Vec<Coord2> = match &self.layout {
            Some(layout) => layout.iter_mines().collect(),
            None => return,
        };

        for coords in mines {
            if matches!(self.board[coords.to_nd_index()], BoardCell::Hidden) {
                self.board[coords.to_nd_index()] = BoardCell::Mine;
                self.changed.push(coords);
            }
        }
    }

    fn end_game(&mut self, won: bool) {
        if self.state.is_terminal() {
            return;
        }

        self.state = if won { GameState::Won } else { GameState::Lost };
        self.ended_at = Some(Instant::now());
        if won {
            self.triggered_mine = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_mines(size: Coord2, mines: &[Coord2]) -> GameEngine {
        GameEngine::from_layout(MineLayout::from_mine_coords(size, mines).unwrap()).unwrap()
    }

    #[test]
    fn new_game_starts_blank_and_unmined() {
        let engine = GameEngine::with_seed(BoardConfig::BEGINNER, 1).unwrap();

        assert_eq!(engine.state(), GameState::NotStarted);
        assert_eq!(engine.revealed_count(), 0);
        assert_eq!(engine.flagged_count(), 0);
        assert!(engine.layout.is_none());
        assert!(engine.board.iter().all(|&cell| cell == BoardCell::Hidden));
    }

    #[test]
    fn new_game_rejects_invalid_configs() {
        assert_eq!(
            GameEngine::new(BoardConfig::new_unchecked(0, 5, 1)).unwrap_err(),
            GameError::InvalidConfig
        );
        assert_eq!(
            GameEngine::new(BoardConfig::new_unchecked(5, 5, 25)).unwrap_err(),
            GameError::InvalidConfig
        );
    }

    #[test]
    fn reveal_rejects_out_of_bounds_coords() {
        let mut engine = GameEngine::with_seed(BoardConfig::BEGINNER, 1).unwrap();

        assert_eq!(engine.reveal((9, 0)).unwrap_err(), GameError::OutOfBounds);
        assert_eq!(
            engine.toggle_flag((0, 9)).unwrap_err(),
            GameError::OutOfBounds
        );
        assert_eq!(engine.state(), GameState::NotStarted);
    }

    #[test]
    fn first_reveal_places_exact_mine_count_and_starts_the_game() {
        let mut engine = GameEngine::with_seed(BoardConfig::BEGINNER, 7).unwrap();

        let outcome = engine.reveal((4, 4)).unwrap();

        assert!(outcome.has_update());
        assert_ne!(engine.state(), GameState::NotStarted);
        assert_ne!(engine.state(), GameState::Lost);
        assert!(engine.cell_at((4, 4)).unwrap().is_revealed());
        assert!(!engine.has_mine_at((4, 4)));

        let layout = engine.layout.as_ref().unwrap();
        assert_eq!(layout.mine_count(), 10);
        assert_eq!(layout.iter_mines().count(), 10);
    }

    #[test]
    fn first_reveal_is_never_a_mine_across_seeds() {
        for seed in 0..30 {
            let mut engine = GameEngine::with_seed(BoardConfig::BEGINNER, seed).unwrap();
            engine.reveal((0, 0)).unwrap();
            assert!(!engine.has_mine_at((0, 0)), "seed {seed} mined the first click");
            assert_ne!(engine.state(), GameState::Lost);
        }
    }

    #[test]
    fn saturated_board_is_won_on_the_first_reveal() {
        // 24 mines on 5x5 leaves exactly one safe cell: the clicked one.
        let config = BoardConfig::new(5, 5, 24).unwrap();
        let mut engine = GameEngine::with_seed(config, 3).unwrap();

        assert_eq!(engine.reveal((2, 2)).unwrap(), RevealOutcome::Won);
        assert_eq!(engine.state(), GameState::Won);
        assert_eq!(engine.revealed_count(), 1);
    }

    #[test]
    fn revealed_cell_shows_its_adjacent_mine_count() {
        let mut engine = engine_with_mines((3, 3), &[(0, 0), (2, 2)]);

        assert_eq!(engine.reveal((1, 1)).unwrap(), RevealOutcome::Revealed);
        assert_eq!(engine.cell_at((1, 1)).unwrap(), BoardCell::Revealed(2));
    }

    #[test]
    fn zero_reveal_floods_the_connected_region() {
        let mut engine = engine_with_mines((3, 3), &[(2, 2)]);

        let outcome = engine.reveal((0, 0)).unwrap();

        assert_eq!(outcome, RevealOutcome::Won);
        assert_eq!(engine.cell_at((0, 0)).unwrap(), BoardCell::Revealed(0));
        assert_eq!(engine.cell_at((1, 1)).unwrap(), BoardCell::Revealed(1));
        assert_eq!(engine.cell_at((2, 2)).unwrap(), BoardCell::Hidden);
    }

    #[test]
    fn cascade_stops_at_flagged_cells() {
        // Row board: . . F . * where the flag at (0,2) blocks the flood.
        let mut engine = engine_with_mines((1, 5), &[(0, 4)]);
        engine.toggle_flag((0, 2)).unwrap();

        assert_eq!(engine.reveal((0, 0)).unwrap(), RevealOutcome::Revealed);
        assert_eq!(engine.cell_at((0, 0)).unwrap(), BoardCell::Revealed(0));
        assert_eq!(engine.cell_at((0, 1)).unwrap(), BoardCell::Revealed(0));
        assert_eq!(engine.cell_at((0, 2)).unwrap(), BoardCell::Flagged);
        assert_eq!(engine.cell_at((0, 3)).unwrap(), BoardCell::Hidden);
        assert_eq!(engine.revealed_count(), 2);

        // Unflagging reopens the path and the rest of the row wins the game.
        engine.toggle_flag((0, 2)).unwrap();
        assert_eq!(engine.reveal((0, 2)).unwrap(), RevealOutcome::Won);
        assert_eq!(engine.cell_at((0, 3)).unwrap(), BoardCell::Revealed(1));
    }

    #[test]
    fn win_happens_exactly_when_all_safe_cells_are_revealed() {
        let mut engine = engine_with_mines((2, 2), &[(0, 0)]);

        assert_eq!(engine.reveal((0, 1)).unwrap(), RevealOutcome::Revealed);
        assert_eq!(engine.state(), GameState::InProgress);
        assert_eq!(engine.reveal((1, 0)).unwrap(), RevealOutcome::Revealed);
        assert_eq!(engine.state(), GameState::InProgress);
        assert_eq!(engine.reveal((1, 1)).unwrap(), RevealOutcome::Won);
        assert_eq!(engine.state(), GameState::Won);
        assert_eq!(engine.revealed_count(), 3);
    }

    #[test]
    fn winning_clears_the_triggered_mine() {
        let mut engine = engine_with_mines((2, 1), &[(0, 0)]);

        assert_eq!(engine.reveal((1, 0)).unwrap(), RevealOutcome::Won);
        assert_eq!(engine.triggered_mine(), None);
    }

    #[test]
    fn losing_discloses_unflagged_mines_only() {
        let mut engine = engine_with_mines((3, 3), &[(0, 0), (0, 2), (2, 2)]);
        engine.toggle_flag((0, 0)).unwrap();
        engine.reveal((1, 0)).unwrap();

        assert_eq!(engine.reveal((2, 2)).unwrap(), RevealOutcome::HitMine);
        assert_eq!(engine.state(), GameState::Lost);
        assert_eq!(engine.triggered_mine(), Some((2, 2)));

        assert_eq!(engine.cell_at((2, 2)).unwrap(), BoardCell::Exploded);
        assert_eq!(engine.cell_at((0, 2)).unwrap(), BoardCell::Mine);
        assert_eq!(engine.cell_at((0, 0)).unwrap(), BoardCell::Flagged);
        // Safe cells that were never revealed stay hidden.
        assert_eq!(engine.cell_at((2, 0)).unwrap(), BoardCell::Hidden);
        assert_eq!(engine.cell_at((1, 0)).unwrap(), BoardCell::Revealed(1));
    }

    #[test]
    fn flag_toggle_flips_state_and_counter() {
        let mut engine = GameEngine::with_seed(BoardConfig::BEGINNER, 1).unwrap();

        assert_eq!(engine.toggle_flag((3, 3)).unwrap(), FlagOutcome::Changed);
        assert_eq!(engine.flagged_count(), 1);
        assert_eq!(engine.mines_left(), 9);
        assert_eq!(engine.changed_cells(), &[(3, 3)]);

        assert_eq!(engine.toggle_flag((3, 3)).unwrap(), FlagOutcome::Changed);
        assert_eq!(engine.flagged_count(), 0);
        assert_eq!(engine.cell_at((3, 3)).unwrap(), BoardCell::Hidden);
    }

    #[test]
    fn flags_may_exceed_the_mine_count() {
        let mut engine = engine_with_mines((2, 2), &[(0, 0)]);

        for coords in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert!(engine.toggle_flag(coords).unwrap().has_update());
        }
        assert_eq!(engine.flagged_count(), 4);
        assert_eq!(engine.mines_left(), -3);
    }

    #[test]
    fn flagged_cells_cannot_be_revealed_and_revealed_cells_cannot_be_flagged() {
        let mut engine = engine_with_mines((3, 3), &[(0, 0)]);

        engine.toggle_flag((0, 0)).unwrap();
        assert_eq!(engine.reveal((0, 0)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(engine.cell_at((0, 0)).unwrap(), BoardCell::Flagged);

        engine.reveal((1, 1)).unwrap();
        assert_eq!(engine.toggle_flag((1, 1)).unwrap(), FlagOutcome::NoChange);
        assert_eq!(engine.cell_at((1, 1)).unwrap(), BoardCell::Revealed(1));
    }

    #[test]
    fn repeat_reveal_of_the_same_cell_is_a_no_op() {
        let mut engine = engine_with_mines((3, 3), &[(0, 0), (2, 2)]);

        assert_eq!(engine.reveal((1, 1)).unwrap(), RevealOutcome::Revealed);
        assert_eq!(engine.reveal((1, 1)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(engine.revealed_count(), 1);
        assert!(engine.changed_cells().is_empty());
    }

    #[test]
    fn terminal_games_ignore_further_moves() {
        let mut engine = engine_with_mines((2, 2), &[(0, 0)]);
        engine.reveal((1, 1)).unwrap();
        engine.reveal((0, 0)).unwrap();
        assert_eq!(engine.state(), GameState::Lost);

        let board_before = engine.board.clone();
        let revealed_before = engine.revealed_count();
        let flagged_before = engine.flagged_count();

        assert_eq!(engine.reveal((0, 1)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(engine.toggle_flag((0, 1)).unwrap(), FlagOutcome::NoChange);
        assert_eq!(engine.board, board_before);
        assert_eq!(engine.revealed_count(), revealed_before);
        assert_eq!(engine.flagged_count(), flagged_before);
    }

    #[test]
    fn changed_cells_cover_the_whole_cascade() {
        let mut engine = engine_with_mines((1, 5), &[(0, 4)]);
        engine.toggle_flag((0, 2)).unwrap();
        engine.reveal((0, 0)).unwrap();

        let changed = engine.changed_cells();
        assert_eq!(changed.len(), 2);
        assert!(changed.contains(&(0, 0)));
        assert!(changed.contains(&(0, 1)));
    }

    #[test]
    fn start_new_game_replaces_all_state() {
        let mut engine = engine_with_mines((2, 2), &[(0, 0)]);
        engine.toggle_flag((0, 0)).unwrap();
        engine.reveal((1, 1)).unwrap();

        engine.start_new_game(BoardConfig::BEGINNER).unwrap();

        assert_eq!(engine.state(), GameState::NotStarted);
        assert_eq!(engine.size(), (9, 9));
        assert_eq!(engine.revealed_count(), 0);
        assert_eq!(engine.flagged_count(), 0);
        assert!(engine.layout.is_none());
        assert!(engine.board.iter().all(|&cell| cell == BoardCell::Hidden));
    }

    #[test]
    fn from_layout_rejects_boards_without_a_safe_cell() {
        let layout = MineLayout::from_mine_coords((2, 2), &[(0, 0), (0, 1), (1, 0), (1, 1)])
            .unwrap();
        assert_eq!(
            GameEngine::from_layout(layout).unwrap_err(),
            GameError::InvalidConfig
        );
    }

    #[test]
    fn elapsed_time_starts_at_placement_and_freezes_at_game_end() {
        let mut engine = engine_with_mines((2, 1), &[(0, 0)]);
        assert_eq!(engine.elapsed_secs(), 0);

        engine.reveal((1, 0)).unwrap();
        let frozen = engine.elapsed_secs();
        assert_eq!(engine.elapsed_secs(), frozen);
    }
}

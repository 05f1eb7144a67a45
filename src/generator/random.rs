use super::*;
use ndarray::Array2;

/// Uniform random placement that never puts a mine on the excluded cell.
///
/// Placement draws cells uniformly and rejects occupied or excluded ones.
/// Expected draws stay near the mine count on sparse boards and grow as
/// density approaches saturation; config validation guarantees at least one
/// free cell besides the excluded one, so the loop always terminates.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomMineGenerator {
    seed: u64,
    excluded: Coord2,
}

impl RandomMineGenerator {
    pub fn new(seed: u64, excluded: Coord2) -> Self {
        Self { seed, excluded }
    }
}

impl MineGenerator for RandomMineGenerator {
    fn generate(self, config: BoardConfig) -> MineLayout {
        use rand::prelude::*;

        if u32::from(config.mines) * 10 >= u32::from(config.total_cells()) * 9 {
            log::warn!(
                "mine density {}/{} near saturation, placement may need many draws",
                config.mines,
                config.total_cells()
            );
        }

        let mut mine_mask: Array2<bool> = Array2::default(config.size().to_nd_index());
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut placed: CellCount = 0;

        while placed < config.mines {
            let coords = (
                rng.random_range(0..config.rows),
                rng.random_range(0..config.cols),
            );
            if coords == self.excluded || mine_mask[coords.to_nd_index()] {
                continue;
            }
            mine_mask[coords.to_nd_index()] = true;
            placed += 1;
        }

        MineLayout::from_mine_mask(mine_mask)
    }
}

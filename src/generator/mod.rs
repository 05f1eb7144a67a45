use crate::*;
pub use random::*;

mod random;

/// Produces the mine layout for one game. Called by the engine on the first
/// reveal, once the cell to protect is known.
pub trait MineGenerator {
    fn generate(self, config: BoardConfig) -> MineLayout;
}

use serde::{Deserialize, Serialize};

/// Player-visible state of a single board cell.
///
/// `Mine` and `Exploded` only appear after a loss: the triggered cell becomes
/// `Exploded` and every other unflagged mine becomes `Mine`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoardCell {
    Hidden,
    Flagged,
    Revealed(u8),
    Mine,
    Exploded,
}

impl BoardCell {
    pub const fn is_revealed(self) -> bool {
        matches!(self, Self::Revealed(_) | Self::Mine | Self::Exploded)
    }

    pub const fn is_flagged(self) -> bool {
        matches!(self, Self::Flagged)
    }
}

impl Default for BoardCell {
    fn default() -> Self {
        Self::Hidden
    }
}

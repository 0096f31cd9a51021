//! Mid-frequency coefficient positions used to carry bits.

/// `(row, col)` coordinate inside a DCT block.
pub type Position = (usize, usize);

/// Candidates for the basic codec, in preference order.
pub const BASIC_POSITIONS: [Position; 5] = [(1, 2), (2, 1), (2, 2), (1, 3), (3, 1)];

/// Full ordered list for the enhanced codec. Each tier uses a prefix.
pub const TIERED_POSITIONS: [Position; 7] =
    [(1, 2), (2, 1), (2, 2), (1, 3), (3, 1), (3, 2), (2, 3)];

/// Strength bucket selecting how many positions the enhanced codec spreads
/// bits across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthTier {
    Low,
    Medium,
    High,
}

impl StrengthTier {
    pub fn for_strength(strength: f32) -> Self {
        if strength < 0.1 {
            StrengthTier::Low
        } else if strength < 0.2 {
            StrengthTier::Medium
        } else {
            StrengthTier::High
        }
    }

    pub fn position_count(&self) -> usize {
        match self {
            StrengthTier::Low => 3,
            StrengthTier::Medium => 5,
            StrengthTier::High => 7,
        }
    }

    pub fn positions(&self) -> &'static [Position] {
        &TIERED_POSITIONS[..self.position_count()]
    }
}

/// Whether `pos` lies inside a block of the given size.
pub fn fits(pos: Position, block_size: usize) -> bool {
    pos.0 < block_size && pos.1 < block_size
}

/// First candidate that fits inside the block.
pub fn first_fitting(candidates: &[Position], block_size: usize) -> Option<Position> {
    candidates.iter().copied().find(|p| fits(*p, block_size))
}

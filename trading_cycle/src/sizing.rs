//! Share counts for new positions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizer {
    pub max_positions: usize,
    /// Capital committed to one new position.
    pub allocation_per_trade: f64,
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self {
            max_positions: 10,
            allocation_per_trade: 1_000.0,
        }
    }
}

impl PositionSizer {
    /// Whole shares affordable at `price` with the per-trade allocation,
    /// never more than `available_capital` allows. Zero for a non-positive
    /// price.
    pub fn calculate_position_size(&self, price: f64, available_capital: f64) -> u64 {
        if !(price > 0.0) {
            return 0;
        }
        let shares = (self.allocation_per_trade.min(available_capital) / price).floor();
        if shares.is_finite() && shares > 0.0 {
            shares as u64
        } else {
            0
        }
    }

    /// Positions that may still be opened when `held` are open.
    pub fn open_slots(&self, held: usize) -> usize {
        self.max_positions.saturating_sub(held)
    }
}

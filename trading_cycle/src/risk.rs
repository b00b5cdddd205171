//! Portfolio-level risk limits.

use market_gateway::models::{
    account::{AccountSummary, Position},
    contract::InstrumentId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capital assumed when the account summary does not report any.
pub const DEFAULT_TOTAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Largest tolerated drawdown from the peak, as a fraction.
    pub max_drawdown: f64,
    /// Largest value of a single position as a fraction of total capital.
    pub max_position_size: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_drawdown: 0.2,
            max_position_size: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskBreach {
    #[error("drawdown {current:.4} exceeds limit {limit:.4}")]
    Drawdown { current: f64, limit: f64 },

    #[error("position {instrument} is {share:.4} of capital, limit {limit:.4}")]
    PositionSize {
        instrument: InstrumentId,
        share: f64,
        limit: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeldPosition {
    pub instrument: InstrumentId,
    pub quantity: f64,
    /// Absolute market value.
    pub value: f64,
}

/// What the risk check looks at.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioSnapshot {
    pub drawdown: f64,
    pub total_capital: Option<f64>,
    pub positions: Vec<HeldPosition>,
}

impl PortfolioSnapshot {
    /// Builds a snapshot from the gateway's account data. Positions are
    /// valued by their reported exposure, or at average cost when the gateway
    /// has no market value or price; flat positions are left out.
    pub fn from_account(summary: &AccountSummary, positions: &[Position], drawdown: f64) -> Self {
        let positions = positions
            .iter()
            .filter(|p| p.position != 0.0)
            .filter_map(|p| {
                let value = p
                    .exposure()
                    .or_else(|| p.avg_cost.map(|cost| (cost * p.position).abs()))?;
                Some(HeldPosition {
                    instrument: p.conid.clone(),
                    quantity: p.position,
                    value,
                })
            })
            .collect();

        Self {
            drawdown,
            total_capital: summary.net_liquidation(),
            positions,
        }
    }

    pub fn capital(&self) -> f64 {
        self.total_capital
            .filter(|c| *c > 0.0)
            .unwrap_or(DEFAULT_TOTAL_CAPITAL)
    }
}

impl RiskLimits {
    pub fn check(&self, snapshot: &PortfolioSnapshot) -> Result<(), RiskBreach> {
        if snapshot.drawdown > self.max_drawdown {
            return Err(RiskBreach::Drawdown {
                current: snapshot.drawdown,
                limit: self.max_drawdown,
            });
        }

        let capital = snapshot.capital();
        for position in &snapshot.positions {
            let share = position.value / capital;
            if share > self.max_position_size {
                return Err(RiskBreach::PositionSize {
                    instrument: position.instrument.clone(),
                    share,
                    limit: self.max_position_size,
                });
            }
        }
        Ok(())
    }

    /// True when no limit is breached.
    pub fn check_risk_limits(&self, snapshot: &PortfolioSnapshot) -> bool {
        self.check(snapshot).is_ok()
    }
}

/// Running peak of net liquidation value, kept for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct DrawdownTracker {
    peak: Option<f64>,
}

impl DrawdownTracker {
    /// Records the current value and returns the drawdown from the peak.
    pub fn observe(&mut self, value: Option<f64>) -> f64 {
        let Some(value) = value.filter(|v| v.is_finite() && *v > 0.0) else {
            return 0.0;
        };
        let peak = self.peak.map_or(value, |p| p.max(value));
        self.peak = Some(peak);
        (peak - value) / peak
    }
}

//! Channel-breakout pullback screener over daily OHLCV bars.
//!
//! [`Screener::evaluate`] turns one [`BarSeries`](market_gateway::models::bar_series::BarSeries)
//! into buy and sell signals; [`universe::screen_universe`] runs it over many
//! tickers in parallel with per-ticker failure isolation.

pub mod errors;
pub mod indicators;
pub mod params;
pub mod screener;
pub mod universe;

pub use errors::ScreenError;
pub use params::ScreenerParams;
pub use screener::{IndicatorRow, ScreenResult, Screener, Signal, SignalKind};
pub use universe::{screen_outcomes, screen_universe};

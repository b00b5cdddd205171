//! Screening many tickers at once.

use indexmap::IndexMap;
use market_gateway::models::bar_series::BarSeries;
use rayon::prelude::*;
use tracing::error;

use crate::{errors::ScreenError, screener::{ScreenResult, Screener}};

/// Evaluates every ticker in parallel and keeps each ticker's own outcome.
///
/// The output follows the input order.
pub fn screen_outcomes(
    screener: &Screener,
    universe: &IndexMap<String, BarSeries>,
) -> IndexMap<String, Result<ScreenResult, ScreenError>> {
    let entries: Vec<(&String, &BarSeries)> = universe.iter().collect();
    entries
        .into_par_iter()
        .map(|(ticker, series)| (ticker.clone(), screener.evaluate(ticker, series)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Like [`screen_outcomes`], but a failing ticker is logged and reported
/// with no signals.
pub fn screen_universe(
    screener: &Screener,
    universe: &IndexMap<String, BarSeries>,
) -> IndexMap<String, ScreenResult> {
    screen_outcomes(screener, universe)
        .into_iter()
        .map(|(ticker, outcome)| {
            let result = outcome.unwrap_or_else(|err| {
                error!(ticker = %ticker, error = %err, "screening failed");
                ScreenResult::default()
            });
            (ticker, result)
        })
        .collect()
}

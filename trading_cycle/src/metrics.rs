use std::time::Duration;

use tracing::info;

/// Counters of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleMetrics {
    pub tickers: usize,
    /// Tickers with a non-empty series.
    pub fetched: usize,
    /// Tickers for which the gateway returned no bars.
    pub skipped_empty: usize,
    /// Per-ticker failures in any stage.
    pub errors: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub orders_planned: usize,
    pub orders_placed: usize,
    /// The cycle stopped scheduling tickers because of shutdown.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl CycleMetrics {
    pub fn signals_generated(&self) -> usize {
        self.buy_signals + self.sell_signals
    }

    pub fn log(&self) {
        info!(
            tickers = self.tickers,
            fetched = self.fetched,
            skipped_empty = self.skipped_empty,
            errors = self.errors,
            signals_generated = self.signals_generated(),
            buy_signals = self.buy_signals,
            sell_signals = self.sell_signals,
            orders_planned = self.orders_planned,
            orders_placed = self.orders_placed,
            interrupted = self.interrupted,
            cycle_duration_ms = self.elapsed.as_millis() as u64,
            "cycle complete"
        );
    }
}

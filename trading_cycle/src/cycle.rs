//! One pass over the ticker universe.
//!
//! Resolve and fetch run per ticker on a bounded `JoinSet`; a failing ticker
//! becomes a [`TickerOutcome::Failed`] and the rest carry on. The fetched
//! series are screened on the blocking pool. When an account is configured
//! and the newest bar of some ticker is a buy, the cycle checks the account
//! against the risk limits and sizes orders for it. Orders are only planned
//! and logged, never submitted.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use indexmap::IndexMap;
use market_gateway::{
    errors::GatewayError,
    models::{
        bar_series::BarSeries,
        contract::InstrumentId,
        order::{OrderSide, OrderTicket},
        request_params::HistoryRequest,
    },
    providers::MarketGateway,
    resolver::SymbolResolver,
};
use signal_screener::{ScreenError, ScreenResult, Screener, screen_outcomes};
use tokio::{
    sync::{Semaphore, watch},
    task::JoinSet,
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    errors::{CycleError, ProcessingError, Stage, StageError},
    metrics::CycleMetrics,
    risk::{DrawdownTracker, PortfolioSnapshot, RiskLimits},
    runner::Cycle,
    sizing::PositionSizer,
};

/// Result of resolving and fetching one ticker.
#[derive(Debug)]
pub enum TickerOutcome {
    Ready(BarSeries),
    Failed(ProcessingError),
}

/// An order the cycle would place.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOrder {
    pub ticker: String,
    pub ticket: OrderTicket,
    pub stop_loss: Option<f64>,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub screened: IndexMap<String, ScreenResult>,
    pub failures: Vec<ProcessingError>,
    pub planned: Vec<PlannedOrder>,
    pub metrics: CycleMetrics,
}

pub struct TradingCycle {
    gateway: Arc<dyn MarketGateway>,
    resolver: Arc<SymbolResolver>,
    screener: Arc<Screener>,
    tickers: Vec<String>,
    history: HistoryRequest,
    max_concurrency: usize,
    account_id: Option<String>,
    risk: RiskLimits,
    sizer: PositionSizer,
    drawdown: DrawdownTracker,
}

impl TradingCycle {
    pub fn new(
        config: &AppConfig,
        gateway: Arc<dyn MarketGateway>,
        resolver: Arc<SymbolResolver>,
    ) -> Result<Self, ScreenError> {
        Ok(Self {
            gateway,
            resolver,
            screener: Arc::new(Screener::new(config.screener.clone())?),
            tickers: config.cycle.tickers.clone(),
            history: config.cycle.history_request(),
            max_concurrency: config.cycle.max_concurrency.max(1),
            account_id: config.account_id.clone(),
            risk: config.risk.clone(),
            sizer: config.sizing.clone(),
            drawdown: DrawdownTracker::default(),
        })
    }

    /// Runs one cycle. Per-ticker failures are part of the report; only
    /// failures outside the ticker boundary are returned as errors.
    pub async fn run_once(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let mut metrics = CycleMetrics::default();

        let (outcomes, interrupted) = self.fetch_all(shutdown).await;
        metrics.tickers = outcomes.len();
        metrics.interrupted = interrupted;

        let mut failures = Vec::new();
        let mut universe = IndexMap::new();
        for (ticker, outcome) in outcomes {
            match outcome {
                TickerOutcome::Ready(series) if series.is_empty() => {
                    info!(ticker = %ticker, "no bars returned, skipping");
                    metrics.skipped_empty += 1;
                }
                TickerOutcome::Ready(series) => {
                    universe.insert(ticker, series);
                }
                TickerOutcome::Failed(err) => failures.push(err),
            }
        }
        metrics.fetched = universe.len();

        let screener = Arc::clone(&self.screener);
        let (universe, outcomes) = tokio::task::spawn_blocking(move || {
            let outcomes = screen_outcomes(&screener, &universe);
            (universe, outcomes)
        })
        .await?;

        let mut screened = IndexMap::new();
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    metrics.buy_signals += result.buys.len();
                    metrics.sell_signals += result.sells.len();
                    screened.insert(ticker, result);
                }
                Err(err) => {
                    failures.push(ProcessingError::new(ticker.clone(), Stage::Screen, err));
                    screened.insert(ticker, ScreenResult::default());
                }
            }
        }

        for failure in &failures {
            error!(
                ticker = %failure.ticker,
                stage = %failure.stage,
                error = %failure.source,
                "ticker failed"
            );
        }
        metrics.errors = failures.len();

        let mut planned = Vec::new();
        let wants_orders = screened.values().any(|r| r.current_buy().is_some());
        if let Some(account) = self.account_id.clone().filter(|_| wants_orders && !interrupted) {
            planned = self
                .plan_orders(&account, &screened, &universe)
                .await
                .map_err(CycleError::Planning)?;
        }
        metrics.orders_planned = planned.len();
        metrics.elapsed = started.elapsed();

        Ok(CycleReport {
            screened,
            failures,
            planned,
            metrics,
        })
    }

    async fn fetch_all(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> (IndexMap<String, TickerOutcome>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut pending = BTreeMap::new();
        let mut interrupted = false;

        for (index, ticker) in self.tickers.iter().enumerate() {
            let permit = Arc::clone(&semaphore).acquire_owned().await;
            if *shutdown.borrow() {
                info!(
                    remaining = self.tickers.len() - index,
                    "shutdown requested, not scheduling remaining tickers"
                );
                interrupted = true;
                break;
            }
            let Ok(permit) = permit else {
                break;
            };

            let resolver = Arc::clone(&self.resolver);
            let gateway = Arc::clone(&self.gateway);
            let history = self.history;
            let name = ticker.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = fetch_one(&resolver, gateway.as_ref(), &name, &history).await;
                (index, outcome)
            });
            pending.insert(index, ticker.clone());
        }

        let mut done = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Some(ticker) = pending.remove(&index) {
                        done.insert(index, (ticker, outcome));
                    }
                }
                Err(err) => warn!(error = %err, "ticker task did not complete"),
            }
        }
        // tasks that panicked never reported back
        for (index, ticker) in pending {
            let failure = ProcessingError::new(
                ticker.clone(),
                Stage::Fetch,
                StageError::Task("task panicked or was cancelled".to_string()),
            );
            done.insert(index, (ticker, TickerOutcome::Failed(failure)));
        }

        let outcomes = done.into_values().collect();
        (outcomes, interrupted)
    }

    async fn plan_orders(
        &mut self,
        account: &str,
        screened: &IndexMap<String, ScreenResult>,
        universe: &IndexMap<String, BarSeries>,
    ) -> Result<Vec<PlannedOrder>, GatewayError> {
        let summary = self.gateway.account_summary(account).await?;
        let positions = self.gateway.positions(account).await?;

        let drawdown = self.drawdown.observe(summary.net_liquidation());
        let snapshot = PortfolioSnapshot::from_account(&summary, &positions, drawdown);
        if let Err(breach) = self.risk.check(&snapshot) {
            warn!(%breach, "risk limits breached, no orders planned");
            return Ok(Vec::new());
        }

        let held: HashSet<&InstrumentId> = snapshot.positions.iter().map(|p| &p.instrument).collect();
        let mut slots = self.sizer.open_slots(held.len());
        let mut capital = summary.available_funds().unwrap_or(snapshot.capital());
        let mut planned = Vec::new();

        for (ticker, result) in screened {
            if slots == 0 {
                debug!("no open position slots left");
                break;
            }
            let (Some(buy), Some(series)) = (result.current_buy(), universe.get(ticker)) else {
                continue;
            };
            if held.contains(&series.instrument) {
                debug!(ticker = %ticker, "already holding, skipping buy");
                continue;
            }
            let Some(limit) = buy.row.limit_price else {
                continue;
            };
            let quantity = self.sizer.calculate_position_size(limit, capital);
            if quantity == 0 {
                debug!(ticker = %ticker, limit, capital, "buy sized to zero shares");
                continue;
            }

            capital -= quantity as f64 * limit;
            slots -= 1;
            let order = PlannedOrder {
                ticker: ticker.clone(),
                ticket: OrderTicket::limit(
                    series.instrument.clone(),
                    OrderSide::Buy,
                    quantity as f64,
                    limit,
                ),
                stop_loss: buy.row.stop_loss,
            };
            info!(
                ticker = %order.ticker,
                instrument = %order.ticket.conid,
                quantity,
                limit,
                stop_loss = ?order.stop_loss,
                "order planned"
            );
            planned.push(order);
        }
        Ok(planned)
    }
}

async fn fetch_one(
    resolver: &SymbolResolver,
    gateway: &dyn MarketGateway,
    ticker: &str,
    history: &HistoryRequest,
) -> TickerOutcome {
    let instrument = match resolver.resolve(ticker).await {
        Ok(id) => id,
        Err(err) => return TickerOutcome::Failed(ProcessingError::new(ticker, Stage::Resolve, err)),
    };
    match gateway.historical_bars(&instrument, history).await {
        Ok(series) => {
            debug!(ticker, instrument = %instrument, bars = series.len(), "bars fetched");
            TickerOutcome::Ready(series)
        }
        Err(err) => TickerOutcome::Failed(ProcessingError::new(ticker, Stage::Fetch, err)),
    }
}

#[async_trait]
impl Cycle for TradingCycle {
    async fn run_cycle(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleMetrics, CycleError> {
        self.run_once(shutdown).await.map(|report| report.metrics)
    }
}

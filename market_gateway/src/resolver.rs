//! Ticker → instrument id resolution with a time-bounded cache.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use crate::{
    errors::GatewayError,
    models::contract::{ContractCandidate, InstrumentId},
    providers::MarketGateway,
};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No matching instrument found for ticker {ticker}")]
    SymbolNotFound { ticker: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Which search candidates are acceptable. The first acceptable candidate,
/// in the order the gateway returned them, wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractFilter {
    pub sec_type: String,
    pub currency: String,
    pub exchanges: Vec<String>,
}

impl Default for ContractFilter {
    fn default() -> Self {
        Self {
            sec_type: "STK".to_string(),
            currency: "USD".to_string(),
            exchanges: vec!["SMART".into(), "NYSE".into(), "NASDAQ".into()],
        }
    }
}

impl ContractFilter {
    pub fn accepts(&self, candidate: &ContractCandidate) -> bool {
        candidate.sec_type.as_deref() == Some(self.sec_type.as_str())
            && candidate.currency.as_deref() == Some(self.currency.as_str())
            && candidate
                .exchange
                .as_deref()
                .is_some_and(|ex| self.exchanges.iter().any(|allowed| allowed == ex))
    }

    pub fn select<'a>(&self, candidates: &'a [ContractCandidate]) -> Option<&'a ContractCandidate> {
        candidates.iter().find(|c| self.accepts(c))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    instrument: InstrumentId,
    cached_at: Instant,
}

/// Resolves tickers through the gateway's instrument search and caches the
/// result for `ttl`.
///
/// The cache lock is never held across a gateway call, so different tickers
/// resolve concurrently. Two concurrent misses for the same ticker may both
/// search; the last one to finish overwrites the entry.
pub struct SymbolResolver {
    gateway: Arc<dyn MarketGateway>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    filter: ContractFilter,
}

impl SymbolResolver {
    pub fn new(gateway: Arc<dyn MarketGateway>) -> Self {
        Self::with_options(gateway, DEFAULT_TTL, ContractFilter::default())
    }

    pub fn with_options(
        gateway: Arc<dyn MarketGateway>,
        ttl: Duration,
        filter: ContractFilter,
    ) -> Self {
        Self {
            gateway,
            cache: Mutex::new(HashMap::new()),
            ttl,
            filter,
        }
    }

    pub async fn resolve(&self, ticker: &str) -> Result<InstrumentId, ResolveError> {
        if let Some(hit) = self.cached(ticker).await {
            debug!(ticker, instrument = %hit, "resolver cache hit");
            return Ok(hit);
        }

        let candidates = self.gateway.search_contracts(ticker).await?;
        let Some(chosen) = self.filter.select(&candidates) else {
            return Err(ResolveError::SymbolNotFound {
                ticker: ticker.to_string(),
            });
        };
        let instrument = chosen.conid.clone();

        self.cache.lock().await.insert(
            ticker.to_string(),
            CacheEntry {
                instrument: instrument.clone(),
                cached_at: Instant::now(),
            },
        );
        info!(ticker, instrument = %instrument, exchange = ?chosen.exchange, "resolved ticker");
        Ok(instrument)
    }

    /// Drops one cached mapping. Returns whether an entry existed.
    pub async fn invalidate(&self, ticker: &str) -> bool {
        self.cache.lock().await.remove(ticker).is_some()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    async fn cached(&self, ticker: &str) -> Option<InstrumentId> {
        let cache = self.cache.lock().await;
        cache
            .get(ticker)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.instrument.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{
        account::{AccountSummary, Execution, Position},
        bar_series::BarSeries,
        order::{OrderReply, OrderTicket},
        request_params::HistoryRequest,
    };

    struct SearchOnly {
        candidates: Vec<ContractCandidate>,
        calls: AtomicUsize,
    }

    impl SearchOnly {
        fn new(json: &str) -> Arc<Self> {
            Arc::new(Self {
                candidates: serde_json::from_str(json).unwrap(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketGateway for SearchOnly {
        async fn historical_bars(
            &self,
            instrument: &InstrumentId,
            request: &HistoryRequest,
        ) -> Result<BarSeries, GatewayError> {
            Ok(BarSeries::empty(instrument.clone(), request.bar))
        }
        async fn search_contracts(&self, _: &str) -> Result<Vec<ContractCandidate>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidates.clone())
        }
        async fn positions(&self, _: &str) -> Result<Vec<Position>, GatewayError> {
            Ok(vec![])
        }
        async fn account_summary(&self, _: &str) -> Result<AccountSummary, GatewayError> {
            Ok(AccountSummary::default())
        }
        async fn place_order(
            &self,
            _: &str,
            _: &[OrderTicket],
        ) -> Result<Vec<OrderReply>, GatewayError> {
            Ok(vec![])
        }
        async fn executions(
            &self,
            _: &str,
            _: Option<NaiveDate>,
        ) -> Result<Vec<Execution>, GatewayError> {
            Ok(vec![])
        }
    }

    const AAPL: &str = r#"[
        {"conid": 1, "type": "STK", "currency": "EUR", "exchange": "NASDAQ"},
        {"conid": 2, "type": "OPT", "currency": "USD", "exchange": "SMART"},
        {"conid": 3, "type": "STK", "currency": "USD", "exchange": "LSE"},
        {"conid": 265598, "type": "STK", "currency": "USD", "exchange": "NASDAQ"},
        {"conid": 5, "type": "STK", "currency": "USD", "exchange": "NYSE"}
    ]"#;

    #[tokio::test(start_paused = true)]
    async fn cached_within_ttl_then_refreshed() {
        let gateway = SearchOnly::new(AAPL);
        let resolver = SymbolResolver::with_options(
            gateway.clone(),
            Duration::from_secs(60),
            ContractFilter::default(),
        );

        let first = resolver.resolve("AAPL").await.unwrap();
        let second = resolver.resolve("AAPL").await.unwrap();
        assert_eq!(first, InstrumentId::from("265598"));
        assert_eq!(first, second);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        resolver.resolve("AAPL").await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_acceptable_candidate_is_symbol_not_found() {
        let gateway = SearchOnly::new(r#"[{"conid": 9, "type": "STK", "currency": "CAD", "exchange": "TSE"}]"#);
        let resolver = SymbolResolver::new(gateway.clone());
        let err = resolver.resolve("SHOP").await.unwrap_err();
        assert!(matches!(err, ResolveError::SymbolNotFound { ref ticker } if ticker == "SHOP"));

        // failures are not cached
        resolver.resolve("SHOP").await.unwrap_err();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_new_lookup() {
        let gateway = SearchOnly::new(AAPL);
        let resolver = SymbolResolver::new(gateway.clone());
        resolver.resolve("AAPL").await.unwrap();
        assert!(resolver.invalidate("AAPL").await);
        assert!(!resolver.invalidate("AAPL").await);
        resolver.resolve("AAPL").await.unwrap();
        resolver.clear().await;
        resolver.resolve("AAPL").await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn filter_is_configurable() {
        let candidates: Vec<ContractCandidate> = serde_json::from_str(AAPL).unwrap();
        let filter = ContractFilter {
            exchanges: vec!["LSE".into()],
            ..Default::default()
        };
        assert_eq!(filter.select(&candidates).unwrap().conid, InstrumentId::from(3));
    }
}

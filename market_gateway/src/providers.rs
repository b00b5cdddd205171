//! Gateway abstraction for broker market-data and account endpoints.
//!
//! This module defines the [`MarketGateway`] trait, the unified interface the
//! resolver and the trading cycle use to talk to the broker. The production
//! implementation is [`ib_gateway::client::GatewayClient`]; tests plug in
//! in-memory doubles.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`Arc<dyn MarketGateway>`), so one client can be shared by every
//! concurrent per-ticker task.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use chrono::NaiveDate;
//! use market_gateway::errors::GatewayError;
//! use market_gateway::models::{
//!     account::{AccountSummary, Execution, Position},
//!     bar_series::BarSeries,
//!     contract::{ContractCandidate, InstrumentId},
//!     order::{OrderReply, OrderTicket},
//!     request_params::HistoryRequest,
//! };
//! use market_gateway::providers::MarketGateway;
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl MarketGateway for Offline {
//!     async fn historical_bars(
//!         &self,
//!         instrument: &InstrumentId,
//!         request: &HistoryRequest,
//!     ) -> Result<BarSeries, GatewayError> {
//!         Ok(BarSeries::empty(instrument.clone(), request.bar))
//!     }
//!     async fn search_contracts(&self, _: &str) -> Result<Vec<ContractCandidate>, GatewayError> {
//!         Ok(vec![])
//!     }
//!     async fn positions(&self, _: &str) -> Result<Vec<Position>, GatewayError> {
//!         Ok(vec![])
//!     }
//!     async fn account_summary(&self, _: &str) -> Result<AccountSummary, GatewayError> {
//!         Ok(AccountSummary::default())
//!     }
//!     async fn place_order(&self, _: &str, _: &[OrderTicket]) -> Result<Vec<OrderReply>, GatewayError> {
//!         Ok(vec![])
//!     }
//!     async fn executions(&self, _: &str, _: Option<NaiveDate>) -> Result<Vec<Execution>, GatewayError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod ib_gateway;

use async_trait::async_trait;
use chrono::NaiveDate;
use snafu::{Backtrace, Snafu};

use crate::{
    errors::GatewayError,
    models::{
        account::{AccountSummary, Execution, Position},
        bar_series::BarSeries,
        contract::{ContractCandidate, InstrumentId},
        order::{OrderReply, OrderTicket},
        request_params::HistoryRequest,
    },
};

/// Broker gateway operations used by the rest of the system.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Fetches historical bars for one instrument.
    ///
    /// "No data" (an empty or unusable payload) is a normal outcome and comes
    /// back as an empty [`BarSeries`], not an error.
    async fn historical_bars(
        &self,
        instrument: &InstrumentId,
        request: &HistoryRequest,
    ) -> Result<BarSeries, GatewayError>;

    /// Searches instruments matching a ticker symbol, in provider order.
    async fn search_contracts(&self, symbol: &str)
    -> Result<Vec<ContractCandidate>, GatewayError>;

    /// Current positions of an account.
    async fn positions(&self, account_id: &str) -> Result<Vec<Position>, GatewayError>;

    /// Account summary (net liquidation, available funds, ...).
    async fn account_summary(&self, account_id: &str) -> Result<AccountSummary, GatewayError>;

    /// Submits orders for an account.
    async fn place_order(
        &self,
        account_id: &str,
        orders: &[OrderTicket],
    ) -> Result<Vec<OrderReply>, GatewayError>;

    /// Trade executions, optionally only those since `since`.
    async fn executions(
        &self,
        account_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Execution>, GatewayError>;
}

/// Errors that can occur during the creation of a gateway client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientInitError {
    /// the base URL is not an absolute http(s) URL.
    #[snafu(display("Invalid gateway base URL {url:?}: {reason}"))]
    InvalidBaseUrl {
        url: String,
        reason: String,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Session token contains characters not allowed in a header.
    #[snafu(display("Invalid session token format: {source}"))]
    InvalidToken {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

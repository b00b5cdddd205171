use std::fmt;

use market_gateway::{errors::GatewayError, resolver::ResolveError};
use signal_screener::ScreenError;
use thiserror::Error;

/// Where a ticker's processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolve,
    Fetch,
    Screen,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Screen => "screen",
        })
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Screen(#[from] ScreenError),

    /// The ticker's task panicked or was cancelled.
    #[error("task aborted: {0}")]
    Task(String),
}

/// A failure confined to one ticker.
#[derive(Debug, Error)]
#[error("{ticker} failed at {stage}: {source}")]
pub struct ProcessingError {
    pub ticker: String,
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl ProcessingError {
    pub fn new(ticker: impl Into<String>, stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            ticker: ticker.into(),
            stage,
            source: source.into(),
        }
    }
}

/// A failure of the cycle as a whole; triggers the backoff.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("order planning failed: {0}")]
    Planning(#[source] GatewayError),

    #[error("screening task failed: {0}")]
    Screening(#[from] tokio::task::JoinError),
}

use market_gateway::models::bar::BarField;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreenError {
    /// Fewer bars than the channel needs to fill once.
    #[error("Insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// The field has no value in any bar of the series.
    #[error("Missing required field: {field}")]
    MissingField { field: BarField },

    #[error("Invalid screener parameter {field}: {reason}")]
    InvalidParams { field: &'static str, reason: String },
}

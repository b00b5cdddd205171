use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{contract::InstrumentId, request_params::HistoryRequest};

pub use crate::rate_limit::{HISTORY_PATH, SEARCH_PATH};

/// Liveness check; also keeps the gateway session alive.
pub const TICKLE_PATH: &str = "/tickle";

pub fn positions_path(account_id: &str) -> String {
    format!("/portfolio/{account_id}/positions")
}

pub fn summary_path(account_id: &str) -> String {
    format!("/portfolio/{account_id}/summary")
}

pub fn orders_path(account_id: &str) -> String {
    format!("/iserver/account/{account_id}/orders")
}

pub fn executions_path(account_id: &str) -> String {
    format!("/iserver/account/{account_id}/executions")
}

/// Query string for the historical bars endpoint.
pub fn history_query(
    instrument: &InstrumentId,
    request: &HistoryRequest,
) -> Vec<(&'static str, String)> {
    vec![
        ("conid", instrument.to_string()),
        ("period", request.period.to_string()),
        ("bar", request.bar.to_string()),
        ("outsideRth", request.outside_rth.to_string()),
    ]
}

/// Query string for the executions endpoint; dates are sent as `YYYYMMDD`.
pub fn executions_query(since: Option<NaiveDate>) -> Vec<(&'static str, String)> {
    since
        .map(|d| vec![("from", d.format("%Y%m%d").to_string())])
        .unwrap_or_default()
}

/// Body of the instrument search request.
#[derive(Debug, Serialize)]
pub struct SearchBody<'a> {
    pub symbol: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_query_uses_gateway_codes() {
        let q = history_query(&InstrumentId::from("265598"), &HistoryRequest::default());
        assert_eq!(
            q,
            vec![
                ("conid", "265598".to_string()),
                ("period", "2y".to_string()),
                ("bar", "1d".to_string()),
                ("outsideRth", "true".to_string()),
            ]
        );
    }

    #[test]
    fn executions_query_formats_date() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(executions_query(Some(d)), vec![("from", "20240307".to_string())]);
        assert!(executions_query(None).is_empty());
    }
}

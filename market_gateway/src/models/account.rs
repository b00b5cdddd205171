//! Portfolio positions, account summary and executions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::contract::InstrumentId;

/// A portfolio position as reported by `/portfolio/{account}/positions`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub conid: InstrumentId,
    #[serde(default, rename = "contractDesc")]
    pub contract_desc: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    /// Signed share count; negative for short positions.
    pub position: f64,
    #[serde(default, rename = "mktPrice")]
    pub mkt_price: Option<f64>,
    #[serde(default, rename = "mktValue")]
    pub mkt_value: Option<f64>,
    #[serde(default, rename = "avgCost")]
    pub avg_cost: Option<f64>,
    #[serde(default, rename = "unrealizedPnl")]
    pub unrealized_pnl: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Position {
    /// Absolute market value of the position, from `mktValue` when present,
    /// otherwise `position × mktPrice`.
    pub fn exposure(&self) -> Option<f64> {
        self.mkt_value
            .or_else(|| self.mkt_price.map(|p| p * self.position))
            .map(f64::abs)
    }
}

/// Account summary keyed by metric name (`netliquidation`,
/// `availablefunds`, ...).
///
/// The gateway's summary has many loosely-typed entries, so values are kept
/// as raw JSON and read through [`AccountSummary::amount`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AccountSummary(pub IndexMap<String, Value>);

impl AccountSummary {
    /// Numeric amount of a summary entry, case-insensitive on the key.
    ///
    /// Accepts both `{"amount": 1.0, ...}` objects and bare numbers.
    pub fn amount(&self, key: &str) -> Option<f64> {
        let (_, value) = self
            .0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))?;
        match value {
            Value::Number(n) => n.as_f64(),
            Value::Object(map) => map.get("amount").and_then(Value::as_f64),
            _ => None,
        }
    }

    pub fn net_liquidation(&self) -> Option<f64> {
        self.amount("netliquidation")
    }

    pub fn available_funds(&self) -> Option<f64> {
        self.amount("availablefunds")
    }
}

/// A trade execution reported by `/iserver/account/{account}/executions`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Execution {
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub conid: Option<InstrumentId>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub trade_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_amount_reads_objects_and_numbers() {
        let summary: AccountSummary = serde_json::from_str(
            r#"{
                "NetLiquidation": {"amount": 125000.5, "currency": "USD"},
                "availablefunds": 40000,
                "accountcode": {"value": "DU123"}
            }"#,
        )
        .unwrap();
        assert_eq!(summary.net_liquidation(), Some(125000.5));
        assert_eq!(summary.available_funds(), Some(40000.0));
        assert_eq!(summary.amount("accountcode"), None);
        assert_eq!(summary.amount("missing"), None);
    }

    #[test]
    fn position_exposure_falls_back_to_price() {
        let p: Position = serde_json::from_str(
            r#"{"conid": 1, "position": -10, "mktPrice": 12.5}"#,
        )
        .unwrap();
        assert_eq!(p.exposure(), Some(125.0));
    }
}

//! Instrument identifiers and instrument-search results.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Broker-internal instrument identifier (the gateway's `conid`).
///
/// The gateway sends it either as a JSON number or a string; both decode to
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InstrumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for InstrumentId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for InstrumentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => InstrumentId::from(n),
            Raw::Str(s) => InstrumentId::from(s),
        })
    }
}

/// One candidate returned by the instrument search endpoint.
///
/// Only the fields used for candidate selection are modelled; everything
/// else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContractCandidate {
    pub conid: InstrumentId,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Security type, `STK` for common equity.
    #[serde(default, rename = "type", alias = "secType")]
    pub sec_type: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default, rename = "companyName")]
    pub company_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conid_accepts_numbers_and_strings() {
        let list: Vec<ContractCandidate> = serde_json::from_str(
            r#"[
                {"conid": 265598, "type": "STK", "currency": "USD", "exchange": "NASDAQ"},
                {"conid": "8314", "secType": "STK"}
            ]"#,
        )
        .unwrap();
        assert_eq!(list[0].conid.as_str(), "265598");
        assert_eq!(list[0].exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(list[1].conid, InstrumentId::from("8314"));
        assert_eq!(list[1].sec_type.as_deref(), Some("STK"));
        assert_eq!(list[1].currency, None);
    }
}

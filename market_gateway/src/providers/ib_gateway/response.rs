use chrono::DateTime;
use serde::Deserialize;
use tracing::warn;

use crate::models::{
    bar::Bar, bar_series::BarSeries, contract::InstrumentId, timeframe::TimeFrame,
};

/// One bar as sent by the history endpoint. Every field is optional so a
/// partially filled row does not poison the whole payload.
#[derive(Deserialize, Debug)]
pub struct HistoryBar {
    /// Epoch milliseconds.
    #[serde(rename = "t", default)]
    pub timestamp_ms: Option<i64>,
    #[serde(rename = "o", default)]
    pub open: Option<f64>,
    #[serde(rename = "h", default)]
    pub high: Option<f64>,
    #[serde(rename = "l", default)]
    pub low: Option<f64>,
    #[serde(rename = "c", default)]
    pub close: Option<f64>,
    #[serde(rename = "v", default)]
    pub volume: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct HistoryResponse {
    #[serde(default)]
    pub data: Vec<HistoryBar>,
}

/// Turns a history payload into a [`BarSeries`].
///
/// A body that is empty or not a history payload yields an empty series.
/// Rows without a usable timestamp are dropped; missing prices or volume
/// become `NaN`.
pub fn normalize_history(
    instrument: &InstrumentId,
    timeframe: TimeFrame,
    body: &[u8],
) -> BarSeries {
    let response = match serde_json::from_slice::<HistoryResponse>(body) {
        Ok(response) => response,
        Err(err) => {
            warn!(%instrument, error = %err, "unusable history payload; treating as no data");
            return BarSeries::empty(instrument.clone(), timeframe);
        }
    };

    let mut dropped = 0usize;
    let bars: Vec<Bar> = response
        .data
        .into_iter()
        .filter_map(|row| {
            let Some(timestamp) = row.timestamp_ms.and_then(DateTime::from_timestamp_millis)
            else {
                dropped += 1;
                return None;
            };
            Some(Bar::new(
                timestamp,
                row.open.unwrap_or(f64::NAN),
                row.high.unwrap_or(f64::NAN),
                row.low.unwrap_or(f64::NAN),
                row.close.unwrap_or(f64::NAN),
                row.volume.unwrap_or(f64::NAN),
            ))
        })
        .collect();

    if dropped > 0 {
        warn!(%instrument, dropped, "history rows without timestamp dropped");
    }

    BarSeries::new(instrument.clone(), timeframe, bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> InstrumentId {
        InstrumentId::from("265598")
    }

    #[test]
    fn normalizes_rows_in_timestamp_order() {
        let body = br#"{"symbol":"AAPL","data":[
            {"t":1704240000000,"o":2,"h":3,"l":1,"c":2.5,"v":1000},
            {"t":1704153600000,"o":1,"h":2,"l":0.5,"c":1.5,"v":900}
        ]}"#;
        let series = normalize_history(&id(), TimeFrame::day(), body);
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].timestamp.timestamp_millis(), 1704153600000);
        assert_eq!(series.bars[0].close, 1.5);
        assert_eq!(series.bars[1].volume, 1000.0);
    }

    #[test]
    fn missing_values_become_nan_and_rows_without_time_are_dropped() {
        let body = br#"{"data":[{"t":1704153600000,"o":1,"h":2,"l":0.5,"c":1.5},{"o":1}]}"#;
        let series = normalize_history(&id(), TimeFrame::day(), body);
        assert_eq!(series.len(), 1);
        assert!(series.bars[0].volume.is_nan());
    }

    #[test]
    fn malformed_or_empty_payload_is_no_data() {
        for body in [&b""[..], b"{}", b"not json", br#"{"data":"oops"}"#] {
            let series = normalize_history(&id(), TimeFrame::day(), body);
            assert!(series.is_empty(), "payload {:?}", String::from_utf8_lossy(body));
        }
    }
}

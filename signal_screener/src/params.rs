use serde::{Deserialize, Serialize};

use crate::errors::ScreenError;

/// Tunables of the breakout-pullback screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerParams {
    /// Lookback of the rolling close channel, in bars.
    pub channel_period: usize,
    /// A buy needs a breakout within this many bars.
    pub channel_break_window: usize,
    pub atr_period: usize,
    pub atr_multiple: f64,
    /// Minimum average volume over `volume_ma_period` bars.
    pub min_volume: f64,
    /// Percent above the buy zone at which a position is taken off.
    pub profit_threshold: f64,
    pub min_price: f64,
    /// One-bar rate of change, in percent, that a buy must fall below.
    pub roc_trigger_pct: f64,
    pub volume_ma_period: usize,
}

impl Default for ScreenerParams {
    fn default() -> Self {
        Self {
            channel_period: 252,
            channel_break_window: 10,
            atr_period: 5,
            atr_multiple: 1.0,
            min_volume: 100_000.0,
            profit_threshold: 2.0,
            min_price: 5.0,
            roc_trigger_pct: -2.0,
            volume_ma_period: 20,
        }
    }
}

impl ScreenerParams {
    pub fn validate(&self) -> Result<(), ScreenError> {
        let periods = [
            ("channel_period", self.channel_period),
            ("channel_break_window", self.channel_break_window),
            ("atr_period", self.atr_period),
            ("volume_ma_period", self.volume_ma_period),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(ScreenError::InvalidParams {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        let amounts = [
            ("atr_multiple", self.atr_multiple),
            ("min_volume", self.min_volume),
            ("profit_threshold", self.profit_threshold),
            ("min_price", self.min_price),
            ("roc_trigger_pct", self.roc_trigger_pct),
        ];
        for (field, value) in amounts {
            if !value.is_finite() {
                return Err(ScreenError::InvalidParams {
                    field,
                    reason: format!("must be a finite number, got {value}"),
                });
            }
        }

        let floors = [
            ("min_volume", self.min_volume),
            ("profit_threshold", self.profit_threshold),
            ("min_price", self.min_price),
        ];
        for (field, value) in floors {
            if value < 0.0 {
                return Err(ScreenError::InvalidParams {
                    field,
                    reason: format!("must not be negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ScreenerParams::default().validate().is_ok());
    }

    #[test]
    fn zero_period_is_rejected() {
        let params = ScreenerParams {
            atr_period: 0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ScreenError::InvalidParams { field: "atr_period", .. })
        ));
    }

    #[test]
    fn negative_thresholds_are_rejected() {
        let cases: [(&str, fn(&mut ScreenerParams)); 3] = [
            ("min_volume", |p| p.min_volume = -1.0),
            ("profit_threshold", |p| p.profit_threshold = -0.5),
            ("min_price", |p| p.min_price = -5.0),
        ];
        for (expected, mutate) in cases {
            let mut params = ScreenerParams::default();
            mutate(&mut params);
            match params.validate() {
                Err(ScreenError::InvalidParams { field, reason }) => {
                    assert_eq!(field, expected);
                    assert!(reason.contains("negative"), "{reason}");
                }
                other => panic!("{expected}: expected rejection, got {other:?}"),
            }
        }

        let zero_floors = ScreenerParams {
            min_volume: 0.0,
            profit_threshold: 0.0,
            min_price: 0.0,
            ..Default::default()
        };
        assert!(zero_floors.validate().is_ok());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let params: ScreenerParams = serde_json::from_str(r#"{"min_price": 10.0}"#).unwrap();
        assert_eq!(params.min_price, 10.0);
        assert_eq!(params.channel_period, 252);
    }
}

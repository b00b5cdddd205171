//! Bar sizes and lookback periods as understood by the gateway.
//!
//! The gateway encodes both the bar size (`bar=1d`) and the history period
//! (`period=1y`) as `<amount><unit>` strings. [`TimeFrame`] is the typed form
//! of those strings; it parses from and displays as the gateway code.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {}", message)]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeFrameUnit {
    fn code(self) -> &'static str {
        match self {
            TimeFrameUnit::Minute => "min",
            TimeFrameUnit::Hour => "h",
            TimeFrameUnit::Day => "d",
            TimeFrameUnit::Week => "w",
            TimeFrameUnit::Month => "m",
            TimeFrameUnit::Year => "y",
        }
    }

    /// Largest amount the gateway accepts for this unit.
    fn max_amount(self) -> u32 {
        match self {
            TimeFrameUnit::Minute => 30,
            TimeFrameUnit::Hour => 8,
            TimeFrameUnit::Day => 1000,
            TimeFrameUnit::Week => 792,
            TimeFrameUnit::Month => 182,
            TimeFrameUnit::Year => 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Result<Self, TimeFrameError> {
        Self::validate(amount, unit)?;
        Ok(Self { amount, unit })
    }

    /// One-day bars, the granularity the screener works on.
    pub const fn day() -> Self {
        Self {
            amount: 1,
            unit: TimeFrameUnit::Day,
        }
    }

    pub fn years(amount: u32) -> Result<Self, TimeFrameError> {
        Self::new(amount, TimeFrameUnit::Year)
    }

    fn validate(amount: u32, unit: TimeFrameUnit) -> Result<(), TimeFrameError> {
        let max = unit.max_amount();
        if !(1..=max).contains(&amount) {
            return Err(TimeFrameError::InvalidAmount {
                unit,
                message: format!("amount must be between 1 and {max}, got {amount}"),
            });
        }
        Ok(())
    }
}

/// Gateway code, e.g. `5min`, `1h`, `1d`, `1y`.
impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.code())
    }
}

impl FromStr for TimeFrame {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeFrameError::InvalidInput {
                message: format!("missing unit in timeframe {s:?}"),
            })?;
        let (digits, unit) = s.split_at(split);
        let amount: u32 = digits.parse().map_err(|_| TimeFrameError::InvalidInput {
            message: format!("missing amount in timeframe {s:?}"),
        })?;
        let unit = match unit {
            "min" | "mins" => TimeFrameUnit::Minute,
            "h" | "hr" | "hrs" => TimeFrameUnit::Hour,
            "d" => TimeFrameUnit::Day,
            "w" => TimeFrameUnit::Week,
            "m" => TimeFrameUnit::Month,
            "y" => TimeFrameUnit::Year,
            other => {
                return Err(TimeFrameError::InvalidInput {
                    message: format!("unknown timeframe unit {other:?}"),
                });
            }
        };
        TimeFrame::new(amount, unit)
    }
}

impl TryFrom<String> for TimeFrame {
    type Error = TimeFrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeFrame> for String {
    fn from(value: TimeFrame) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gateway_codes() {
        let tf: TimeFrame = "5min".parse().unwrap();
        assert_eq!(tf, TimeFrame::new(5, TimeFrameUnit::Minute).unwrap());
        assert_eq!("1d".parse::<TimeFrame>().unwrap(), TimeFrame::day());
        assert_eq!("1y".parse::<TimeFrame>().unwrap().unit, TimeFrameUnit::Year);
        assert_eq!("6m".parse::<TimeFrame>().unwrap().unit, TimeFrameUnit::Month);
    }

    #[test]
    fn displays_gateway_codes() {
        assert_eq!(TimeFrame::day().to_string(), "1d");
        assert_eq!(TimeFrame::years(2).unwrap().to_string(), "2y");
        assert_eq!(
            TimeFrame::new(15, TimeFrameUnit::Minute).unwrap().to_string(),
            "15min"
        );
    }

    #[test]
    fn rejects_out_of_range_amounts() {
        assert!(TimeFrame::new(0, TimeFrameUnit::Day).is_err());
        assert!(TimeFrame::new(31, TimeFrameUnit::Minute).is_err());
        assert!(TimeFrame::new(16, TimeFrameUnit::Year).is_err());
        match TimeFrame::new(9, TimeFrameUnit::Hour) {
            Err(TimeFrameError::InvalidAmount { unit, message }) => {
                assert_eq!(unit, TimeFrameUnit::Hour);
                assert!(message.contains("between 1 and 8"));
            }
            other => panic!("Expected InvalidAmount error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("".parse::<TimeFrame>().is_err());
        assert!("d".parse::<TimeFrame>().is_err());
        assert!("12".parse::<TimeFrame>().is_err());
        assert!("1q".parse::<TimeFrame>().is_err());
    }

    #[test]
    fn serde_uses_gateway_code() {
        #[derive(Deserialize)]
        struct Wrapper {
            bar: TimeFrame,
        }
        let w: Wrapper = serde_json::from_str(r#"{"bar":"1w"}"#).unwrap();
        assert_eq!(w.bar.unit, TimeFrameUnit::Week);
        assert!(serde_json::from_str::<Wrapper>(r#"{"bar":"0w"}"#).is_err());
    }
}

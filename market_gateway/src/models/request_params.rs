use serde::{Deserialize, Serialize};

use crate::models::timeframe::{TimeFrame, TimeFrameUnit};

/// Parameters for a historical bars request.
///
/// The instrument itself is passed separately; this only describes how much
/// history to fetch and at what granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// How far back to fetch (e.g. `1y`).
    pub period: TimeFrame,

    /// The time interval for each bar (e.g. `1d`).
    pub bar: TimeFrame,

    /// Whether bars include trading outside regular trading hours.
    #[serde(default = "default_outside_rth")]
    pub outside_rth: bool,
}

fn default_outside_rth() -> bool {
    true
}

impl Default for HistoryRequest {
    /// Two years of daily bars, including extended hours. One year of
    /// sessions is only just enough to fill a 252-bar channel.
    fn default() -> Self {
        Self {
            period: TimeFrame {
                amount: 2,
                unit: TimeFrameUnit::Year,
            },
            bar: TimeFrame::day(),
            outside_rth: true,
        }
    }
}

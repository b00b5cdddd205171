use chrono::{Duration, TimeZone, Utc};
use indexmap::IndexMap;
use market_gateway::models::{
    bar::Bar, bar_series::BarSeries, contract::InstrumentId, timeframe::TimeFrame,
};
use signal_screener::{ScreenError, Screener, ScreenerParams, screen_outcomes, screen_universe};

fn pullback_series(conid: i64) -> BarSeries {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
    let day = |i: usize| start + Duration::days(i as i64);
    let mut bars: Vec<Bar> = (0..252)
        .map(|i| Bar::new(day(i), 100.0, 101.0, 99.0, 100.0, 150_000.0))
        .collect();
    bars.push(Bar::new(day(252), 100.5, 110.5, 100.0, 110.0, 400_000.0));
    bars.push(Bar::new(day(253), 107.0, 107.5, 106.0, 106.7, 600_000.0));
    BarSeries::new(InstrumentId::from(conid), TimeFrame::day(), bars)
}

fn universe_with_one_bad() -> IndexMap<String, BarSeries> {
    let mut universe = IndexMap::new();
    for i in 0..10 {
        let ticker = format!("T{i}");
        let series = if i == 6 {
            let mut short = pullback_series(i);
            short.bars.truncate(30);
            short
        } else {
            pullback_series(i)
        };
        universe.insert(ticker, series);
    }
    universe
}

#[test]
fn one_malformed_series_does_not_affect_the_others() {
    let screener = Screener::new(ScreenerParams::default()).unwrap();
    let universe = universe_with_one_bad();

    let results = screen_universe(&screener, &universe);
    assert_eq!(results.len(), 10);
    let tickers: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(tickers, universe.keys().map(String::as_str).collect::<Vec<_>>());

    for (ticker, result) in &results {
        if ticker == "T6" {
            assert!(result.is_empty());
        } else {
            assert_eq!(result.buys.len(), 1, "{ticker}");
            assert_eq!(result.sells.len(), 1, "{ticker}");
            assert_eq!(result.buys[0].ticker, *ticker);
        }
    }
}

#[test]
fn outcomes_keep_the_error() {
    let screener = Screener::new(ScreenerParams::default()).unwrap();
    let outcomes = screen_outcomes(&screener, &universe_with_one_bad());

    let failures: Vec<(&String, &ScreenError)> = outcomes
        .iter()
        .filter_map(|(t, o)| o.as_ref().err().map(|e| (t, e)))
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "T6");
    assert!(matches!(
        failures[0].1,
        ScreenError::InsufficientData { actual: 30, .. }
    ));
}

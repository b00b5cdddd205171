//! Application configuration: a TOML file plus environment overrides.
//!
//! Every section is optional and falls back to its defaults. After the file
//! is parsed, the variables below are applied on top, then tickers are
//! normalized (trimmed, uppercased, de-duplicated preserving order) and the
//! result is validated.
//!
//! | variable                 | field                           |
//! |--------------------------|---------------------------------|
//! | `IBKR_ACCOUNT_ID`        | `account_id`                    |
//! | `TRADING_CHECK_INTERVAL` | `cycle.interval_secs`           |
//! | `TICKERS`                | `cycle.tickers` (comma list)    |
//! | `MAX_POSITIONS`          | `sizing.max_positions`          |
//! | `ALLOCATION_PER_TRADE`   | `sizing.allocation_per_trade`   |
//! | `MAX_DRAWDOWN`           | `risk.max_drawdown`             |
//! | `MAX_POSITION_SIZE`      | `risk.max_position_size`        |
//! | `PROFIT_THRESHOLD`       | `screener.profit_threshold`     |
//! | `MIN_PRICE`              | `screener.min_price`            |
//! | `GATEWAY_BASE_URL`       | `gateway.base_url`              |
//! | `GATEWAY_SESSION_TOKEN`  | `gateway.session_token`         |
//!
//! Entrypoints: [`AppConfig::from_toml_str`] (no environment) and
//! [`load_config_path`].

use std::{collections::HashSet, path::Path, time::Duration};

use anyhow::Context;
use market_gateway::{
    models::{request_params::HistoryRequest, timeframe::TimeFrame},
    providers::ib_gateway::client::GatewayConfig,
    rate_limit::RateLimitConfig,
    resolver::{ContractFilter, DEFAULT_TTL},
};
use serde::{Deserialize, Serialize};
use shared_utils::{
    config::ConfigError,
    env::{env_list, env_opt, parse_env},
};
use signal_screener::{ScreenError, ScreenerParams};

use crate::{risk::RiskLimits, schedule::BackoffPolicy, sizing::PositionSizer};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Account used for risk checks and order sizing. Without it the cycle
    /// only screens.
    pub account_id: Option<String>,
    pub gateway: GatewayConfig,
    pub rate_limits: RateLimitConfig,
    pub resolver: ResolverConfig,
    pub screener: ScreenerParams,
    pub cycle: CycleConfig,
    pub risk: RiskLimits,
    pub sizing: PositionSizer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub ttl_secs: u64,
    #[serde(flatten)]
    pub filter: ContractFilter,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            filter: ContractFilter::default(),
        }
    }
}

impl ResolverConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub tickers: Vec<String>,
    /// Pause between cycles.
    pub interval_secs: u64,
    pub backoff_step_secs: u64,
    pub backoff_cap_secs: u64,
    /// Tickers resolved and fetched at the same time.
    pub max_concurrency: usize,
    pub history_period: TimeFrame,
    pub bar_size: TimeFrame,
    pub outside_rth: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        let history = HistoryRequest::default();
        Self {
            tickers: vec!["AAPL".to_string(), "MSFT".to_string()],
            interval_secs: 60,
            backoff_step_secs: 30,
            backoff_cap_secs: 300,
            max_concurrency: 4,
            history_period: history.period,
            bar_size: history.bar,
            outside_rth: history.outside_rth,
        }
    }
}

impl CycleConfig {
    pub fn history_request(&self) -> HistoryRequest {
        HistoryRequest {
            period: self.history_period,
            bar: self.bar_size,
            outside_rth: self.outside_rth,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            step: Duration::from_secs(self.backoff_step_secs),
            cap: Duration::from_secs(self.backoff_cap_secs),
        }
    }
}

impl AppConfig {
    /// Parses a TOML document. Neither the environment nor validation is
    /// applied.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("parsing config TOML")
    }

    /// Applies the environment overrides listed in the module docs.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(account) = env_opt("IBKR_ACCOUNT_ID") {
            self.account_id = Some(account);
        }
        if let Some(secs) = parse_env("TRADING_CHECK_INTERVAL")? {
            self.cycle.interval_secs = secs;
        }
        if let Some(tickers) = env_list("TICKERS") {
            self.cycle.tickers = tickers;
        }
        if let Some(n) = parse_env("MAX_POSITIONS")? {
            self.sizing.max_positions = n;
        }
        if let Some(amount) = parse_env("ALLOCATION_PER_TRADE")? {
            self.sizing.allocation_per_trade = amount;
        }
        if let Some(fraction) = parse_env("MAX_DRAWDOWN")? {
            self.risk.max_drawdown = fraction;
        }
        if let Some(fraction) = parse_env("MAX_POSITION_SIZE")? {
            self.risk.max_position_size = fraction;
        }
        if let Some(pct) = parse_env("PROFIT_THRESHOLD")? {
            self.screener.profit_threshold = pct;
        }
        if let Some(price) = parse_env("MIN_PRICE")? {
            self.screener.min_price = price;
        }
        self.gateway = std::mem::take(&mut self.gateway).with_env_overrides();
        Ok(())
    }

    /// Trims and uppercases tickers and drops duplicates, keeping the first
    /// occurrence. Returns how many entries were dropped.
    pub fn normalize(&mut self) -> usize {
        let mut seen = HashSet::new();
        let before = self.cycle.tickers.len();
        self.cycle.tickers = std::mem::take(&mut self.cycle.tickers)
            .into_iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
        before - self.cycle.tickers.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle.tickers.is_empty() {
            return Err(ConfigError::invalid("cycle.tickers", "at least one ticker is required"));
        }
        if self.cycle.interval_secs == 0 {
            return Err(ConfigError::invalid("cycle.interval_secs", "must be at least 1"));
        }
        if self.cycle.max_concurrency == 0 {
            return Err(ConfigError::invalid("cycle.max_concurrency", "must be at least 1"));
        }
        if self.cycle.backoff_cap_secs < self.cycle.backoff_step_secs {
            return Err(ConfigError::invalid(
                "cycle.backoff_cap_secs",
                "must not be below backoff_step_secs",
            ));
        }
        if self.resolver.ttl_secs == 0 {
            return Err(ConfigError::invalid("resolver.ttl_secs", "must be at least 1"));
        }
        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("gateway.request_timeout_secs", "must be at least 1"));
        }
        if self.rate_limits.global.window_ms == 0
            || self.rate_limits.endpoints.values().any(|spec| spec.window_ms == 0)
        {
            return Err(ConfigError::invalid("rate_limits", "window_ms must be at least 1"));
        }

        self.screener.validate().map_err(|err| match err {
            ScreenError::InvalidParams { field, reason } => {
                ConfigError::invalid(format!("screener.{field}"), reason)
            }
            other => ConfigError::invalid("screener", other.to_string()),
        })?;

        let fractions = [
            ("risk.max_drawdown", self.risk.max_drawdown),
            ("risk.max_position_size", self.risk.max_position_size),
        ];
        for (field, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be in (0, 1], got {value}"),
                ));
            }
        }
        if self.sizing.max_positions == 0 {
            return Err(ConfigError::invalid("sizing.max_positions", "must be at least 1"));
        }
        let allocation = self.sizing.allocation_per_trade;
        if !(allocation.is_finite() && allocation > 0.0) {
            return Err(ConfigError::invalid(
                "sizing.allocation_per_trade",
                format!("must be positive, got {allocation}"),
            ));
        }
        Ok(())
    }
}

/// Reads a config file, applies the environment, normalizes and validates.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let mut config = AppConfig::from_toml_str(&s)
        .with_context(|| format!("loading config {}", path.display()))?;
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;
    config.normalize();
    config
        .validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use market_gateway::models::timeframe::TimeFrameUnit;
    use serial_test::serial;

    use super::*;

    const ENV_VARS: [&str; 11] = [
        "IBKR_ACCOUNT_ID",
        "TRADING_CHECK_INTERVAL",
        "TICKERS",
        "MAX_POSITIONS",
        "ALLOCATION_PER_TRADE",
        "MAX_DRAWDOWN",
        "MAX_POSITION_SIZE",
        "PROFIT_THRESHOLD",
        "MIN_PRICE",
        "GATEWAY_BASE_URL",
        "GATEWAY_SESSION_TOKEN",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            // SAFETY: every test touching these variables is #[serial].
            unsafe { std::env::remove_var(name) };
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.cycle, CycleConfig::default());
        assert_eq!(config.cycle.history_request(), HistoryRequest::default());
        assert_eq!(config.resolver.ttl(), DEFAULT_TTL);
        assert_eq!(config.screener, ScreenerParams::default());
        assert!(config.account_id.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn sections_parse() {
        let config = AppConfig::from_toml_str(
            r#"
            account_id = "DU123"

            [gateway]
            base_url = "https://127.0.0.1:5000/v1/api"

            [rate_limits.global]
            max_requests = 20
            window_ms = 1000

            [resolver]
            ttl_secs = 600
            exchanges = ["LSE"]

            [screener]
            channel_period = 100

            [cycle]
            tickers = ["nvda", "amd"]
            interval_secs = 300
            history_period = "1y"
            bar_size = "1h"
            "#,
        )
        .unwrap();

        assert_eq!(config.account_id.as_deref(), Some("DU123"));
        assert_eq!(config.gateway.base_url, "https://127.0.0.1:5000/v1/api");
        assert_eq!(config.rate_limits.global.max_requests.get(), 20);
        assert_eq!(config.resolver.ttl_secs, 600);
        assert_eq!(config.resolver.filter.exchanges, vec!["LSE"]);
        assert_eq!(config.resolver.filter.sec_type, "STK");
        assert_eq!(config.screener.channel_period, 100);
        assert_eq!(config.screener.atr_period, 5);
        assert_eq!(config.cycle.interval(), Duration::from_secs(300));
        assert_eq!(config.cycle.history_period.unit, TimeFrameUnit::Year);
        assert_eq!(config.cycle.bar_size.unit, TimeFrameUnit::Hour);
        assert_eq!(config.cycle.max_concurrency, 4);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let err = AppConfig::from_toml_str("acount_id = \"typo\"").unwrap_err();
        assert!(format!("{err:#}").contains("acount_id"));
    }

    #[test]
    fn bad_timeframe_is_rejected() {
        assert!(AppConfig::from_toml_str("[cycle]\nbar_size = \"0d\"").is_err());
    }

    #[test]
    fn normalize_uppercases_and_dedupes() {
        let mut config = AppConfig::default();
        config.cycle.tickers = vec![" aapl".into(), "MSFT".into(), "AAPL".into(), " ".into()];
        assert_eq!(config.normalize(), 2);
        assert_eq!(config.cycle.tickers, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let cases: [(&str, fn(&mut AppConfig)); 6] = [
            ("cycle.tickers", |c| c.cycle.tickers.clear()),
            ("cycle.interval_secs", |c| c.cycle.interval_secs = 0),
            ("cycle.max_concurrency", |c| c.cycle.max_concurrency = 0),
            ("screener.channel_period", |c| c.screener.channel_period = 0),
            ("risk.max_drawdown", |c| c.risk.max_drawdown = 1.5),
            ("sizing.allocation_per_trade", |c| c.sizing.allocation_per_trade = 0.0),
        ];
        for (expected, mutate) in cases {
            let mut config = AppConfig::default();
            mutate(&mut config);
            match config.validate() {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    #[serial]
    fn env_overrides_apply_after_file() {
        clear_env();
        let file = write_config(
            r#"
            [cycle]
            tickers = ["spy"]
            interval_secs = 120

            [sizing]
            max_positions = 3
            "#,
        );
        unsafe {
            std::env::set_var("TICKERS", "aapl, msft,aapl");
            std::env::set_var("MAX_POSITIONS", "7");
            std::env::set_var("MIN_PRICE", "2.5");
            std::env::set_var("IBKR_ACCOUNT_ID", "DU999");
            std::env::set_var("GATEWAY_SESSION_TOKEN", "secret");
        }

        let config = load_config_path(file.path()).unwrap();
        clear_env();

        assert_eq!(config.cycle.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.cycle.interval_secs, 120);
        assert_eq!(config.sizing.max_positions, 7);
        assert_eq!(config.screener.min_price, 2.5);
        assert_eq!(config.account_id.as_deref(), Some("DU999"));
        assert_eq!(config.gateway.session_token.as_deref(), Some("secret"));
        assert!(!format!("{:?}", config.gateway).contains("secret"));
    }

    #[test]
    #[serial]
    fn unparsable_env_value_fails_loading() {
        clear_env();
        let file = write_config("");
        unsafe { std::env::set_var("TRADING_CHECK_INTERVAL", "soon") };

        let err = load_config_path(file.path()).unwrap_err();
        clear_env();

        let cause = err
            .chain()
            .find_map(|e| e.downcast_ref::<ConfigError>())
            .expect("config error in chain");
        assert!(matches!(cause, ConfigError::InvalidEnvVar { name, .. } if name == "TRADING_CHECK_INTERVAL"));
    }

    #[test]
    #[serial]
    fn missing_file_names_the_path() {
        clear_env();
        let err = load_config_path("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}

use std::{fmt::Display, str::FromStr};

use crate::config::ConfigError;

/// Reads an optional environment variable.
///
/// Surrounding whitespace is trimmed, and a variable that is unset or blank
/// is reported as `None`.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset or blank, and
/// [`ConfigError::InvalidEnvVar`] when it is set but does not parse as `T`.
pub fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = env_opt(name) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: raw,
            reason: e.to_string(),
        })
}

/// Reads a comma separated list from an environment variable.
///
/// Items are trimmed and empty items dropped, so `"AAPL, MSFT,,"` yields
/// `["AAPL", "MSFT"]`. Returns `None` when the variable is unset or blank.
pub fn env_list(name: &str) -> Option<Vec<String>> {
    env_opt(name).map(|raw| split_list(&raw))
}

/// Splits a comma separated list, trimming items and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

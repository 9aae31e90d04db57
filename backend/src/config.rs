//! Service configuration, read from the environment once at startup.

use crate::errors::ApiError;
use ledger_core::types::SeriesStatistic;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_API_KEY: &str = "dev-secret-key";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_RELAY_DELAY_MS: u64 = 250;

/// Who answers decryption requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OracleMode {
    /// In-process reference oracle (development only).
    Local,
    /// An outside oracle polls open jobs and posts callbacks over HTTP.
    External,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub api_key: String,
    pub data_dir: PathBuf,
    pub statistic: SeriesStatistic,
    pub oracle_mode: OracleMode,
    pub relay_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let statistic = match get("SERIES_STATISTIC") {
            Some(s) => SeriesStatistic::parse(&s)
                .ok_or_else(|| ApiError::Config(format!("SERIES_STATISTIC must be count or sum, got {s:?}")))?,
            None => SeriesStatistic::default(),
        };

        let oracle_mode = match get("ORACLE_MODE").as_deref().map(str::trim) {
            None | Some("local") => OracleMode::Local,
            Some("external") => OracleMode::External,
            Some(other) => {
                return Err(ApiError::Config(format!("ORACLE_MODE must be local or external, got {other:?}")));
            }
        };

        let relay_delay_ms = match get("ORACLE_RELAY_DELAY_MS") {
            Some(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| ApiError::Config(format!("ORACLE_RELAY_DELAY_MS must be an integer, got {s:?}")))?,
            None => DEFAULT_RELAY_DELAY_MS,
        };

        Ok(Self {
            addr: get("BACKEND_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            api_key: get("API_KEY").unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            data_dir: PathBuf::from(get("LEDGER_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            statistic,
            oracle_mode,
            relay_delay: Duration::from_millis(relay_delay_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.api_key, DEFAULT_API_KEY);
        assert_eq!(cfg.statistic, SeriesStatistic::Count);
        assert_eq!(cfg.oracle_mode, OracleMode::Local);
        assert_eq!(cfg.relay_delay, Duration::from_millis(DEFAULT_RELAY_DELAY_MS));
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("SERIES_STATISTIC", "sum"),
            ("ORACLE_MODE", "external"),
            ("ORACLE_RELAY_DELAY_MS", "0"),
            ("LEDGER_DATA_DIR", "/tmp/ledger"),
        ]))
        .unwrap();
        assert_eq!(cfg.statistic, SeriesStatistic::Sum);
        assert_eq!(cfg.oracle_mode, OracleMode::External);
        assert_eq!(cfg.relay_delay, Duration::ZERO);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/ledger"));
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("SERIES_STATISTIC", "median")])),
            Err(ApiError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ORACLE_MODE", "cloud")])),
            Err(ApiError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ORACLE_RELAY_DELAY_MS", "soon")])),
            Err(ApiError::Config(_))
        ));
    }
}

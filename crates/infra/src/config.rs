//! Ledger configuration, loaded from `SITELEDGER_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::allocator::DEFAULT_MAX_ATTEMPTS;

pub const ENV_DATABASE_PATH: &str = "SITELEDGER_DATABASE_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "SITELEDGER_MAX_CONNECTIONS";
pub const ENV_ID_ATTEMPTS: &str = "SITELEDGER_ID_ATTEMPTS";
pub const ENV_RECONCILE_ON_STARTUP: &str = "SITELEDGER_RECONCILE_ON_STARTUP";
pub const ENV_LOG_JSON: &str = "SITELEDGER_LOG_JSON";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub id_attempts: u32,
    pub reconcile_on_startup: bool,
    pub log_json: bool,
}

impl LedgerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys take their defaults;
    /// set-but-invalid keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup(ENV_DATABASE_PATH).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        let max_connections = parse_or(&lookup, ENV_MAX_CONNECTIONS, 1u32)?;
        if max_connections == 0 {
            return Err(invalid(ENV_MAX_CONNECTIONS, "0", "must be at least 1"));
        }

        let id_attempts = parse_or(&lookup, ENV_ID_ATTEMPTS, DEFAULT_MAX_ATTEMPTS)?;
        if id_attempts == 0 {
            return Err(invalid(ENV_ID_ATTEMPTS, "0", "must be at least 1"));
        }

        Ok(Self {
            database_path,
            max_connections,
            id_attempts,
            reconcile_on_startup: parse_bool_or(&lookup, ENV_RECONCILE_ON_STARTUP, true)?,
            log_json: parse_bool_or(&lookup, ENV_LOG_JSON, false)?,
        })
    }
}

/// `{app_data_dir}/siteledger/ledger.db`
fn default_database_path() -> Result<PathBuf, ConfigError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or(ConfigError::NoDataDir)?;
    dir.push("siteledger");
    dir.push("ledger.db");
    Ok(dir)
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &raw, "expected true/false")),
        },
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_values_are_used() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/tmp/ledger.db"),
            (ENV_MAX_CONNECTIONS, "4"),
            (ENV_ID_ATTEMPTS, "50"),
            (ENV_RECONCILE_ON_STARTUP, "no"),
            (ENV_LOG_JSON, "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.id_attempts, 50);
        assert!(!config.reconcile_on_startup);
        assert!(config.log_json);
    }

    #[test]
    fn unset_values_fall_back_to_defaults() {
        let config =
            LedgerConfig::from_lookup(lookup(&[(ENV_DATABASE_PATH, "/tmp/ledger.db")])).unwrap();
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.id_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.reconcile_on_startup);
        assert!(!config.log_json);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = LedgerConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/tmp/ledger.db"),
            (ENV_ID_ATTEMPTS, "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_ID_ATTEMPTS, .. }));
    }

    #[test]
    fn zero_connections_is_rejected() {
        let err = LedgerConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/tmp/ledger.db"),
            (ENV_MAX_CONNECTIONS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_MAX_CONNECTIONS, .. }));
    }

    #[test]
    fn malformed_bools_are_rejected() {
        let err = LedgerConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/tmp/ledger.db"),
            (ENV_LOG_JSON, "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_LOG_JSON, .. }));
    }
}

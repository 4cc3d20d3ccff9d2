use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::forward::{DEFAULT_DISPLAY_TIMEOUT, DEFAULT_DISPLAY_URL};

pub const DEFAULT_FRONTEND_DIR: &str = "frontend";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Process settings. Connection credentials only ever come from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub display_url: String,
    pub display_timeout: Duration,
    pub frontend_dir: PathBuf,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let display_url = lookup("DISPLAY_URL").unwrap_or_else(|| DEFAULT_DISPLAY_URL.to_string());

        let display_timeout = match lookup("DISPLAY_TIMEOUT_MS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid {
                    key: "DISPLAY_TIMEOUT_MS",
                    value,
                })?,
            None => DEFAULT_DISPLAY_TIMEOUT,
        };

        let frontend_dir = lookup("FRONTEND_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRONTEND_DIR));

        Ok(Self {
            database_url,
            display_url,
            display_timeout,
            frontend_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/sensoresDB")])).unwrap();
        assert_eq!(config.display_url, DEFAULT_DISPLAY_URL);
        assert_eq!(config.display_timeout, Duration::from_secs(1));
        assert_eq!(config.frontend_dir, PathBuf::from("frontend"));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/sensoresDB"),
            ("DISPLAY_URL", "http://10.0.0.5/mostrar"),
            ("DISPLAY_TIMEOUT_MS", "250"),
            ("FRONTEND_DIR", "/srv/frontend"),
        ]))
        .unwrap();
        assert_eq!(config.display_url, "http://10.0.0.5/mostrar");
        assert_eq!(config.display_timeout, Duration::from_millis(250));
        assert_eq!(config.frontend_dir, PathBuf::from("/srv/frontend"));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/sensoresDB"),
            ("DISPLAY_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DISPLAY_TIMEOUT_MS", .. }));
    }
}

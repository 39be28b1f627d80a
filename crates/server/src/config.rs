//! Server configuration read from the environment (and `.env` when present).

use std::net::{IpAddr, SocketAddr};

use chrono_tz::Tz;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://rent.db";
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid HOST: {0}")]
    InvalidHost(String),
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid RENT_TIMEZONE: {0}")]
    InvalidTimezone(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Timezone whose calendar date counts as "today" for due dates
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let host = match lookup("HOST") {
            Some(raw) => raw
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidHost(raw))?,
            None => IpAddr::from([127, 0, 0, 1]),
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let timezone = match lookup("RENT_TIMEZONE") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(raw))?,
            None => Tz::UTC,
        };

        Ok(Self {
            database_url,
            bind_addr: SocketAddr::new(host, port),
            timezone,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr, "127.0.0.1:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.timezone, Tz::UTC);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://other.db"),
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("RENT_TIMEZONE", "Australia/Sydney"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite://other.db");
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.timezone, chrono_tz::Australia::Sydney);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("RENT_TIMEZONE", "Mars/Olympus")])),
            Err(ConfigError::InvalidTimezone(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("HOST", "localhost:80")])),
            Err(ConfigError::InvalidHost(_))
        ));
    }
}

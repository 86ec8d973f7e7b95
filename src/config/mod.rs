//! Configuration module for the quotes API.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::limiter::LimiterConfig;

/// SMTP relay settings. Absent when mail should be written to disk.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Deployment environment reported by the healthcheck
    pub env: String,
    pub limiter: LimiterConfig,
    pub smtp: Option<SmtpConfig>,
    /// Envelope sender for outgoing mail
    pub sender: String,
    /// Where mail lands when no SMTP host is configured
    pub mail_dir: PathBuf,
}

#[derive(Debug)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.key, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let smtp = match lookup("API_SMTP_HOST").filter(|h| !h.is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse("API_SMTP_PORT", get("API_SMTP_PORT", "25"))?,
                username: get("API_SMTP_USERNAME", ""),
                password: get("API_SMTP_PASSWORD", ""),
            }),
            None => None,
        };

        Ok(Self {
            db_path: get("API_DB_PATH", "./data/quotes.sqlite").into(),
            bind_addr: parse("API_BIND_ADDR", get("API_BIND_ADDR", "127.0.0.1:4000"))?,
            log_level: get("API_LOG_LEVEL", "info"),
            env: get("API_ENV", "development"),
            limiter: LimiterConfig {
                enabled: parse("API_LIMITER_ENABLED", get("API_LIMITER_ENABLED", "true"))?,
                rps: parse("API_LIMITER_RPS", get("API_LIMITER_RPS", "2"))?,
                burst: parse("API_LIMITER_BURST", get("API_LIMITER_BURST", "4"))?,
            },
            smtp,
            sender: get("API_SMTP_SENDER", "Quotes API <no-reply@quotes.local>"),
            mail_dir: get("API_MAIL_DIR", "./data/mail").into(),
        })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError { key, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/quotes.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:4000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.env, "development");
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.rps, 2.0);
        assert_eq!(config.limiter.burst, 4);
        assert!(config.smtp.is_none());
        assert_eq!(config.mail_dir, PathBuf::from("./data/mail"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("API_BIND_ADDR", "0.0.0.0:9000"),
            ("API_ENV", "production"),
            ("API_LIMITER_ENABLED", "false"),
            ("API_LIMITER_RPS", "0.5"),
            ("API_SMTP_HOST", "smtp.example.com"),
            ("API_SMTP_PORT", "587"),
            ("API_SMTP_USERNAME", "mailer"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.env, "production");
        assert!(!config.limiter.enabled);
        assert_eq!(config.limiter.rps, 0.5);

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.username, "mailer");
        assert_eq!(smtp.password, "");
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = config_from(&[("API_BIND_ADDR", "not-an-address")]).unwrap_err();
        assert_eq!(err.key, "API_BIND_ADDR");

        let err = config_from(&[("API_LIMITER_BURST", "-1")]).unwrap_err();
        assert_eq!(err.key, "API_LIMITER_BURST");
    }
}

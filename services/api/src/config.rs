//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Upper bound for `AUTH_SESSION_TTL_SECS` (30 days).
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    /// OpenAI-compatible base URL of the paraphrasing model (Ollama by default).
    pub paraphrase_api_base: String,
    pub paraphrase_api_key: String,
    pub paraphrase_model: String,
    pub paraphrase_timeout: Duration,
    pub max_medications: usize,
    pub auth_session_ttl: Duration,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address = parse::<SocketAddr>("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:5000"))?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let database_max_connections =
            parse::<u32>("DATABASE_MAX_CONNECTIONS", &var("DATABASE_MAX_CONNECTIONS", "10"))?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Paraphraser Settings ---
        let paraphrase_api_base = var("PARAPHRASE_API_BASE", "http://localhost:11434/v1");
        let paraphrase_api_key = var("PARAPHRASE_API_KEY", "ollama");
        let paraphrase_model = var("PARAPHRASE_MODEL", "llama3.2:3b");
        let timeout_secs = parse::<u64>("PARAPHRASE_TIMEOUT_SECS", &var("PARAPHRASE_TIMEOUT_SECS", "30"))?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PARAPHRASE_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Interaction Check & Auth Settings ---
        let max_medications = parse::<usize>("MAX_MEDICATIONS", &var("MAX_MEDICATIONS", "5"))?;
        if max_medications == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_MEDICATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let ttl_secs = parse::<u64>("AUTH_SESSION_TTL_SECS", &var("AUTH_SESSION_TTL_SECS", "3600"))?;
        if ttl_secs == 0 || ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::InvalidValue(
                "AUTH_SESSION_TTL_SECS".to_string(),
                format!("must be between 1 and {}", MAX_SESSION_TTL_SECS),
            ));
        }
        let cors_allowed_origin = var("CORS_ALLOWED_ORIGIN", "http://localhost:5000");

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            paraphrase_api_base,
            paraphrase_api_key,
            paraphrase_model,
            paraphrase_timeout: Duration::from_secs(timeout_secs),
            max_medications,
            auth_session_ttl: Duration::from_secs(ttl_secs),
            cors_allowed_origin,
        })
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/pharmacheck")]).unwrap();
        assert_eq!(config.bind_address.port(), 5000);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.paraphrase_api_base, "http://localhost:11434/v1");
        assert_eq!(config.paraphrase_model, "llama3.2:3b");
        assert_eq!(config.paraphrase_timeout, Duration::from_secs(30));
        assert_eq!(config.max_medications, 5);
        assert_eq!(config.auth_session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("DATABASE_URL", "postgres://x"), ("MAX_MEDICATIONS", "five")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_MEDICATIONS"));

        let err = load(&[("DATABASE_URL", "postgres://x"), ("PARAPHRASE_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "PARAPHRASE_TIMEOUT_SECS"));

        let err = load(&[("DATABASE_URL", "postgres://x"), ("RUST_LOG", "loud")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "RUST_LOG"));

        for ttl in ["0", "2592001", "18446744073709551615"] {
            let err = load(&[("DATABASE_URL", "postgres://x"), ("AUTH_SESSION_TTL_SECS", ttl)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "AUTH_SESSION_TTL_SECS"));
        }
        let config = load(&[("DATABASE_URL", "postgres://x"), ("AUTH_SESSION_TTL_SECS", "2592000")]).unwrap();
        assert_eq!(config.auth_session_ttl, Duration::from_secs(MAX_SESSION_TTL_SECS));
    }
}

use crate::domain::Decimal;
use crate::engine::money::{default_commission_rate, CurrencyFormat};
use crate::orchestration::MarketSettings;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// REST document API; the in-memory source is used when unset.
    pub document_api_url: Option<String>,
    pub poll_interval: Duration,
    pub commission_rate: Decimal,
    pub currency_locale: String,
    pub currency_symbol: Option<String>,
    /// Upper bound on cached per-viewer feeds and ownership memos.
    pub viewer_cache_capacity: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let document_api_url = non_blank(&env_map, "DOCUMENT_API_URL");

        let poll_interval_ms = env_map
            .get("POLL_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("5000")
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "POLL_INTERVAL_MS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let commission_rate = match non_blank(&env_map, "COMMISSION_RATE") {
            None => default_commission_rate(),
            Some(raw) => Decimal::from_str_canonical(&raw)
                .ok()
                .filter(|rate| !rate.is_negative() && *rate <= Decimal::one())
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "COMMISSION_RATE".to_string(),
                        format!("must be a decimal between 0 and 1, got {}", raw),
                    )
                })?,
        };

        let currency_locale =
            non_blank(&env_map, "CURRENCY_LOCALE").unwrap_or_else(|| "en-US".to_string());
        let currency_symbol = non_blank(&env_map, "CURRENCY_SYMBOL");

        let viewer_cache_capacity = env_map
            .get("VIEWER_CACHE_CAPACITY")
            .map(|s| s.as_str())
            .unwrap_or("1024")
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "VIEWER_CACHE_CAPACITY".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            document_api_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            commission_rate,
            currency_locale,
            currency_symbol,
            viewer_cache_capacity,
        })
    }

    pub fn currency_format(&self) -> CurrencyFormat {
        let format = CurrencyFormat::for_locale(&self.currency_locale);
        match &self.currency_symbol {
            Some(symbol) => format.with_symbol(symbol.clone()),
            None => format,
        }
    }

    pub fn market_settings(&self) -> MarketSettings {
        MarketSettings {
            commission_rate: self.commission_rate,
            currency: self.currency_format(),
            viewer_cache_capacity: self.viewer_cache_capacity,
        }
    }
}

fn non_blank(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.document_api_url.is_none());
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.commission_rate, default_commission_rate());
        assert_eq!(config.currency_format(), CurrencyFormat::default());
        assert_eq!(config.viewer_cache_capacity, 1024);
        assert_eq!(config.market_settings().viewer_cache_capacity, 1024);
    }

    #[test]
    fn test_zero_viewer_cache_capacity_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("VIEWER_CACHE_CAPACITY".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "VIEWER_CACHE_CAPACITY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_commission_rate_out_of_range() {
        for bad in ["1.5", "-0.1", "ten percent"] {
            let mut env_map = setup_required_env();
            env_map.insert("COMMISSION_RATE".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "COMMISSION_RATE"),
                _ => panic!("Expected InvalidValue error for {}", bad),
            }
        }
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("POLL_INTERVAL_MS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "POLL_INTERVAL_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_currency_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("CURRENCY_LOCALE".to_string(), "de-DE".to_string());
        env_map.insert("CURRENCY_SYMBOL".to_string(), "CHF".to_string());
        env_map.insert("DOCUMENT_API_URL".to_string(), "http://store".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.currency_format().symbol, "CHF");
        assert_eq!(config.document_api_url.as_deref(), Some("http://store"));
    }
}

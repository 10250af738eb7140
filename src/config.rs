use crate::domain::{Address, Wad};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub price_feed_url: String,
    pub chain_rpc_url: String,
    /// Collateral token (BTC) contract. `None` means not configured and the
    /// borrow flow refuses to start.
    pub collateral_token: Option<Address>,
    /// Borrowing vault contract. Same gating as the collateral token.
    pub vault: Option<Address>,
    pub public_base_url: String,
    pub rate_limit_max: u32,
    pub rate_limit_window_ms: i64,
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

        let price_feed_url = env_map
            .get("PRICE_FEED_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PRICE_FEED_URL".to_string()))?;

        let chain_rpc_url = env_map
            .get("CHAIN_RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("CHAIN_RPC_URL".to_string()))?;

        let collateral_token = parse_contract_address(&env_map, "COLLATERAL_TOKEN_ADDRESS")?;
        let vault = parse_contract_address(&env_map, "VAULT_ADDRESS")?;

        let public_base_url = env_map
            .get("PUBLIC_BASE_URL")
            .cloned()
            .unwrap_or_else(|| "https://tippinbit.app".to_string());

        let rate_limit_max = env_map
            .get("RATE_LIMIT_MAX")
            .map(|s| s.as_str())
            .unwrap_or("20")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "RATE_LIMIT_MAX".to_string(),
                    "must be a valid u32".to_string(),
                )
            })?;

        let rate_limit_window_ms = env_map
            .get("RATE_LIMIT_WINDOW_MS")
            .map(|s| s.as_str())
            .unwrap_or("60000")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "RATE_LIMIT_WINDOW_MS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            price_feed_url,
            chain_rpc_url,
            collateral_token,
            vault,
            public_base_url,
            rate_limit_max,
            rate_limit_window_ms,
        })
    }
}

/// A contract address env var is optional; an unset, empty, or zero-address
/// value all mean "not configured". A present but malformed value is an error.
fn parse_contract_address(
    env_map: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Address>, ConfigError> {
    let raw = match env_map.get(key) {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(None),
    };
    let addr = Address::parse(raw)
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))?;
    if addr.is_placeholder() {
        return Ok(None);
    }
    Ok(Some(addr))
}

/// Protocol constants for BTC-collateral borrowing. Immutable, constructed
/// once at startup and injected wherever collateral math or flow timing is
/// needed.
#[derive(Debug, Clone)]
pub struct BorrowingConfig {
    /// Protocol minimum collateral ratio (2.00).
    pub min_collateral_ratio: Wad,
    /// Protocol target ratio, 5% above minimum (2.05).
    pub target_collateral_ratio: Wad,
    /// Extra client-side safety buffer (1.05).
    pub safety_buffer: Wad,
    /// target * buffer = 2.1525, the ratio actually applied.
    pub effective_ratio: Wad,
    /// A price sample older than this is stale.
    pub price_staleness: Duration,
    pub price_poll_interval: Duration,
    /// Sane USD/BTC band; fetched prices outside it are rejected.
    pub price_band: (f64, f64),
    pub price_retry: RetryPolicy,
    /// Bounded auto-retry for flow steps 2 and 3.
    pub step_retry: RetryPolicy,
    pub balance_poll_interval: Duration,
    /// Pause between an optimistic decrement and the follow-up poll.
    pub optimistic_refetch_delay: Duration,
}

impl Default for BorrowingConfig {
    fn default() -> Self {
        BorrowingConfig {
            min_collateral_ratio: Wad::from_raw(2_000_000_000_000_000_000),
            target_collateral_ratio: Wad::from_raw(2_050_000_000_000_000_000),
            safety_buffer: Wad::from_raw(1_050_000_000_000_000_000),
            effective_ratio: Wad::from_raw(2_152_500_000_000_000_000),
            price_staleness: Duration::from_millis(600_000),
            price_poll_interval: Duration::from_millis(120_000),
            price_band: (10_000.0, 200_000.0),
            price_retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10)),
            step_retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4)),
            balance_poll_interval: Duration::from_millis(10_000),
            optimistic_refetch_delay: Duration::from_millis(1_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "PRICE_FEED_URL".to_string(),
            "https://price.example/api/btc-price".to_string(),
        );
        map.insert(
            "CHAIN_RPC_URL".to_string(),
            "https://bridge.example".to_string(),
        );
        map
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_price_feed_url() {
        let mut env_map = setup_required_env();
        env_map.remove("PRICE_FEED_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "PRICE_FEED_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_contract_addresses_default_to_unconfigured() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert!(config.collateral_token.is_none());
        assert!(config.vault.is_none());
    }

    #[test]
    fn test_zero_address_means_unconfigured() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "VAULT_ADDRESS".to_string(),
            "0x0000000000000000000000000000000000000000".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.vault.is_none());
    }

    #[test]
    fn test_malformed_contract_address_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("VAULT_ADDRESS".to_string(), "not-an-address".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "VAULT_ADDRESS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_effective_ratio_is_target_times_buffer() {
        let cfg = BorrowingConfig::default();
        let product = cfg
            .target_collateral_ratio
            .mul_div_floor(cfg.safety_buffer, Wad::ONE)
            .unwrap();
        assert_eq!(product, cfg.effective_ratio);
    }
}

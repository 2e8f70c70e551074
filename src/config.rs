use crate::errors::BundleError;
use crate::utils::constants::*;
use alloy_primitives::utils::parse_units;
use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Process-level configuration, sourced from the environment (and `.env`).
#[derive(Clone)]
pub struct RescueConfig {
    /// Key controlling the assets being moved
    pub executor_key: PrivateKeySigner,
    /// Key holding ETH that pays for gas
    pub sponsor_key: PrivateKeySigner,
    /// Reputation key used to authenticate relay requests
    pub relay_signing_key: PrivateKeySigner,
    /// Address receiving the rescued assets
    pub recipient: Address,
    /// HTTP RPC URL for chain reads
    pub rpc_http_url: String,
    /// Optional WebSocket RPC URL; enables `newHeads` instead of polling
    pub rpc_wss_url: Option<String>,
    /// Relay endpoint for `eth_callBundle` / `eth_sendBundle`
    pub relay_url: String,
    /// Priority premium added on top of the base fee, in wei
    pub priority_fee: U256,
    pub blocks_in_future: u64,
    pub retry_delay_ms: u64,
    pub resolution_timeout_secs: u64,
    pub head_poll_interval_ms: u64,
    pub http_timeout_secs: u64,
    /// TOML file selecting the strategy
    pub strategy_config_path: String,
}

impl Debug for RescueConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RescueConfig")
            .field("executor", &self.executor_key.address())
            .field("sponsor", &self.sponsor_key.address())
            .field("relay_signer", &self.relay_signing_key.address())
            .field("recipient", &self.recipient)
            .field("rpc_http_url", &self.rpc_http_url)
            .field("rpc_wss_url", &self.rpc_wss_url)
            .field("relay_url", &self.relay_url)
            .field("priority_fee", &self.priority_fee)
            .field("blocks_in_future", &self.blocks_in_future)
            .field("strategy_config_path", &self.strategy_config_path)
            .finish_non_exhaustive()
    }
}

impl RescueConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BundleError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BundleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|value| !value.trim().is_empty()).ok_or_else(|| {
                BundleError::Configuration(format!("Must provide {} environment variable", key))
            })
        };

        let executor_key = parse_key("PRIVATE_KEY_EXECUTOR", &required("PRIVATE_KEY_EXECUTOR")?)?;
        let sponsor_key = parse_key("PRIVATE_KEY_SPONSOR", &required("PRIVATE_KEY_SPONSOR")?)?;
        let relay_signing_key =
            parse_key("FLASHBOTS_RELAY_SIGNING_KEY", &required("FLASHBOTS_RELAY_SIGNING_KEY")?)?;

        let recipient = Address::from_str(required("RECIPIENT")?.trim())
            .map_err(|e| BundleError::Configuration(format!("Invalid RECIPIENT: {}", e)))?;

        let priority_fee = parse_gwei("PRIORITY_GAS_FEE", &required("PRIORITY_GAS_FEE")?)?;

        let rpc_http_url = lookup("ETHEREUM_RPC_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        validate_url("ETHEREUM_RPC_URL", &rpc_http_url)?;

        let rpc_wss_url = lookup("ETHEREUM_WS_URL").filter(|url| !url.trim().is_empty());
        if let Some(url) = &rpc_wss_url {
            validate_url("ETHEREUM_WS_URL", url)?;
        }

        let relay_url = lookup("FLASHBOTS_RELAY_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| FLASHBOTS_RELAY_URL.to_string());
        validate_url("FLASHBOTS_RELAY_URL", &relay_url)?;

        let mut config = Self {
            executor_key,
            sponsor_key,
            relay_signing_key,
            recipient,
            rpc_http_url,
            rpc_wss_url,
            relay_url,
            priority_fee,
            blocks_in_future: BLOCKS_IN_FUTURE,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            resolution_timeout_secs: DEFAULT_RESOLUTION_TIMEOUT_SECS,
            head_poll_interval_ms: DEFAULT_HEAD_POLL_INTERVAL_MS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            strategy_config_path: lookup("STRATEGY_CONFIG")
                .unwrap_or_else(|| DEFAULT_STRATEGY_CONFIG.to_string()),
        };

        if let Some(raw) = lookup("BLOCKS_IN_FUTURE") {
            config.blocks_in_future = parse_number("BLOCKS_IN_FUTURE", &raw)?;
            if config.blocks_in_future == 0 {
                return Err(BundleError::Configuration(
                    "BLOCKS_IN_FUTURE must target a future block".to_string(),
                ));
            }
        }

        if let Some(raw) = lookup("RETRY_DELAY_MS") {
            config.retry_delay_ms = parse_number("RETRY_DELAY_MS", &raw)?;
        }

        if let Some(raw) = lookup("RESOLUTION_TIMEOUT_SECS") {
            config.resolution_timeout_secs = parse_number("RESOLUTION_TIMEOUT_SECS", &raw)?;
        }

        if let Some(raw) = lookup("HEAD_POLL_INTERVAL_MS") {
            config.head_poll_interval_ms = parse_number("HEAD_POLL_INTERVAL_MS", &raw)?;
        }

        if let Some(raw) = lookup("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_number("HTTP_TIMEOUT_SECS", &raw)?;
        }

        Ok(config)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_secs(self.resolution_timeout_secs)
    }

    pub fn head_poll_interval(&self) -> Duration {
        Duration::from_millis(self.head_poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_key(name: &str, raw: &str) -> Result<PrivateKeySigner, BundleError> {
    raw.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|e| BundleError::Configuration(format!("Invalid {}: {}", name, e)))
}

fn parse_gwei(name: &str, raw: &str) -> Result<U256, BundleError> {
    let raw = raw.trim();
    if raw.starts_with('-') {
        return Err(BundleError::Configuration(format!("Invalid {}: must not be negative", name)));
    }
    parse_units(raw, "gwei")
        .map(|units| units.get_absolute())
        .map_err(|e| BundleError::Configuration(format!("Invalid {}: {}", name, e)))
}

fn parse_number(name: &str, raw: &str) -> Result<u64, BundleError> {
    raw.trim()
        .parse()
        .map_err(|e| BundleError::Configuration(format!("Invalid {}: {}", name, e)))
}

fn validate_url(name: &str, raw: &str) -> Result<(), BundleError> {
    Url::parse(raw)
        .map(|_| ())
        .map_err(|e| BundleError::Configuration(format!("Invalid {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const EXECUTOR: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";
    const SPONSOR: &str = "0x0202020202020202020202020202020202020202020202020202020202020202";
    const RELAY: &str = "0x0303030303030303030303030303030303030303030303030303030303030303";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("PRIVATE_KEY_EXECUTOR", EXECUTOR.to_string()),
            ("PRIVATE_KEY_SPONSOR", SPONSOR.to_string()),
            ("FLASHBOTS_RELAY_SIGNING_KEY", RELAY.to_string()),
            ("RECIPIENT", "0x00000000000000000000000000000000000000aa".to_string()),
            ("PRIORITY_GAS_FEE", "2".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<RescueConfig, BundleError> {
        RescueConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.priority_fee, U256::from(2_000_000_000u64));
        assert_eq!(config.recipient, Address::with_last_byte(0xaa));
        assert_eq!(config.rpc_http_url, DEFAULT_RPC_URL);
        assert_eq!(config.relay_url, FLASHBOTS_RELAY_URL);
        assert_eq!(config.rpc_wss_url, None);
        assert_eq!(config.blocks_in_future, 2);
        assert_eq!(config.retry_delay(), Duration::from_millis(5_000));
        assert_eq!(config.resolution_timeout(), Duration::from_secs(120));
        assert_ne!(config.executor_key.address(), config.sponsor_key.address());
    }

    #[test]
    fn test_missing_required_key() {
        for key in [
            "PRIVATE_KEY_EXECUTOR",
            "PRIVATE_KEY_SPONSOR",
            "FLASHBOTS_RELAY_SIGNING_KEY",
            "RECIPIENT",
            "PRIORITY_GAS_FEE",
        ] {
            let mut env = base_env();
            env.remove(key);
            match load(&env) {
                Err(BundleError::Configuration(message)) => assert!(message.contains(key)),
                other => panic!("expected configuration error for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("RECIPIENT", "  ".to_string());
        assert!(matches!(load(&env), Err(BundleError::Configuration(_))));
    }

    #[test]
    fn test_blank_urls_use_defaults() {
        let mut env = base_env();
        env.insert("ETHEREUM_RPC_URL", "".to_string());
        env.insert("FLASHBOTS_RELAY_URL", "   ".to_string());
        env.insert("ETHEREUM_WS_URL", " ".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.rpc_http_url, DEFAULT_RPC_URL);
        assert_eq!(config.relay_url, FLASHBOTS_RELAY_URL);
        assert_eq!(config.rpc_wss_url, None);
    }

    #[test]
    fn test_invalid_values() {
        let mut env = base_env();
        env.insert("PRIVATE_KEY_SPONSOR", "not-a-key".to_string());
        assert!(matches!(load(&env), Err(BundleError::Configuration(_))));

        let mut env = base_env();
        env.insert("PRIORITY_GAS_FEE", "-3".to_string());
        assert!(matches!(load(&env), Err(BundleError::Configuration(_))));

        let mut env = base_env();
        env.insert("ETHEREUM_RPC_URL", "not a url".to_string());
        assert!(matches!(load(&env), Err(BundleError::Configuration(_))));

        let mut env = base_env();
        env.insert("BLOCKS_IN_FUTURE", "0".to_string());
        assert!(matches!(load(&env), Err(BundleError::Configuration(_))));
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("PRIORITY_GAS_FEE", "1.5".to_string());
        env.insert("ETHEREUM_WS_URL", "ws://127.0.0.1:8546".to_string());
        env.insert("BLOCKS_IN_FUTURE", "3".to_string());
        env.insert("RETRY_DELAY_MS", "250".to_string());
        env.insert("STRATEGY_CONFIG", "rescue.toml".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.priority_fee, U256::from(1_500_000_000u64));
        assert_eq!(config.rpc_wss_url.as_deref(), Some("ws://127.0.0.1:8546"));
        assert_eq!(config.blocks_in_future, 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.strategy_config_path, "rescue.toml");
    }
}

use alloy_primitives::U256;

pub const GWEI: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// Gas limit assumed for a payload transaction that carries no explicit hint.
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Intrinsic cost of a plain value transfer; used for the funding transaction.
pub const BASE_TRANSFER_GAS: u64 = 21_000;

/// Distance between the observed head and the block a bundle is submitted for.
pub const BLOCKS_IN_FUTURE: u64 = 2;

pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_RESOLUTION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_HEAD_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const FLASHBOTS_RELAY_URL: &str = "https://relay.flashbots.net";
pub const DEFAULT_STRATEGY_CONFIG: &str = "strategy.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gwei() {
        assert_eq!(GWEI, U256::from(10u64).pow(U256::from(9u64)));
    }
}

use crate::types::{Bundle, BundleEntry, SignedBundle};
use alloy_primitives::U256;
use alloy_primitives::utils::format_units;
use tracing::info;

pub fn gas_price_to_gwei(gas_price: U256) -> String {
    format_units(gas_price, "gwei").unwrap_or_else(|_| gas_price.to_string())
}

/// Dumps every bundle entry next to the hash it was signed into.
pub fn log_bundle(bundle: &Bundle, signed: &SignedBundle) {
    for (index, (entry, signed_tx)) in bundle.entries().iter().zip(&signed.transactions).enumerate() {
        let nonce = signed_tx.origin.map(|(_, nonce)| nonce);
        match entry {
            BundleEntry::Signable { transaction, signer } => info!(
                index,
                signer = %signer,
                to = %transaction.to,
                value = %transaction.value,
                gas_limit = transaction.gas_limit,
                gas_price_gwei = %gas_price_to_gwei(transaction.gas_price),
                data_len = transaction.data.len(),
                nonce = ?nonce,
                hash = %signed_tx.hash,
                "Bundle transaction"
            ),
            BundleEntry::Raw(raw) => info!(
                index,
                raw_len = raw.len(),
                hash = %signed_tx.hash,
                "Bundle transaction (pre-signed)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::GWEI;

    #[test]
    fn test_gas_price_to_gwei() {
        let formatted = gas_price_to_gwei(GWEI * U256::from(32));
        assert!(formatted.starts_with("32."));

        let fractional = gas_price_to_gwei(U256::from(1_500_000_000u64));
        assert!(fractional.starts_with("1.5"));
    }
}

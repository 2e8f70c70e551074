use crate::errors::BundleError;
use crate::types::{GasPlan, UnsignedTransaction};
use crate::utils::constants::DEFAULT_GAS_LIMIT;
use alloy_primitives::U256;

/// Uniform pricing for every entry of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPricer {
    priority_fee: U256,
}

impl GasPricer {
    pub fn new(priority_fee: U256) -> Self {
        Self { priority_fee }
    }

    /// Priority premium plus base fee; a missing base fee counts as zero.
    pub fn gas_price(&self, base_fee: Option<U256>) -> U256 {
        self.priority_fee.saturating_add(base_fee.unwrap_or_default())
    }

    pub fn estimate_gas_limit(&self, transaction: &UnsignedTransaction) -> u64 {
        transaction.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT)
    }

    /// Fails when the summed gas limits do not fit a `u64`.
    pub fn plan(&self, base_fee: Option<U256>, transactions: &[UnsignedTransaction]) -> Result<GasPlan, BundleError> {
        let gas_limits: Vec<u64> = transactions.iter().map(|tx| self.estimate_gas_limit(tx)).collect();
        let total_gas = gas_limits.iter().try_fold(0u64, |total, limit| total.checked_add(*limit)).ok_or_else(|| {
            BundleError::Configuration(format!("gas limits of {} transactions overflow u64", transactions.len()))
        })?;

        Ok(GasPlan { gas_price: self.gas_price(base_fee), gas_limits, total_gas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::GWEI;
    use alloy_primitives::Address;

    #[test]
    fn test_plan_with_hints() {
        let pricer = GasPricer::new(GWEI * U256::from(2));
        let transactions = vec![
            UnsignedTransaction::call(Address::repeat_byte(1), vec![]).with_gas_limit(50_000),
            UnsignedTransaction::call(Address::repeat_byte(2), vec![]).with_gas_limit(70_000),
        ];

        let plan = pricer.plan(Some(GWEI * U256::from(30)), &transactions).unwrap();
        assert_eq!(plan.gas_price, GWEI * U256::from(32));
        assert_eq!(plan.gas_limits, vec![50_000, 70_000]);
        assert_eq!(plan.total_gas, 120_000);
        assert_eq!(plan.funding_value(), U256::from(3_840_000_000_000_000u64));
    }

    #[test]
    fn test_missing_hint_uses_default() {
        let pricer = GasPricer::new(U256::ZERO);
        let transactions = vec![
            UnsignedTransaction::call(Address::ZERO, vec![]),
            UnsignedTransaction::call(Address::ZERO, vec![]).with_gas_limit(30_000),
        ];

        let plan = pricer.plan(None, &transactions).unwrap();
        assert_eq!(plan.gas_limits, vec![DEFAULT_GAS_LIMIT, 30_000]);
        assert_eq!(plan.total_gas, DEFAULT_GAS_LIMIT + 30_000);
    }

    #[test]
    fn test_missing_base_fee_is_zero() {
        let pricer = GasPricer::new(GWEI);
        assert_eq!(pricer.gas_price(None), GWEI);
        assert_eq!(pricer.plan(None, &[]).unwrap().total_gas, 0);
    }

    #[test]
    fn test_gas_limit_overflow_is_configuration_error() {
        let pricer = GasPricer::new(GWEI);
        let transactions = vec![
            UnsignedTransaction::call(Address::repeat_byte(1), vec![]).with_gas_limit(u64::MAX),
            UnsignedTransaction::call(Address::repeat_byte(2), vec![]).with_gas_limit(1),
        ];

        let err = pricer.plan(None, &transactions).unwrap_err();
        assert!(matches!(err, BundleError::Configuration(_)));
        assert!(!err.is_recoverable());
    }
}

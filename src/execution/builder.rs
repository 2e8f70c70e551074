use crate::errors::BundleError;
use crate::types::{Bundle, BundleEntry, GasPlan, PricedTransaction, SignerRole, UnsignedTransaction};
use crate::utils::constants::BASE_TRANSFER_GAS;
use alloy_primitives::{Address, Bytes, U256};

/// Assembles the funding transfer and the payload into one ordered bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleBuilder;

impl BundleBuilder {
    /// Funding transfer (sponsor -> executor) first, then the payload in input order.
    pub fn build(
        transactions: &[UnsignedTransaction],
        sponsor: Address,
        executor: Address,
        plan: &GasPlan,
    ) -> Result<Bundle, BundleError> {
        Self::build_with_presigned(transactions, &[], sponsor, executor, plan)
    }

    /// Same as [`BundleBuilder::build`], with already signed transactions appended verbatim.
    pub fn build_with_presigned(
        transactions: &[UnsignedTransaction],
        presigned: &[Bytes],
        sponsor: Address,
        executor: Address,
        plan: &GasPlan,
    ) -> Result<Bundle, BundleError> {
        if transactions.is_empty() {
            return Err(BundleError::EmptyWork);
        }
        if sponsor == executor {
            return Err(BundleError::Configuration(format!("sponsor and executor are the same account {}", sponsor)));
        }
        if plan.gas_limits.len() != transactions.len() {
            return Err(BundleError::Configuration(format!(
                "gas plan covers {} transactions, strategy produced {}",
                plan.gas_limits.len(),
                transactions.len()
            )));
        }

        let mut entries = Vec::with_capacity(transactions.len() + presigned.len() + 1);

        let funding = PricedTransaction {
            to: executor,
            value: plan.funding_value(),
            data: Bytes::new(),
            gas_limit: BASE_TRANSFER_GAS,
            gas_price: plan.gas_price,
        };
        entries.push(BundleEntry::Signable { transaction: funding, signer: SignerRole::Sponsor });

        for (transaction, gas_limit) in transactions.iter().zip(&plan.gas_limits) {
            let priced = PricedTransaction {
                to: transaction.to,
                value: transaction.value.unwrap_or(U256::ZERO),
                data: transaction.data.clone().unwrap_or_default(),
                gas_limit: *gas_limit,
                gas_price: plan.gas_price,
            };
            entries.push(BundleEntry::Signable { transaction: priced, signer: SignerRole::Executor });
        }

        entries.extend(presigned.iter().cloned().map(BundleEntry::Raw));

        Ok(Bundle::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::GasPricer;
    use crate::utils::GWEI;

    const SPONSOR: Address = Address::repeat_byte(0x5a);
    const EXECUTOR: Address = Address::repeat_byte(0xee);

    fn payload() -> Vec<UnsignedTransaction> {
        vec![
            UnsignedTransaction::call(Address::repeat_byte(0x01), vec![0xaa]).with_gas_limit(50_000),
            UnsignedTransaction::call(Address::repeat_byte(0x02), vec![0xbb]).with_gas_limit(70_000),
        ]
    }

    fn plan(transactions: &[UnsignedTransaction]) -> GasPlan {
        GasPricer::new(GWEI * U256::from(2)).plan(Some(GWEI * U256::from(30)), transactions).unwrap()
    }

    #[test]
    fn test_funding_first_then_payload_in_order() {
        let transactions = payload();
        let bundle = BundleBuilder::build(&transactions, SPONSOR, EXECUTOR, &plan(&transactions)).unwrap();

        assert_eq!(bundle.len(), 3);
        let signers: Vec<_> = bundle.entries().iter().filter_map(BundleEntry::signer).collect();
        assert_eq!(signers, vec![SignerRole::Sponsor, SignerRole::Executor, SignerRole::Executor]);

        let funding = bundle.funding().unwrap();
        assert_eq!(funding.to, EXECUTOR);
        assert_eq!(funding.gas_limit, BASE_TRANSFER_GAS);
        assert_eq!(funding.value, U256::from(3_840_000_000_000_000u64));

        let first = bundle.entries()[1].transaction().unwrap();
        let second = bundle.entries()[2].transaction().unwrap();
        assert_eq!((first.to, first.gas_limit), (Address::repeat_byte(0x01), 50_000));
        assert_eq!((second.to, second.gas_limit), (Address::repeat_byte(0x02), 70_000));
        assert!(bundle.entries().iter().filter_map(BundleEntry::transaction).all(|tx| tx.gas_price == GWEI * U256::from(32)));
    }

    #[test]
    fn test_build_is_deterministic() {
        let transactions = payload();
        let plan = plan(&transactions);
        let first = BundleBuilder::build(&transactions, SPONSOR, EXECUTOR, &plan).unwrap();
        let second = BundleBuilder::build(&transactions, SPONSOR, EXECUTOR, &plan).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_payload_is_refused() {
        let result = BundleBuilder::build(&[], SPONSOR, EXECUTOR, &plan(&[]));
        assert!(matches!(result, Err(BundleError::EmptyWork)));
    }

    #[test]
    fn test_self_funding_is_rejected() {
        let transactions = payload();
        let result = BundleBuilder::build(&transactions, EXECUTOR, EXECUTOR, &plan(&transactions));
        assert!(matches!(result, Err(BundleError::Configuration(_))));
    }

    #[test]
    fn test_plan_mismatch_is_rejected() {
        let transactions = payload();
        let result = BundleBuilder::build(&transactions, SPONSOR, EXECUTOR, &plan(&transactions[..1]));
        assert!(matches!(result, Err(BundleError::Configuration(_))));
    }

    #[test]
    fn test_presigned_entries_are_appended() {
        let transactions = payload();
        let raw = Bytes::from(vec![0xf8, 0x6b]);
        let bundle = BundleBuilder::build_with_presigned(
            &transactions,
            std::slice::from_ref(&raw),
            SPONSOR,
            EXECUTOR,
            &plan(&transactions),
        )
        .unwrap();

        assert_eq!(bundle.len(), 4);
        assert_eq!(bundle.entries()[3], BundleEntry::Raw(raw));
        assert_eq!(bundle.entries()[3].signer(), None);
    }
}

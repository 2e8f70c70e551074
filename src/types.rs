use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

/// A transaction as produced by a strategy, before pricing and signing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub to: Address,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default)]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

impl UnsignedTransaction {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, data: Some(data.into()), ..Default::default() }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Identity expected to authorize a bundle entry.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[strum(serialize_all = "lowercase")]
pub enum SignerRole {
    Sponsor,
    Executor,
}

/// A transaction with the bundle-wide gas price and its gas limit attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub gas_price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleEntry {
    Signable { transaction: PricedTransaction, signer: SignerRole },
    Raw(Bytes),
}

impl BundleEntry {
    pub fn signer(&self) -> Option<SignerRole> {
        match self {
            Self::Signable { signer, .. } => Some(*signer),
            Self::Raw(_) => None,
        }
    }

    pub fn transaction(&self) -> Option<&PricedTransaction> {
        match self {
            Self::Signable { transaction, .. } => Some(transaction),
            Self::Raw(_) => None,
        }
    }
}

/// Ordered bundle entries: funding transfer first, then payload in strategy order.
///
/// Only the builder constructs bundles; there is no way to edit one afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    entries: Vec<BundleEntry>,
}

impl Bundle {
    pub(crate) fn from_entries(entries: Vec<BundleEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn funding(&self) -> Option<&PricedTransaction> {
        self.entries.first().and_then(BundleEntry::transaction)
    }
}

/// Gas budget for one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPlan {
    /// Uniform price applied to every entry (priority premium + base fee)
    pub gas_price: U256,
    /// Estimated gas limit per payload transaction, in strategy order
    pub gas_limits: Vec<u64>,
    /// Sum of `gas_limits`
    pub total_gas: u64,
}

impl GasPlan {
    /// Wei the sponsor must send so the executor can pay for every payload transaction.
    pub fn funding_value(&self) -> U256 {
        U256::from(self.total_gas) * self.gas_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    /// Sender and nonce, unknown for entries that arrived pre-signed
    pub origin: Option<(Address, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBundle {
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBundle {
    pub fn raw_transactions(&self) -> Vec<String> {
        self.transactions.iter().map(|tx| format!("0x{}", hex::encode(&tx.raw))).collect()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &B256> {
        self.transactions.iter().map(|tx| &tx.hash)
    }

    /// Lowest nonce each sender uses in the bundle.
    pub fn lowest_nonces(&self) -> BTreeMap<Address, u64> {
        let mut nonces = BTreeMap::new();
        for (sender, nonce) in self.transactions.iter().filter_map(|tx| tx.origin) {
            nonces
                .entry(sender)
                .and_modify(|lowest: &mut u64| *lowest = (*lowest).min(nonce))
                .or_insert(nonce);
        }
        nonces
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// coinbase payment divided by gas used; informational only
    pub effective_gas_price: U256,
    pub total_gas_used: u64,
    pub coinbase_diff: U256,
}

/// Relay verdict for a bundle at its target block.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum SubmissionResolution {
    Included,
    BlockPassedWithoutInclusion,
    NonceTooHigh,
}

impl SubmissionResolution {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::BlockPassedWithoutInclusion)
    }
}

/// How a full build/simulate/submit cycle ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Included { block: u64 },
    NonceTooHigh { block: u64 },
    NothingToDo,
}

impl CycleOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Included { .. } | Self::NothingToDo => 0,
            Self::NonceTooHigh { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(origin: Option<(Address, u64)>, byte: u8) -> SignedTransaction {
        SignedTransaction { raw: Bytes::from(vec![byte]), hash: B256::repeat_byte(byte), origin }
    }

    #[test]
    fn test_lowest_nonces_per_sender() {
        let sponsor = Address::repeat_byte(0x01);
        let executor = Address::repeat_byte(0x02);
        let bundle = SignedBundle {
            transactions: vec![
                signed(Some((sponsor, 9)), 1),
                signed(Some((executor, 4)), 2),
                signed(Some((executor, 5)), 3),
                signed(None, 4),
            ],
        };

        let nonces = bundle.lowest_nonces();
        assert_eq!(nonces.len(), 2);
        assert_eq!(nonces[&sponsor], 9);
        assert_eq!(nonces[&executor], 4);
        assert_eq!(bundle.raw_transactions()[3], "0x04");
    }

    #[test]
    fn test_funding_value_is_exact() {
        let plan = GasPlan {
            gas_price: U256::from(32_000_000_000u64),
            gas_limits: vec![50_000, 70_000],
            total_gas: 120_000,
        };
        assert_eq!(plan.funding_value(), U256::from(3_840_000_000_000_000u64));
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(CycleOutcome::Included { block: 1 }.exit_code(), 0);
        assert_eq!(CycleOutcome::NothingToDo.exit_code(), 0);
        assert_eq!(CycleOutcome::NonceTooHigh { block: 1 }.exit_code(), 1);
        assert!(SubmissionResolution::Included.is_terminal());
        assert!(SubmissionResolution::NonceTooHigh.is_terminal());
        assert!(!SubmissionResolution::BlockPassedWithoutInclusion.is_terminal());
    }

    #[test]
    fn test_unsigned_transaction_from_toml() {
        let tx: UnsignedTransaction = toml::from_str(
            r#"
            to = "0x0000000000000000000000000000000000000042"
            data = "0x095ea7b3"
            gas_limit = 60000
            "#,
        )
        .unwrap();
        assert_eq!(tx.to, Address::with_last_byte(0x42));
        assert_eq!(tx.gas_limit, Some(60_000));
        assert_eq!(tx.value, None);
        assert_eq!(tx.data.unwrap().len(), 4);
    }
}

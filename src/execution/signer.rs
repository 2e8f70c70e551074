use crate::chain::{BlockTag, ChainClient};
use crate::config::RescueConfig;
use crate::errors::BundleError;
use crate::types::{Bundle, BundleEntry, PricedTransaction, SignedBundle, SignedTransaction, SignerRole};
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use tracing::debug;

/// The two accounts that authorize bundle entries
#[derive(Debug, Clone)]
pub struct Identities {
    pub sponsor: PrivateKeySigner,
    pub executor: PrivateKeySigner,
}

impl Identities {
    pub fn new(sponsor: PrivateKeySigner, executor: PrivateKeySigner) -> Self {
        Self { sponsor, executor }
    }

    pub fn from_config(config: &RescueConfig) -> Self {
        Self::new(config.sponsor_key.clone(), config.executor_key.clone())
    }

    pub fn signer(&self, role: SignerRole) -> &PrivateKeySigner {
        match role {
            SignerRole::Sponsor => &self.sponsor,
            SignerRole::Executor => &self.executor,
        }
    }

    pub fn address(&self, role: SignerRole) -> Address {
        self.signer(role).address()
    }
}

/// Next nonce to hand out for each identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartingNonces {
    pub sponsor: u64,
    pub executor: u64,
}

impl StartingNonces {
    fn take(&mut self, role: SignerRole) -> u64 {
        let slot = match role {
            SignerRole::Sponsor => &mut self.sponsor,
            SignerRole::Executor => &mut self.executor,
        };
        let nonce = *slot;
        *slot += 1;
        nonce
    }
}

/// Signs every entry of `bundle` with chain id and mined (`latest`) nonces read from the node.
///
/// Mempool transactions are ignored: a bundle must not leave a nonce gap behind a
/// pending transaction that may never be mined.
pub async fn sign_bundle<C: ChainClient + ?Sized>(
    chain: &C,
    identities: &Identities,
    bundle: &Bundle,
) -> Result<SignedBundle, BundleError> {
    let chain_id = chain.chain_id().await?;
    let nonces = StartingNonces {
        sponsor: chain.transaction_count(identities.address(SignerRole::Sponsor), BlockTag::Latest).await?,
        executor: chain.transaction_count(identities.address(SignerRole::Executor), BlockTag::Latest).await?,
    };
    debug!(chain_id, sponsor_nonce = nonces.sponsor, executor_nonce = nonces.executor, "Signing bundle");

    sign_with_nonces(identities, bundle, chain_id, nonces)
}

/// Nonces are assigned in bundle order, one sequence per signer.
pub fn sign_with_nonces(
    identities: &Identities,
    bundle: &Bundle,
    chain_id: u64,
    mut nonces: StartingNonces,
) -> Result<SignedBundle, BundleError> {
    let transactions = bundle
        .entries()
        .iter()
        .map(|entry| match entry {
            BundleEntry::Signable { transaction, signer } => {
                let nonce = nonces.take(*signer);
                sign_legacy(identities.signer(*signer), transaction, chain_id, nonce)
            }
            BundleEntry::Raw(raw) => Ok(SignedTransaction { raw: raw.clone(), hash: keccak256(raw), origin: None }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SignedBundle { transactions })
}

fn sign_legacy(
    signer: &PrivateKeySigner,
    transaction: &PricedTransaction,
    chain_id: u64,
    nonce: u64,
) -> Result<SignedTransaction, BundleError> {
    let gas_price = u128::try_from(transaction.gas_price)
        .map_err(|_| BundleError::Signing(format!("gas price {} does not fit a legacy transaction", transaction.gas_price)))?;

    let tx = TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price,
        gas_limit: transaction.gas_limit,
        to: TxKind::Call(transaction.to),
        value: transaction.value,
        input: transaction.data.clone(),
    };

    let signature = signer.sign_hash_sync(&tx.signature_hash())?;
    let envelope = TxEnvelope::from(tx.into_signed(signature));
    let raw = Bytes::from(envelope.encoded_2718());

    Ok(SignedTransaction { hash: keccak256(&raw), raw, origin: Some((signer.address(), nonce)) })
}

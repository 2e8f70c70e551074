use super::Strategy;
use super::abi::{IERC20, IERC721, IERC1155, IOwnable};
use crate::chain::ChainClient;
use crate::types::UnsignedTransaction;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Top-level layout of the strategy TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StrategyFile {
    pub strategy: StrategyConfig,
}

/// Recovery scenario selected by configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// `setApprovalForAll(recipient, true)` on every listed ERC-721 collection
    Approval721 { contracts: Vec<Address> },
    /// `transferFrom(executor, recipient, id)` for every listed token id
    TransferErc721 { contract: Address, token_ids: Vec<U256> },
    /// One `safeBatchTransferFrom` moving every listed id/amount pair
    TransferErc1155 { contract: Address, token_ids: Vec<U256>, amounts: Vec<U256> },
    /// `transfer(recipient, balance)` sweeping the executor's whole ERC-20 balance
    TransferErc20 { token: Address },
    /// `transferOwnership(recipient)` on an ownable contract
    TransferOwnership { contract: Address },
    /// Transactions prepared elsewhere, forwarded as-is
    Prepared {
        transactions: Vec<UnsignedTransaction>,
        #[serde(default)]
        description: Option<String>,
    },
}

/// Strategy moving assets from the executor to the recipient.
///
/// The chain is only read, for balances that must be known before the bundle is built.
#[derive(Clone)]
pub struct RescueStrategy {
    config: StrategyConfig,
    executor: Address,
    recipient: Address,
    chain: Arc<dyn ChainClient>,
}

impl RescueStrategy {
    pub fn new(
        config: StrategyConfig,
        executor: Address,
        recipient: Address,
        chain: Arc<dyn ChainClient>,
    ) -> Result<Self> {
        if let StrategyConfig::TransferErc1155 { token_ids, amounts, .. } = &config {
            if token_ids.len() != amounts.len() {
                return Err(eyre!(
                    "ERC-1155 transfer lists {} token ids but {} amounts",
                    token_ids.len(),
                    amounts.len()
                ));
            }
        }

        Ok(Self { config, executor, recipient, chain })
    }

    async fn erc20_balance(&self, token: Address) -> Result<U256> {
        let call = IERC20::balanceOfCall { account: self.executor };
        let output = self
            .chain
            .call(token, call.abi_encode().into())
            .await
            .wrap_err_with(|| format!("balanceOf({}) on {}", self.executor, token))?;
        IERC20::balanceOfCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("malformed balanceOf result from {}: {}", token, e))
    }
}

#[async_trait]
impl Strategy for RescueStrategy {
    async fn sponsored_transactions(&self) -> Result<Vec<UnsignedTransaction>> {
        let transactions = match &self.config {
            StrategyConfig::Approval721 { contracts } => contracts
                .iter()
                .map(|contract| {
                    let call = IERC721::setApprovalForAllCall { operator: self.recipient, approved: true };
                    UnsignedTransaction::call(*contract, call.abi_encode())
                })
                .collect(),
            StrategyConfig::TransferErc721 { contract, token_ids } => token_ids
                .iter()
                .map(|token_id| {
                    let call = IERC721::transferFromCall {
                        from: self.executor,
                        to: self.recipient,
                        tokenId: *token_id,
                    };
                    UnsignedTransaction::call(*contract, call.abi_encode())
                })
                .collect(),
            StrategyConfig::TransferErc1155 { token_ids, .. } if token_ids.is_empty() => Vec::new(),
            StrategyConfig::TransferErc1155 { contract, token_ids, amounts } => {
                let call = IERC1155::safeBatchTransferFromCall {
                    from: self.executor,
                    to: self.recipient,
                    ids: token_ids.clone(),
                    amounts: amounts.clone(),
                    data: Bytes::new(),
                };
                vec![UnsignedTransaction::call(*contract, call.abi_encode())]
            }
            StrategyConfig::TransferErc20 { token } => {
                let balance = self.erc20_balance(*token).await?;
                debug!(%token, %balance, "ERC-20 balance of executor");
                if balance.is_zero() {
                    Vec::new()
                } else {
                    let call = IERC20::transferCall { to: self.recipient, amount: balance };
                    vec![UnsignedTransaction::call(*token, call.abi_encode())]
                }
            }
            StrategyConfig::TransferOwnership { contract } => {
                let call = IOwnable::transferOwnershipCall { newOwner: self.recipient };
                vec![UnsignedTransaction::call(*contract, call.abi_encode())]
            }
            StrategyConfig::Prepared { transactions, .. } => transactions.clone(),
        };

        Ok(transactions)
    }

    async fn description(&self) -> String {
        match &self.config {
            StrategyConfig::Approval721 { contracts } => format!(
                "Giving {} approval for all tokens in {} ERC-721 contract(s) held by {}",
                self.recipient,
                contracts.len(),
                self.executor
            ),
            StrategyConfig::TransferErc721 { contract, token_ids } => format!(
                "Transferring {} ERC-721 token(s) of {} from {} to {}",
                token_ids.len(),
                contract,
                self.executor,
                self.recipient
            ),
            StrategyConfig::TransferErc1155 { contract, token_ids, .. } => format!(
                "Transferring {} ERC-1155 token id(s) of {} from {} to {}",
                token_ids.len(),
                contract,
                self.executor,
                self.recipient
            ),
            StrategyConfig::TransferErc20 { token } => format!(
                "Transferring the full ERC-20 balance of {} in {} to {}",
                self.executor, token, self.recipient
            ),
            StrategyConfig::TransferOwnership { contract } => format!(
                "Transferring ownership of {} from {} to {}",
                contract, self.executor, self.recipient
            ),
            StrategyConfig::Prepared { transactions, description } => description
                .clone()
                .unwrap_or_else(|| format!("Submitting {} prepared transaction(s)", transactions.len())),
        }
    }
}

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::models::{ChainTransaction, OutPoint, SignedTransaction, UnspentOutput, WalletInfo};
use crate::infrastructure::chain::error::ChainClientError;

/// Operations the processor needs from the custodial wallet node
#[async_trait]
pub trait ChainNode: Send + Sync + std::fmt::Debug {
    /// Get the provider name for identification
    fn provider_name(&self) -> String;

    /// Every output the wallet still considers unspent, including unconfirmed ones
    async fn list_unspent(&self) -> Result<Vec<UnspentOutput>, ChainClientError>;

    /// Wallet view of a single transaction
    async fn get_transaction(&self, txid: &str) -> Result<ChainTransaction, ChainClientError>;

    /// Build an unsigned transaction, returning its hex encoding
    async fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &BTreeMap<String, Decimal>,
    ) -> Result<String, ChainClientError>;

    async fn sign_raw_transaction(&self, hex: &str) -> Result<SignedTransaction, ChainClientError>;

    /// Broadcast a signed transaction, returning its txid
    async fn send_raw_transaction(&self, hex: &str) -> Result<String, ChainClientError>;

    /// Unlock the wallet for `unlock_secs` seconds
    async fn wallet_passphrase(&self, passphrase: &str, unlock_secs: u64)
        -> Result<(), ChainClientError>;

    async fn get_info(&self) -> Result<WalletInfo, ChainClientError>;

    async fn key_pool_refill(&self) -> Result<(), ChainClientError>;
}

use rust_decimal::Decimal;
use serde::Deserialize;

/// Wallet view of a transaction as returned by `gettransaction`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainTransaction {
    /// Negative when the transaction conflicts with the best chain
    pub confirmations: i64,
    #[serde(default)]
    pub details: Vec<TransactionDetail>,
}

impl ChainTransaction {
    /// Only received funds matter for deposits
    pub fn receive_details(&self) -> impl Iterator<Item = &TransactionDetail> {
        self.details.iter().filter(|d| d.category == "receive")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionDetail {
    #[serde(default)]
    pub address: Option<String>,
    pub category: String,
    pub amount: Decimal,
    #[serde(default)]
    pub vout: Option<u32>,
}

/// Subset of `getinfo` the processor relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WalletInfo {
    pub keypoolsize: u32,
}

/// Result of `signrawtransaction`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedTransaction {
    pub hex: String,
    /// False when the wallet could not sign every input
    pub complete: bool,
}

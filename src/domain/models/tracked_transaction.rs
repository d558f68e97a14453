use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reconciliation state of a tracked chain output.
///
/// Rows only move forward through `Unconfirmed -> Confirmed -> Credited -> Spent`.
/// `Error` is absorbing and reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Unconfirmed,
    Confirmed,
    Credited,
    Spent,
    Error,
}

impl TransactionState {
    pub const ALL: [TransactionState; 5] = [
        TransactionState::Unconfirmed,
        TransactionState::Confirmed,
        TransactionState::Credited,
        TransactionState::Spent,
        TransactionState::Error,
    ];

    /// Name stored in the `state` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Unconfirmed => "unconfirmed",
            TransactionState::Confirmed => "confirmed",
            TransactionState::Credited => "credited",
            TransactionState::Spent => "spent",
            TransactionState::Error => "error",
        }
    }

    /// The single state that may follow this one in the normal lifecycle
    pub fn successor(&self) -> Option<TransactionState> {
        match self {
            TransactionState::Unconfirmed => Some(TransactionState::Confirmed),
            TransactionState::Confirmed => Some(TransactionState::Credited),
            TransactionState::Credited => Some(TransactionState::Spent),
            TransactionState::Spent | TransactionState::Error => None,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle order
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        if *self == TransactionState::Error {
            return false;
        }
        next == TransactionState::Error || self.successor() == Some(next)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown transaction state: {}", s))
    }
}

/// A transaction output reference, as passed to `createrawtransaction`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Unique identity of a tracked output: deposit address plus outpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey {
    pub public_address: String,
    pub txid: String,
    pub vout: u32,
}

impl OutputKey {
    pub fn new(public_address: impl Into<String>, txid: impl Into<String>, vout: u32) -> Self {
        Self {
            public_address: public_address.into(),
            txid: txid.into(),
            vout,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.public_address, self.txid, self.vout)
    }
}

/// A chain output tracked in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTransaction {
    /// Deposit address the output pays to
    pub public_address: String,
    /// Transaction ID
    pub txid: String,
    /// Output index within the transaction
    pub vout: u32,
    /// Amount in whole coins
    pub amount: Decimal,
    /// Confirmations last observed on the node
    pub confirmations: u32,
    pub state: TransactionState,
    /// Sweep transaction that consumed this output
    pub spent_txid: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedTransaction {
    pub fn key(&self) -> OutputKey {
        OutputKey::new(self.public_address.clone(), self.txid.clone(), self.vout)
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }
}

//! The ledger contract the processor and the cashout job are written against.
//!
//! Every state change goes through one named, atomic procedure. Callers never
//! combine statements into ad hoc transactions, so a crash cannot leave a row
//! half-transitioned.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::models::{OutputKey, TrackedTransaction, TransactionState, UnspentOutput};
use crate::infrastructure::persistence::error::DbError;

/// Result of registering a newly observed output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The (address, txid, vout) triple already had a row; nothing changed
    AlreadyTracked,
}

#[async_trait]
pub trait LedgerStore: Send + Sync + std::fmt::Debug {
    /// Insert an `unconfirmed` row unless the triple is already tracked
    async fn insert_new(&self, output: &UnspentOutput) -> Result<InsertOutcome, DbError>;

    /// `unconfirmed -> confirmed`, recording the latest confirmation count
    async fn confirm(&self, key: &OutputKey, confirmations: u32) -> Result<(), DbError>;

    /// `confirmed -> credited`, adding `amount * multiplier` to the owning account
    async fn credit(&self, key: &OutputKey, multiplier: Decimal) -> Result<(), DbError>;

    /// `credited -> spent`, recording the sweep transaction
    async fn spend(&self, key: &OutputKey, spent_txid: &str) -> Result<(), DbError>;

    async fn find_by_state(&self, state: TransactionState) -> Result<Vec<TrackedTransaction>, DbError>;

    /// Rows for any of `txids`; an empty slice returns nothing without querying
    async fn find_by_txids(&self, txids: &[String]) -> Result<Vec<TrackedTransaction>, DbError>;
}

/// Text status returned by the stored procedures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureStatus {
    Applied,
    Duplicate,
    StateConflict,
    Rejected,
}

impl FromStr for ProcedureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applied" => Ok(ProcedureStatus::Applied),
            "duplicate" => Ok(ProcedureStatus::Duplicate),
            "state_conflict" => Ok(ProcedureStatus::StateConflict),
            "rejected" => Ok(ProcedureStatus::Rejected),
            other => Err(format!("unknown procedure status: {}", other)),
        }
    }
}

impl ProcedureStatus {
    /// Maps a transition procedure's status onto the caller's result
    pub fn into_transition_result(
        self,
        procedure: &'static str,
        key: &OutputKey,
        expected: TransactionState,
    ) -> Result<(), DbError> {
        match self {
            ProcedureStatus::Applied => Ok(()),
            ProcedureStatus::StateConflict | ProcedureStatus::Duplicate => {
                Err(DbError::StateConflict {
                    procedure,
                    key: key.to_string(),
                    expected,
                })
            }
            ProcedureStatus::Rejected => Err(DbError::Rejected {
                procedure,
                key: key.to_string(),
            }),
        }
    }
}

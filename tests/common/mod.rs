//! In-memory ledger and wallet node used by the integration tests.
//!
//! `MemoryLedgerStore` enforces the same transition rules as the stored
//! procedures so tests observe the statuses the Postgres store would return.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use dogetunnel_processor::application::processor::RetryHandler;
use dogetunnel_processor::config::RetryConfig;
use dogetunnel_processor::domain::models::{
    ChainTransaction, OutPoint, OutputKey, SignedTransaction, TrackedTransaction, TransactionState,
    UnspentOutput, WalletInfo,
};
use dogetunnel_processor::infrastructure::chain::{ChainClientError, ChainNode, RPC_WALLET_ALREADY_UNLOCKED};
use dogetunnel_processor::infrastructure::persistence::{DbError, InsertOutcome, LedgerStore, ProcedureStatus};

pub const PASSPHRASE: &str = "such secret";

/// Retries without waiting so failing tests stay fast
pub fn fast_retry() -> RetryHandler {
    RetryHandler::new(RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
    })
}

pub fn unspent(address: &str, txid: &str, vout: u32, amount: Decimal, confirmations: u32) -> UnspentOutput {
    UnspentOutput {
        address: address.to_string(),
        txid: txid.to_string(),
        vout,
        amount,
        confirmations,
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    rows: Vec<TrackedTransaction>,
    balances: HashMap<String, Decimal>,
    failing_inserts: HashSet<OutputKey>,
    failing_confirms: HashMap<OutputKey, u32>,
    failing_credits: HashMap<OutputKey, u32>,
    failing_spends: HashMap<OutputKey, u32>,
    conflicting_spends: HashSet<OutputKey>,
    spend_attempts: HashMap<OutputKey, u32>,
    txid_queries: usize,
    transitions: Vec<(OutputKey, TransactionState, TransactionState)>,
}

/// Consumes one forced failure for `key`, if any remain
fn take_failure(failures: &mut HashMap<OutputKey, u32>, key: &OutputKey, what: &str) -> Result<(), DbError> {
    match failures.get_mut(key) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            Err(DbError::ConnectionError(format!("{} refused", what)))
        }
        _ => Ok(()),
    }
}

impl LedgerInner {
    fn position(&self, key: &OutputKey) -> Option<usize> {
        self.rows.iter().position(|row| &row.key() == key)
    }

    fn transition(
        &mut self,
        key: &OutputKey,
        expected: TransactionState,
        apply: impl FnOnce(&mut TrackedTransaction),
    ) -> ProcedureStatus {
        let Some(index) = self.position(key) else {
            return ProcedureStatus::StateConflict;
        };
        let row = &mut self.rows[index];
        if row.state != expected {
            return ProcedureStatus::StateConflict;
        }
        let before = row.state;
        apply(row);
        row.updated_at = Utc::now();
        let after = row.state;
        self.transitions.push((key.clone(), before, after));
        ProcedureStatus::Applied
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<Mutex<LedgerInner>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_account(&self, address: &str) {
        self.inner
            .lock()
            .unwrap()
            .balances
            .insert(address.to_string(), Decimal::ZERO);
    }

    pub fn balance(&self, address: &str) -> Option<Decimal> {
        self.inner.lock().unwrap().balances.get(address).copied()
    }

    /// Seeds a row directly, bypassing the procedures
    pub fn seed(&self, row: TrackedTransaction) {
        self.inner.lock().unwrap().rows.push(row);
    }

    pub fn rows(&self) -> Vec<TrackedTransaction> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn row(&self, key: &OutputKey) -> Option<TrackedTransaction> {
        let inner = self.inner.lock().unwrap();
        inner.position(key).map(|i| inner.rows[i].clone())
    }

    pub fn state_of(&self, key: &OutputKey) -> Option<TransactionState> {
        self.row(key).map(|row| row.state)
    }

    /// Every insert of `key` fails until cleared
    pub fn fail_insert(&self, key: OutputKey) {
        self.inner.lock().unwrap().failing_inserts.insert(key);
    }

    pub fn clear_insert_failures(&self) {
        self.inner.lock().unwrap().failing_inserts.clear();
    }

    /// The next `times` confirms of `key` fail with a connection error
    pub fn fail_confirm(&self, key: OutputKey, times: u32) {
        self.inner.lock().unwrap().failing_confirms.insert(key, times);
    }

    /// The next `times` credits of `key` fail with a connection error
    pub fn fail_credit(&self, key: OutputKey, times: u32) {
        self.inner.lock().unwrap().failing_credits.insert(key, times);
    }

    /// The next `times` spends of `key` fail with a connection error
    pub fn fail_spend(&self, key: OutputKey, times: u32) {
        self.inner.lock().unwrap().failing_spends.insert(key, times);
    }

    /// Every spend of `key` reports the row as not `credited`
    pub fn conflict_spend(&self, key: OutputKey) {
        self.inner.lock().unwrap().conflicting_spends.insert(key);
    }

    pub fn spend_attempts(&self, key: &OutputKey) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .spend_attempts
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn txid_queries(&self) -> usize {
        self.inner.lock().unwrap().txid_queries
    }

    pub fn transitions(&self) -> Vec<(OutputKey, TransactionState, TransactionState)> {
        self.inner.lock().unwrap().transitions.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_new(&self, output: &UnspentOutput) -> Result<InsertOutcome, DbError> {
        let mut inner = self.inner.lock().unwrap();
        let key = output.key();
        if inner.failing_inserts.contains(&key) {
            return Err(DbError::ConnectionError("insert refused".to_string()));
        }
        if inner.position(&key).is_some() {
            return Ok(InsertOutcome::AlreadyTracked);
        }
        inner.rows.push(TrackedTransaction {
            public_address: output.address.clone(),
            txid: output.txid.clone(),
            vout: output.vout,
            amount: output.amount,
            confirmations: output.confirmations,
            state: TransactionState::Unconfirmed,
            spent_txid: None,
            updated_at: Utc::now(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn confirm(&self, key: &OutputKey, confirmations: u32) -> Result<(), DbError> {
        let mut inner = self.inner.lock().unwrap();
        take_failure(&mut inner.failing_confirms, key, "confirm")?;
        inner
            .transition(key, TransactionState::Unconfirmed, |row| {
                row.confirmations = confirmations;
                row.state = TransactionState::Confirmed;
            })
            .into_transition_result("transaction_confirm", key, TransactionState::Unconfirmed)
    }

    async fn credit(&self, key: &OutputKey, multiplier: Decimal) -> Result<(), DbError> {
        let mut inner = self.inner.lock().unwrap();
        take_failure(&mut inner.failing_credits, key, "credit")?;
        let status = match inner.position(key) {
            Some(index) if inner.rows[index].state == TransactionState::Confirmed => {
                let address = inner.rows[index].public_address.clone();
                let credit = inner.rows[index].amount * multiplier;
                if inner.balances.contains_key(&address) {
                    if let Some(balance) = inner.balances.get_mut(&address) {
                        *balance += credit;
                    }
                    inner.transition(key, TransactionState::Confirmed, |row| {
                        row.state = TransactionState::Credited;
                    })
                } else {
                    inner.transition(key, TransactionState::Confirmed, |row| {
                        row.state = TransactionState::Error;
                    });
                    ProcedureStatus::Rejected
                }
            }
            _ => ProcedureStatus::StateConflict,
        };
        status.into_transition_result("transaction_credit", key, TransactionState::Confirmed)
    }

    async fn spend(&self, key: &OutputKey, spent_txid: &str) -> Result<(), DbError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.spend_attempts.entry(key.clone()).or_insert(0) += 1;
        take_failure(&mut inner.failing_spends, key, "spend")?;
        if inner.conflicting_spends.contains(key) {
            return ProcedureStatus::StateConflict.into_transition_result(
                "transaction_spend",
                key,
                TransactionState::Credited,
            );
        }
        inner
            .transition(key, TransactionState::Credited, |row| {
                row.state = TransactionState::Spent;
                row.spent_txid = Some(spent_txid.to_string());
            })
            .into_transition_result("transaction_spend", key, TransactionState::Credited)
    }

    async fn find_by_state(&self, state: TransactionState) -> Result<Vec<TrackedTransaction>, DbError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().filter(|row| row.state == state).cloned().collect())
    }

    async fn find_by_txids(&self, txids: &[String]) -> Result<Vec<TrackedTransaction>, DbError> {
        if txids.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.lock().unwrap();
        inner.txid_queries += 1;
        Ok(inner
            .rows
            .iter()
            .filter(|row| txids.contains(&row.txid))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct NodeInner {
    unspent: Vec<UnspentOutput>,
    transactions: HashMap<String, ChainTransaction>,
    list_unspent_failures: u32,
    wallet_unlocked: bool,
    unlocks: Vec<u64>,
    incomplete_signatures: bool,
    raw: HashMap<String, Vec<OutPoint>>,
    created: Vec<(Vec<OutPoint>, BTreeMap<String, Decimal>)>,
    sent: Vec<String>,
    keypoolsize: u32,
    refills: usize,
    gettransaction_calls: Vec<String>,
}

/// Scriptable wallet node
#[derive(Debug, Default, Clone)]
pub struct FakeChainNode {
    inner: Arc<Mutex<NodeInner>>,
}

impl FakeChainNode {
    pub fn new() -> Self {
        let node = Self::default();
        node.inner.lock().unwrap().keypoolsize = 100;
        node
    }

    pub fn set_unspent(&self, unspent: Vec<UnspentOutput>) {
        self.inner.lock().unwrap().unspent = unspent;
    }

    pub fn set_confirmations(&self, txid: &str, vout: u32, confirmations: u32) {
        let mut inner = self.inner.lock().unwrap();
        for output in inner.unspent.iter_mut() {
            if output.txid == txid && output.vout == vout {
                output.confirmations = confirmations;
            }
        }
    }

    pub fn add_transaction(&self, txid: &str, tx: ChainTransaction) {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .insert(txid.to_string(), tx);
    }

    pub fn fail_list_unspent(&self, times: u32) {
        self.inner.lock().unwrap().list_unspent_failures = times;
    }

    /// The wallet reports itself already unlocked on the next unlock
    pub fn mark_unlocked(&self) {
        self.inner.lock().unwrap().wallet_unlocked = true;
    }

    pub fn sign_incompletely(&self) {
        self.inner.lock().unwrap().incomplete_signatures = true;
    }

    pub fn set_keypoolsize(&self, size: u32) {
        self.inner.lock().unwrap().keypoolsize = size;
    }

    pub fn unlocks(&self) -> Vec<u64> {
        self.inner.lock().unwrap().unlocks.clone()
    }

    pub fn created(&self) -> Vec<(Vec<OutPoint>, BTreeMap<String, Decimal>)> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn refills(&self) -> usize {
        self.inner.lock().unwrap().refills
    }

    pub fn gettransaction_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().gettransaction_calls.clone()
    }
}

#[async_trait]
impl ChainNode for FakeChainNode {
    fn provider_name(&self) -> String {
        "fake".to_string()
    }

    async fn list_unspent(&self) -> Result<Vec<UnspentOutput>, ChainClientError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.list_unspent_failures > 0 {
            inner.list_unspent_failures -= 1;
            return Err(ChainClientError::NetworkError("connection refused".to_string()));
        }
        Ok(inner.unspent.clone())
    }

    async fn get_transaction(&self, txid: &str) -> Result<ChainTransaction, ChainClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.gettransaction_calls.push(txid.to_string());
        inner
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| ChainClientError::Rpc {
                code: -5,
                message: "Invalid or non-wallet transaction id".to_string(),
            })
    }

    async fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &BTreeMap<String, Decimal>,
    ) -> Result<String, ChainClientError> {
        let mut inner = self.inner.lock().unwrap();
        let hex = format!("raw{:02x}", inner.created.len());
        inner.raw.insert(hex.clone(), inputs.to_vec());
        inner.created.push((inputs.to_vec(), outputs.clone()));
        Ok(hex)
    }

    async fn sign_raw_transaction(&self, hex: &str) -> Result<SignedTransaction, ChainClientError> {
        let inner = self.inner.lock().unwrap();
        Ok(SignedTransaction {
            hex: hex.to_string(),
            complete: !inner.incomplete_signatures,
        })
    }

    async fn send_raw_transaction(&self, hex: &str) -> Result<String, ChainClientError> {
        let mut inner = self.inner.lock().unwrap();
        let spent = inner.raw.get(hex).cloned().unwrap_or_default();
        inner
            .unspent
            .retain(|o| !spent.contains(&OutPoint::new(o.txid.clone(), o.vout)));
        let txid = format!("sweep{}", inner.sent.len() + 1);
        inner.sent.push(txid.clone());
        Ok(txid)
    }

    async fn wallet_passphrase(&self, passphrase: &str, unlock_secs: u64) -> Result<(), ChainClientError> {
        let mut inner = self.inner.lock().unwrap();
        if passphrase != PASSPHRASE {
            return Err(ChainClientError::Rpc {
                code: -14,
                message: "The wallet passphrase entered was incorrect.".to_string(),
            });
        }
        inner.unlocks.push(unlock_secs);
        if inner.wallet_unlocked {
            return Err(ChainClientError::Rpc {
                code: RPC_WALLET_ALREADY_UNLOCKED,
                message: "Wallet is already unlocked.".to_string(),
            });
        }
        Ok(())
    }

    async fn get_info(&self) -> Result<WalletInfo, ChainClientError> {
        Ok(WalletInfo {
            keypoolsize: self.inner.lock().unwrap().keypoolsize,
        })
    }

    async fn key_pool_refill(&self) -> Result<(), ChainClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.refills += 1;
        inner.keypoolsize = 100;
        Ok(())
    }
}

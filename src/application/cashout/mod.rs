//! Sweeps credited deposits to a cold-storage address in bounded batches.
//!
//! The credited set is fetched once up front. Each batch is built, approved,
//! signed and broadcast on its own; a failing batch leaves its inputs
//! `credited` and does not stop the batches after it. Once a batch is on the
//! chain only bookkeeping remains, so spend records are retried per input and
//! the transaction is never rebroadcast.

mod approval;

pub use approval::{describe_batch, ApprovalGate, AutoApprove, ConfirmMode, TerminalApproval};

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::application::processor::RetryHandler;
use crate::config::CashoutConfig;
use crate::domain::errors::{BatchError, CashoutError};
use crate::domain::models::{OutputKey, TransactionState};
use crate::domain::services::{BatchBuilder, SweepBatch};
use crate::infrastructure::chain::{ChainNode, WalletUnlocker};
use crate::infrastructure::persistence::{DbError, LedgerStore};
use crate::utils::logging;

/// What happened to one batch
#[derive(Debug)]
pub enum BatchOutcome {
    Broadcast {
        number: usize,
        txid: String,
        inputs: usize,
        net: Decimal,
        /// Inputs whose spend could not be recorded after retries
        unrecorded: Vec<OutputKey>,
    },
    /// The operator declined this batch
    Declined { number: usize },
    Failed { number: usize, error: BatchError },
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub outcomes: Vec<BatchOutcome>,
    /// The operator declined the whole run
    pub aborted: bool,
    /// The approval prompt failed part way; batches after it were not attempted
    pub interrupted: Option<std::io::Error>,
}

impl SweepReport {
    pub fn broadcast_txids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                BatchOutcome::Broadcast { txid, .. } => Some(txid.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn failed_batches(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Failed { .. }))
            .count()
    }

    /// Spent on chain but still `credited` in the ledger
    pub fn unrecorded_spends(&self) -> Vec<&OutputKey> {
        self.outcomes
            .iter()
            .flat_map(|o| match o {
                BatchOutcome::Broadcast { unrecorded, .. } => unrecorded.iter().collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// True when the run needs operator attention
    pub fn has_failures(&self) -> bool {
        self.failed_batches() > 0
            || !self.unrecorded_spends().is_empty()
            || self.interrupted.is_some()
    }
}

#[derive(Debug)]
pub struct CashoutBatcher {
    node: Arc<dyn ChainNode>,
    store: Arc<dyn LedgerStore>,
    unlocker: WalletUnlocker,
    approval: Box<dyn ApprovalGate>,
    config: CashoutConfig,
    retry_handler: RetryHandler,
}

impl CashoutBatcher {
    pub fn new(
        node: Arc<dyn ChainNode>,
        store: Arc<dyn LedgerStore>,
        unlocker: WalletUnlocker,
        approval: Box<dyn ApprovalGate>,
        config: CashoutConfig,
    ) -> Self {
        let retry_handler = RetryHandler::new(config.retry);
        Self {
            node,
            store,
            unlocker,
            approval,
            config,
            retry_handler,
        }
    }

    /// Sweeps every row credited at call time to `target_address`, deducting
    /// `fee_per_batch` from each batch
    pub async fn sweep(&self, target_address: &str, fee_per_batch: Decimal) -> Result<SweepReport, CashoutError> {
        let credited = self
            .retry_handler
            .execute_with_retry("query credited transactions", || {
                self.store.find_by_state(TransactionState::Credited)
            })
            .await?;

        let mut report = SweepReport::default();
        if credited.is_empty() {
            logging::log_info("Nothing to sweep");
            return Ok(report);
        }

        let builder = BatchBuilder::new(self.config.max_batch_size, fee_per_batch);
        let chunks = builder.partition(credited);
        logging::log_info(&format!(
            "Sweeping to {} in {} batches",
            target_address,
            chunks.len()
        ));

        let mut batches = Vec::with_capacity(chunks.len());
        for (i, inputs) in chunks.into_iter().enumerate() {
            let number = i + 1;
            match builder.build(number, inputs, target_address) {
                Ok(batch) => batches.push(batch),
                Err(error) => {
                    logging::log_error(&format!("Batch {} not built: {}", number, error));
                    report.outcomes.push(BatchOutcome::Failed { number, error });
                }
            }
        }

        if self.config.confirm_mode == ConfirmMode::Once && !batches.is_empty() {
            if !self.approval.approve(&batches)? {
                logging::log_info("Sweep declined by operator; nothing broadcast");
                report.aborted = true;
                return Ok(report);
            }
        }

        for batch in batches {
            if self.config.confirm_mode == ConfirmMode::PerBatch {
                match self.approval.approve(std::slice::from_ref(&batch)) {
                    Ok(true) => {}
                    Ok(false) => {
                        logging::log_info(&format!("Batch {} declined by operator", batch.number));
                        report.outcomes.push(BatchOutcome::Declined {
                            number: batch.number,
                        });
                        continue;
                    }
                    Err(e) => {
                        logging::log_error(&format!(
                            "Approval for batch {} failed: {}. Stopping the run",
                            batch.number, e
                        ));
                        report.interrupted = Some(e);
                        break;
                    }
                }
            }

            let outcome = match self.broadcast(&batch).await {
                Ok(txid) => {
                    let unrecorded = self.record_spends(&batch, &txid).await;
                    BatchOutcome::Broadcast {
                        number: batch.number,
                        txid,
                        inputs: batch.inputs.len(),
                        net: batch.net,
                        unrecorded,
                    }
                }
                Err(error) => {
                    if error.is_fatal() {
                        logging::log_error(&format!(
                            "Batch {} cannot be swept until the wallet is fixed: {}",
                            batch.number, error
                        ));
                    } else {
                        logging::log_error(&format!("Batch {} failed: {}", batch.number, error));
                    }
                    BatchOutcome::Failed {
                        number: batch.number,
                        error,
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    /// Unlock, build, sign and send. Nothing here touches the ledger.
    async fn broadcast(&self, batch: &SweepBatch) -> Result<String, BatchError> {
        logging::log_debug(&describe_batch(batch));
        self.unlocker.unlock(self.config.unlock_secs).await?;

        let unsigned = self
            .node
            .create_raw_transaction(&batch.outpoints(), &batch.outputs())
            .await?;
        let signed = self.node.sign_raw_transaction(&unsigned).await?;
        if !signed.complete {
            return Err(BatchError::IncompleteSignature);
        }

        let txid = self.node.send_raw_transaction(&signed.hex).await?;
        logging::log_info(&format!(
            "Batch {} broadcast as {}: {} inputs, {} to {}",
            batch.number,
            txid,
            batch.inputs.len(),
            batch.net,
            batch.target_address
        ));
        Ok(txid)
    }

    /// Marks each input spent by `txid`, returning the ones that could not be recorded
    async fn record_spends(&self, batch: &SweepBatch, txid: &str) -> Vec<OutputKey> {
        let mut unrecorded = Vec::new();

        for input in &batch.inputs {
            let key = input.key();
            let result = self
                .retry_handler
                .execute_with_retry_if(
                    "transaction_spend",
                    || self.store.spend(&key, txid),
                    |e: &DbError| !e.is_row_local(),
                )
                .await;

            if let Err(e) = result {
                logging::log_error(&format!(
                    "{} was swept in {} but could not be marked spent: {}",
                    key, txid, e
                ));
                unrecorded.push(key);
            }
        }

        unrecorded
    }
}

//! Brings the ledger in line with the wallet's unspent-output set.
//!
//! Each cycle takes one snapshot from the node. Outputs the ledger has not
//! seen are inserted as `unconfirmed`, then `unconfirmed` rows whose output
//! has reached the confirmation threshold are promoted to `confirmed`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::processor::retry_handler::RetryHandler;
use crate::config::ReconcilerConfig;
use crate::domain::errors::ProcessorError;
use crate::domain::models::{OutputKey, TrackedTransaction, TransactionState, UnspentSnapshot};
use crate::infrastructure::chain::ChainNode;
use crate::infrastructure::persistence::{InsertOutcome, LedgerStore};
use crate::utils::logging;

/// Counts for one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Outputs in the snapshot
    pub observed: usize,
    pub inserted: usize,
    /// Untracked by our diff but the store already had the triple
    pub already_tracked: usize,
    /// Inserts that failed; these outputs are retried next cycle
    pub failed: usize,
}

/// Counts for one promotion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionReport {
    pub promoted: usize,
    /// Present in the snapshot but still below the threshold
    pub pending: usize,
    /// Absent from the snapshot; left `unconfirmed`
    pub missing: usize,
    /// The store refused the transition for a row-local reason
    pub anomalies: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    node: Arc<dyn ChainNode>,
    store: Arc<dyn LedgerStore>,
    config: ReconcilerConfig,
    retry_handler: RetryHandler,
}

impl Reconciler {
    pub fn new(
        node: Arc<dyn ChainNode>,
        store: Arc<dyn LedgerStore>,
        config: ReconcilerConfig,
        retry_handler: RetryHandler,
    ) -> Self {
        Self {
            node,
            store,
            config,
            retry_handler,
        }
    }

    pub fn required_confirmations(&self) -> u32 {
        self.config.required_confirmations
    }

    /// Fetches the unspent set and registers every output the ledger does not
    /// yet track. Returns the snapshot so promotion can run against the same view.
    pub async fn reconcile_unspent(&self) -> Result<(UnspentSnapshot, DiscoveryReport), ProcessorError> {
        let entries = self
            .retry_handler
            .execute_with_retry("listunspent", || self.node.list_unspent())
            .await?;
        let snapshot = UnspentSnapshot::new(entries);

        let mut report = DiscoveryReport {
            observed: snapshot.len(),
            ..DiscoveryReport::default()
        };
        if snapshot.is_empty() {
            logging::log_debug("Wallet reports no unspent outputs");
            return Ok((snapshot, report));
        }

        let txids = snapshot.txids();
        let rows = self
            .retry_handler
            .execute_with_retry("query tracked transactions by txid", || {
                self.store.find_by_txids(&txids)
            })
            .await?;

        let (known, spent) = partition_known(rows);

        for output in snapshot.untracked(&known) {
            let key = output.key();
            if spent.contains(&key) {
                logging::log_warning(&format!(
                    "Output {} is marked spent but the wallet still lists it as unspent",
                    key
                ));
            }

            match self.store.insert_new(output).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                    logging::log_info(&format!(
                        "New deposit {}: {} with {} confirmations",
                        key, output.amount, output.confirmations
                    ));
                }
                Ok(InsertOutcome::AlreadyTracked) => {
                    report.already_tracked += 1;
                    logging::log_debug(&format!("Output {} already tracked", key));
                }
                Err(e) => {
                    report.failed += 1;
                    logging::log_error(&format!(
                        "Failed to record deposit {}: {}. Will retry next cycle",
                        key, e
                    ));
                }
            }
        }

        Ok((snapshot, report))
    }

    /// Promotes `unconfirmed` rows whose output has reached the threshold in `snapshot`
    pub async fn promote_confirmed(&self, snapshot: &UnspentSnapshot) -> Result<PromotionReport, ProcessorError> {
        let unconfirmed = self
            .retry_handler
            .execute_with_retry("query unconfirmed transactions", || {
                self.store.find_by_state(TransactionState::Unconfirmed)
            })
            .await?;

        let mut report = PromotionReport::default();

        for row in &unconfirmed {
            let key = row.key();
            let Some(output) = snapshot.find_outpoint(&row.txid, row.vout) else {
                report.missing += 1;
                self.report_missing(row).await;
                continue;
            };

            if output.confirmations < self.config.required_confirmations {
                report.pending += 1;
                logging::log_debug(&format!(
                    "{} has {}/{} confirmations",
                    key, output.confirmations, self.config.required_confirmations
                ));
                continue;
            }

            match self.store.confirm(&key, output.confirmations).await {
                Ok(()) => {
                    report.promoted += 1;
                    logging::log_info(&format!(
                        "Confirmed {} with {} confirmations",
                        key, output.confirmations
                    ));
                }
                Err(e) if e.is_row_local() => {
                    report.anomalies += 1;
                    logging::log_warning(&format!("Confirmation anomaly: {}", e));
                }
                Err(e) => {
                    report.failed += 1;
                    logging::log_error(&format!(
                        "Failed to confirm {}: {}. Will retry next cycle",
                        key, e
                    ));
                }
            }
        }

        Ok(report)
    }

    /// Logs what the node currently knows about an output that vanished from
    /// the unspent set. Never changes the row.
    async fn report_missing(&self, row: &TrackedTransaction) {
        let key = row.key();
        match self.node.get_transaction(&row.txid).await {
            Ok(tx) => {
                let receives: Vec<String> = tx
                    .receive_details()
                    .map(|d| {
                        format!(
                            "{} -> {}",
                            d.address.as_deref().unwrap_or("?"),
                            d.amount
                        )
                    })
                    .collect();
                logging::log_warning(&format!(
                    "Unconfirmed output {} is not in the unspent set; node reports {} confirmations, receives [{}]",
                    key,
                    tx.confirmations,
                    receives.join(", ")
                ));
            }
            Err(e) => {
                logging::log_warning(&format!(
                    "Unconfirmed output {} is not in the unspent set and gettransaction failed: {}",
                    key, e
                ));
            }
        }
    }
}

/// Splits stored rows into keys that count as tracked and keys already swept
fn partition_known(rows: Vec<TrackedTransaction>) -> (HashSet<OutputKey>, HashSet<OutputKey>) {
    let mut known = HashSet::new();
    let mut spent = HashSet::new();
    for row in rows {
        if row.state == TransactionState::Spent {
            spent.insert(row.key());
        } else {
            known.insert(row.key());
        }
    }
    (known, spent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn row(txid: &str, state: TransactionState) -> TrackedTransaction {
        TrackedTransaction {
            public_address: "DAddr1".to_string(),
            txid: txid.to_string(),
            vout: 0,
            amount: Decimal::from(20),
            confirmations: 3,
            state,
            spent_txid: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn spent_rows_do_not_count_as_known() {
        let (known, spent) = partition_known(vec![
            row("a", TransactionState::Unconfirmed),
            row("b", TransactionState::Spent),
            row("c", TransactionState::Error),
        ]);

        assert_eq!(known.len(), 2);
        assert!(known.contains(&OutputKey::new("DAddr1", "c", 0)));
        assert!(spent.contains(&OutputKey::new("DAddr1", "b", 0)));
    }
}

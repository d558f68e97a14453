use std::sync::Arc;

use crate::application::processor::retry_handler::RetryHandler;
use crate::config::CreditConfig;
use crate::domain::errors::ProcessorError;
use crate::domain::models::TransactionState;
use crate::infrastructure::persistence::{DbError, LedgerStore};
use crate::utils::logging;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreditReport {
    pub credited: usize,
    /// No account owns the address; the row was moved to `error`
    pub rejected: usize,
    pub anomalies: usize,
    pub failed: usize,
}

/// Turns `confirmed` deposits into account balance, one atomic procedure per row
#[derive(Debug, Clone)]
pub struct CreditIssuer {
    store: Arc<dyn LedgerStore>,
    config: CreditConfig,
    retry_handler: RetryHandler,
}

impl CreditIssuer {
    pub fn new(store: Arc<dyn LedgerStore>, config: CreditConfig, retry_handler: RetryHandler) -> Self {
        Self {
            store,
            config,
            retry_handler,
        }
    }

    /// Credits every row that is `confirmed` at the start of the call
    pub async fn issue_credits(&self) -> Result<CreditReport, ProcessorError> {
        let confirmed = self
            .retry_handler
            .execute_with_retry("query confirmed transactions", || {
                self.store.find_by_state(TransactionState::Confirmed)
            })
            .await?;

        let mut report = CreditReport::default();

        for row in &confirmed {
            let key = row.key();
            match self.store.credit(&key, self.config.multiplier).await {
                Ok(()) => {
                    report.credited += 1;
                    logging::log_info(&format!(
                        "Credited {} with {} units for {}",
                        row.public_address,
                        row.amount * self.config.multiplier,
                        key
                    ));
                }
                Err(e @ DbError::Rejected { .. }) => {
                    report.rejected += 1;
                    logging::log_warning(&format!(
                        "Deposit to {} has no owning account: {}",
                        row.public_address, e
                    ));
                }
                Err(e) if e.is_row_local() => {
                    report.anomalies += 1;
                    logging::log_warning(&format!("Credit anomaly: {}", e));
                }
                Err(e) => {
                    report.failed += 1;
                    logging::log_error(&format!(
                        "Failed to credit {}: {}. Will retry next cycle",
                        key, e
                    ));
                }
            }
        }

        Ok(report)
    }
}

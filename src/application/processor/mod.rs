mod credit_issuer;
mod key_pool_monitor;
mod reconciler;
mod retry_handler;

pub use credit_issuer::{CreditIssuer, CreditReport};
pub use key_pool_monitor::KeyPoolMonitor;
pub use reconciler::{DiscoveryReport, PromotionReport, Reconciler};
pub use retry_handler::RetryHandler;

use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

use crate::domain::errors::ProcessorError;
use crate::utils::logging;

/// What one poll cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub discovery: DiscoveryReport,
    pub promotion: PromotionReport,
    pub credit: CreditReport,
}

/// Drives discovery, promotion and crediting on a fixed period
#[derive(Debug)]
pub struct PaymentProcessor {
    reconciler: Reconciler,
    credit_issuer: CreditIssuer,
    poll_period: Duration,
}

impl PaymentProcessor {
    pub fn new(reconciler: Reconciler, credit_issuer: CreditIssuer, poll_period: Duration) -> Self {
        Self {
            reconciler,
            credit_issuer,
            poll_period,
        }
    }

    /// One full cycle. Insertion always precedes promotion, and crediting sees
    /// whatever promotion just confirmed.
    pub async fn run_cycle(&self) -> Result<CycleReport, ProcessorError> {
        let (snapshot, discovery) = self.reconciler.reconcile_unspent().await?;
        let promotion = self.reconciler.promote_confirmed(&snapshot).await?;
        let credit = self.credit_issuer.issue_credits().await?;

        let report = CycleReport {
            discovery,
            promotion,
            credit,
        };
        logging::log_info(&format!(
            "Cycle done: {} unspent, {} new, {} confirmed, {} pending, {} missing, {} credited",
            discovery.observed,
            discovery.inserted,
            promotion.promoted,
            promotion.pending,
            promotion.missing,
            credit.credited
        ));

        let failures = discovery.failed + promotion.failed + credit.failed;
        if failures > 0 {
            logging::log_warning(&format!(
                "{} row operations failed this cycle and will be retried",
                failures
            ));
        }

        Ok(report)
    }

    /// Runs cycles until `shutdown` flips to true. A cycle that fails after its
    /// retries are exhausted ends the loop with that error.
    pub async fn start_processing(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ProcessorError> {
        logging::log_info(&format!(
            "Starting payment processor: poll every {}s, {} confirmations required",
            self.poll_period.as_secs(),
            self.reconciler.required_confirmations()
        ));

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await?;

            tokio::select! {
                _ = time::sleep(self.poll_period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        logging::log_info("Payment processor stopped");
        Ok(())
    }
}

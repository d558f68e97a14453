use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

use crate::config::KeyPoolConfig;
use crate::infrastructure::chain::{ChainClientError, ChainNode, WalletUnlocker};
use crate::utils::logging;

/// Keeps the wallet's pre-generated key pool topped up so new deposit
/// addresses never block on a locked wallet
#[derive(Debug, Clone)]
pub struct KeyPoolMonitor {
    node: Arc<dyn ChainNode>,
    unlocker: WalletUnlocker,
    config: KeyPoolConfig,
}

impl KeyPoolMonitor {
    pub fn new(node: Arc<dyn ChainNode>, unlocker: WalletUnlocker, config: KeyPoolConfig) -> Self {
        Self {
            node,
            unlocker,
            config,
        }
    }

    /// Refills the pool if it is below the threshold. Returns whether a refill ran.
    pub async fn check_once(&self) -> Result<bool, ChainClientError> {
        let info = self.node.get_info().await?;
        if info.keypoolsize >= self.config.threshold {
            logging::log_debug(&format!("Key pool size {}", info.keypoolsize));
            return Ok(false);
        }

        logging::log_info(&format!(
            "Key pool size {} below {}, refilling",
            info.keypoolsize, self.config.threshold
        ));
        self.unlocker.unlock(self.config.unlock_secs).await?;
        self.node.key_pool_refill().await?;
        logging::log_info("Key pool refilled");
        Ok(true)
    }

    /// Checks every period until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.period_secs.max(1));

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.check_once().await {
                logging::log_error(&format!("Key pool check failed: {}", e));
            }

            tokio::select! {
                _ = time::sleep(period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        logging::log_info("Key pool monitor stopped");
    }
}

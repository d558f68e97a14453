use log::{debug, info};
use std::fmt;
use std::io;
use std::sync::Arc;

use super::error::{ChainClientError, RPC_WALLET_ALREADY_UNLOCKED};
use super::provider::ChainNode;

/// Opens the wallet for short, explicit windows.
///
/// The node relocks on its own once the window passes, so signing keys are
/// only reachable while a refill or sweep is in progress.
#[derive(Clone)]
pub struct WalletUnlocker {
    node: Arc<dyn ChainNode>,
    passphrase: String,
}

impl fmt::Debug for WalletUnlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletUnlocker")
            .field("node", &self.node.provider_name())
            .finish_non_exhaustive()
    }
}

impl WalletUnlocker {
    pub fn new(node: Arc<dyn ChainNode>, passphrase: impl Into<String>) -> Self {
        Self {
            node,
            passphrase: passphrase.into(),
        }
    }

    /// Unlock for `unlock_secs`; an already-unlocked wallet counts as success
    pub async fn unlock(&self, unlock_secs: u64) -> Result<(), ChainClientError> {
        match self.node.wallet_passphrase(&self.passphrase, unlock_secs).await {
            Ok(()) => {
                debug!("Wallet unlocked for {}s", unlock_secs);
                Ok(())
            }
            Err(e) if e.rpc_code() == Some(RPC_WALLET_ALREADY_UNLOCKED) => {
                info!("Wallet was already unlocked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Uses the configured passphrase, or asks for it on the terminal without echo
pub fn resolve_passphrase(configured: Option<String>) -> io::Result<String> {
    match configured {
        Some(passphrase) if !passphrase.is_empty() => Ok(passphrase),
        _ => rpassword::prompt_password("Wallet passphrase: "),
    }
}

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

use dogetunnel_processor::application::processor::{
    CreditIssuer, KeyPoolMonitor, PaymentProcessor, Reconciler, RetryHandler,
};
use dogetunnel_processor::config::AppConfig;
use dogetunnel_processor::infrastructure::chain::{
    resolve_passphrase, ChainNode, DogecoinNodeProvider, WalletUnlocker,
};
use dogetunnel_processor::infrastructure::persistence::{DbPool, LedgerStore, TrackedTransactionRepository};
use dogetunnel_processor::utils::logging;

/// Seconds the wallet is unlocked at startup to verify the passphrase
const STARTUP_UNLOCK_SECS: u64 = 1;

/// Watches the custodial wallet for deposits and credits them to accounts
#[derive(Parser, Debug)]
#[command(name = "dogetunnel-processor", version)]
struct Cli {
    /// Seconds between reconciliation cycles
    #[arg(long)]
    poll_period: Option<u64>,

    /// Confirmations required before a deposit is credited
    #[arg(long)]
    confirmations: Option<u32>,

    /// Refill the key pool when it holds fewer keys than this
    #[arg(long)]
    keypool_threshold: Option<u32>,

    /// Seconds the wallet stays unlocked for a key pool refill
    #[arg(long)]
    keypool_unlock: Option<u64>,

    /// Wallet node RPC port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Wallet node RPC user
    #[arg(long)]
    rpc_user: Option<String>,

    /// Wallet node RPC password
    #[arg(long)]
    rpc_password: Option<String>,

    /// Wallet passphrase; prompted for when neither this nor the environment sets it
    #[arg(long)]
    passphrase: Option<String>,

    /// Postgres connection string
    #[arg(long)]
    database_url: Option<String>,

    /// Do not run the key pool monitor
    #[arg(long)]
    no_keypool_monitor: bool,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(secs) = self.poll_period {
            config.processor.poll_period_secs = secs;
        }
        if let Some(n) = self.confirmations {
            config.processor.reconciler.required_confirmations = n;
        }
        if let Some(n) = self.keypool_threshold {
            config.key_pool.threshold = n;
        }
        if let Some(secs) = self.keypool_unlock {
            config.key_pool.unlock_secs = secs;
        }
        if let Some(port) = self.rpc_port {
            config.chain.port = port;
        }
        if let Some(user) = self.rpc_user {
            config.chain.username = user;
        }
        if let Some(password) = self.rpc_password {
            config.chain.password = password;
        }
        if let Some(passphrase) = self.passphrase {
            config.chain.wallet_passphrase = Some(passphrase);
        }
        if let Some(url) = self.database_url {
            config.database.url = url;
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init_logger();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        logging::log_error(&format!("Payment processor exited: {:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let run_key_pool_monitor = !cli.no_keypool_monitor;
    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);

    logging::log_chain_connection_details(
        &config.chain.host,
        config.chain.port,
        &config.chain.username,
    );
    let node: Arc<dyn ChainNode> = Arc::new(DogecoinNodeProvider::new(&config.chain)?);

    let passphrase = resolve_passphrase(config.chain.wallet_passphrase.clone())
        .context("could not read wallet passphrase")?;
    let unlocker = WalletUnlocker::new(node.clone(), passphrase);
    unlocker
        .unlock(STARTUP_UNLOCK_SECS)
        .await
        .context("wallet unlock check failed")?;
    logging::log_info("Wallet passphrase verified");

    let db_pool = DbPool::new(&config.database).await?;
    let store: Arc<dyn LedgerStore> =
        Arc::new(TrackedTransactionRepository::new(db_pool.get_connection().clone()));

    let retry_handler = RetryHandler::new(config.processor.retry);
    let reconciler = Reconciler::new(
        node.clone(),
        store.clone(),
        config.processor.reconciler,
        retry_handler.clone(),
    );
    let credit_issuer = CreditIssuer::new(store, config.processor.credit, retry_handler);
    let processor = PaymentProcessor::new(reconciler, credit_issuer, config.processor.poll_period());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_info("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                logging::log_error(&format!("Cannot listen for ctrl-c: {}", e));
                std::future::pending::<()>().await;
            }
        }
    });

    let monitor = if run_key_pool_monitor {
        let monitor = KeyPoolMonitor::new(node, unlocker, config.key_pool);
        Some(tokio::spawn(monitor.run(shutdown_rx.clone())))
    } else {
        None
    };

    processor.start_processing(shutdown_rx).await?;

    if let Some(handle) = monitor {
        handle.await.context("key pool monitor panicked")?;
    }

    Ok(())
}

use anyhow::Context;
use clap::Parser;
use rust_decimal::Decimal;
use std::sync::Arc;

use dogetunnel_processor::application::cashout::{
    ApprovalGate, AutoApprove, CashoutBatcher, ConfirmMode, SweepReport, TerminalApproval,
};
use dogetunnel_processor::config::AppConfig;
use dogetunnel_processor::infrastructure::chain::{
    resolve_passphrase, ChainNode, DogecoinNodeProvider, WalletUnlocker,
};
use dogetunnel_processor::infrastructure::persistence::{DbPool, LedgerStore, TrackedTransactionRepository};
use dogetunnel_processor::utils::logging;

/// Sweeps every credited deposit to a cold-storage address
#[derive(Parser, Debug)]
#[command(name = "cashout", version)]
struct Cli {
    /// Address receiving the swept funds
    target_address: String,

    /// Fee deducted from each batch
    #[arg(long)]
    txfee: Option<Decimal>,

    /// When to ask before broadcasting
    #[arg(long, value_enum)]
    confirm_mode: Option<ConfirmMode>,

    /// Broadcast without asking
    #[arg(long, short = 'y')]
    yes: bool,

    /// Maximum inputs per sweep transaction
    #[arg(long)]
    max_batch_size: Option<usize>,

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
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.rpc_port {
            config.chain.port = port;
        }
        if let Some(user) = &self.rpc_user {
            config.chain.username = user.clone();
        }
        if let Some(password) = &self.rpc_password {
            config.chain.password = password.clone();
        }
        if let Some(passphrase) = &self.passphrase {
            config.chain.wallet_passphrase = Some(passphrase.clone());
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(size) = self.max_batch_size {
            config.cashout.max_batch_size = size;
        }
        if let Some(fee) = self.txfee {
            config.cashout.fee_per_batch = fee;
        }
        if let Some(mode) = self.confirm_mode {
            config.cashout.confirm_mode = mode;
        }
        if self.yes {
            config.cashout.confirm_mode = ConfirmMode::Never;
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init_logger();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) if report.has_failures() => {
            logging::log_error(&format!(
                "Cashout finished with {} failed batches and {} unrecorded spends",
                report.failed_batches(),
                report.unrecorded_spends().len()
            ));
            std::process::exit(1);
        }
        Ok(_) => {}
        Err(e) => {
            logging::log_error(&format!("Cashout failed: {:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<SweepReport> {
    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);
    let fee = config.cashout.fee_per_batch;

    logging::log_chain_connection_details(
        &config.chain.host,
        config.chain.port,
        &config.chain.username,
    );
    let node: Arc<dyn ChainNode> = Arc::new(DogecoinNodeProvider::new(&config.chain)?);
    let passphrase = resolve_passphrase(config.chain.wallet_passphrase.clone())
        .context("could not read wallet passphrase")?;
    let unlocker = WalletUnlocker::new(node.clone(), passphrase);

    let db_pool = DbPool::new(&config.database).await?;
    let store: Arc<dyn LedgerStore> =
        Arc::new(TrackedTransactionRepository::new(db_pool.get_connection().clone()));

    let approval: Box<dyn ApprovalGate> = match config.cashout.confirm_mode {
        ConfirmMode::Never => Box::new(AutoApprove),
        ConfirmMode::PerBatch | ConfirmMode::Once => Box::new(TerminalApproval),
    };

    let batcher = CashoutBatcher::new(node, store, unlocker, approval, config.cashout);
    let report = batcher.sweep(&cli.target_address, fee).await?;

    for txid in report.broadcast_txids() {
        println!("{}", txid);
    }
    if report.aborted {
        logging::log_info("Cashout aborted by operator");
    }
    if let Some(e) = &report.interrupted {
        logging::log_error(&format!("Cashout stopped early: approval prompt failed: {}", e));
    }

    Ok(report)
}

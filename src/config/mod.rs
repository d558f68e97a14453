use dotenv::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Raised when an environment variable is present but cannot be parsed
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the Dogecoin wallet node RPC client
#[derive(Clone)]
pub struct ChainConfig {
    /// RPC host
    pub host: String,
    /// RPC port
    pub port: u16,
    /// RPC username
    pub username: String,
    /// RPC password
    pub password: String,
    /// Wallet passphrase; prompted for when absent
    pub wallet_passphrase: Option<String>,
}

impl ChainConfig {
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "wallet_passphrase",
                &self.wallet_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Configuration for the database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
}

/// Bounded retry policy for ledger and node calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Settings for unspent-output ingestion and confirmation promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Confirmations an output needs before it is promoted to `confirmed`
    pub required_confirmations: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            required_confirmations: 2,
        }
    }
}

/// Settings for converting confirmed deposits into account credit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditConfig {
    /// Internal credit units granted per coin deposited
    pub multiplier: Decimal,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            multiplier: Decimal::from(1000),
        }
    }
}

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Seconds between reconciliation cycles
    pub poll_period_secs: u64,
    pub reconciler: ReconcilerConfig,
    pub credit: CreditConfig,
    pub retry: RetryConfig,
}

impl ProcessorConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_secs)
    }
}

/// Configuration for the wallet key pool monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPoolConfig {
    /// Seconds between key pool size checks
    pub period_secs: u64,
    /// Refill when the pool holds fewer keys than this
    pub threshold: u32,
    /// Seconds the wallet stays unlocked for a refill
    pub unlock_secs: u64,
}

impl Default for KeyPoolConfig {
    fn default() -> Self {
        Self {
            period_secs: 30,
            threshold: 50,
            unlock_secs: 5,
        }
    }
}

/// When the cashout job asks the operator before broadcasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfirmMode {
    /// Ask before every batch
    PerBatch,
    /// Ask once for all batches of the run
    Once,
    /// Never ask
    Never,
}

impl FromStr for ConfirmMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-batch" | "per_batch" | "batch" => Ok(ConfirmMode::PerBatch),
            "once" => Ok(ConfirmMode::Once),
            "never" | "none" => Ok(ConfirmMode::Never),
            other => Err(format!(
                "expected one of per-batch, once, never; got {}",
                other
            )),
        }
    }
}

/// Configuration for the cold-storage sweep
#[derive(Debug, Clone)]
pub struct CashoutConfig {
    /// Maximum inputs per sweep transaction
    pub max_batch_size: usize,
    /// Fee deducted from each batch's output
    pub fee_per_batch: Decimal,
    /// Seconds the wallet stays unlocked while a batch is signed
    pub unlock_secs: u64,
    pub confirm_mode: ConfirmMode,
    pub retry: RetryConfig,
}

impl Default for CashoutConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 64,
            fee_per_batch: Decimal::ONE,
            unlock_secs: 30,
            confirm_mode: ConfirmMode::Once,
            retry: RetryConfig::default(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub database: DatabaseConfig,
    pub processor: ProcessorConfig,
    pub key_pool: KeyPoolConfig,
    pub cashout: CashoutConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ensure .env file is loaded
        dotenv().ok();

        let chain = ChainConfig {
            host: env::var("DOGECOIN_RPC_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_var("DOGECOIN_RPC_PORT", 44556)?,
            username: env::var("DOGECOIN_RPC_USER").unwrap_or_else(|_| "dogetunnel".to_string()),
            password: env::var("DOGECOIN_RPC_PASSWORD")
                .unwrap_or_else(|_| "dogetunnel".to_string()),
            wallet_passphrase: env::var("DOGECOIN_WALLET_PASSPHRASE").ok(),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://dogetunnel@localhost/dogetunnel".to_string()),
        };

        let retry = RetryConfig {
            max_attempts: parse_var("RETRY_MAX_ATTEMPTS", 3)?,
            base_delay_ms: parse_var("RETRY_BASE_DELAY_MS", 500)?,
        };

        let processor = ProcessorConfig {
            poll_period_secs: parse_var("POLL_PERIOD_SECS", 10)?,
            reconciler: ReconcilerConfig {
                required_confirmations: parse_var("REQUIRED_CONFIRMATIONS", 2)?,
            },
            credit: CreditConfig {
                multiplier: parse_var("CREDIT_MULTIPLIER", Decimal::from(1000))?,
            },
            retry,
        };

        let key_pool = KeyPoolConfig {
            period_secs: parse_var("KEY_POOL_PERIOD_SECS", 30)?,
            threshold: parse_var("KEY_POOL_THRESHOLD", 50)?,
            unlock_secs: parse_var("KEY_POOL_UNLOCK_SECS", 5)?,
        };

        let cashout = CashoutConfig {
            max_batch_size: parse_var("CASHOUT_MAX_BATCH_SIZE", 64)?,
            fee_per_batch: parse_var("CASHOUT_FEE", Decimal::ONE)?,
            unlock_secs: parse_var("CASHOUT_UNLOCK_SECS", 30)?,
            confirm_mode: parse_var("CASHOUT_CONFIRM_MODE", ConfirmMode::Once)?,
            retry,
        };

        Ok(Self {
            chain,
            database,
            processor,
            key_pool,
            cashout,
        })
    }
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::ConfigError;
use crate::infrastructure::chain::ChainClientError;
use crate::infrastructure::persistence::error::DbError;

/// Error type for the reconciliation poll loop
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Chain node error: {0}")]
    ChainClient(#[from] ChainClientError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure of a single sweep batch. Other batches of the run are unaffected.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch total {total} does not cover fee {fee}")]
    NonPositiveNet { total: Decimal, fee: Decimal },

    #[error("amount {0} cannot be expressed as an RPC number")]
    UnrepresentableAmount(Decimal),

    #[error("wallet could not sign every input; a key is missing")]
    IncompleteSignature,

    #[error("Chain node error: {0}")]
    ChainClient(#[from] ChainClientError),
}

impl BatchError {
    /// Errors that will recur on retry without operator intervention
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BatchError::IncompleteSignature | BatchError::UnrepresentableAmount(_)
        )
    }
}

/// Error that ends a cashout run before or between batches
#[derive(Debug, Error)]
pub enum CashoutError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Chain node error: {0}")]
    ChainClient(#[from] ChainClientError),

    #[error("approval prompt failed: {0}")]
    Approval(#[from] std::io::Error),
}

use thiserror::Error;

use crate::domain::models::TransactionState;

/// Error type for ledger store operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SeaORM
    #[error("Database error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Query error
    #[error("Query error: {0}")]
    QueryError(String),

    /// A stored row could not be mapped onto the domain model
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// The procedure found no row in the state it requires
    #[error("{procedure} on {key}: row missing or not {expected}")]
    StateConflict {
        procedure: &'static str,
        key: String,
        expected: TransactionState,
    },

    /// The procedure refused the transition and moved the row to `error`
    #[error("{procedure} on {key} rejected; row moved to error")]
    Rejected { procedure: &'static str, key: String },
}

impl DbError {
    /// True for failures caused by the row itself rather than the database being unavailable
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            DbError::StateConflict { .. } | DbError::Rejected { .. } | DbError::InvalidRow(_)
        )
    }
}

pub mod connection;
pub mod entities;
pub mod error;
pub mod ledger_store;
pub mod repositories;

pub use connection::DbPool;
pub use error::DbError;
pub use ledger_store::{InsertOutcome, LedgerStore, ProcedureStatus};
pub use repositories::TrackedTransactionRepository;

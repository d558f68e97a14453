pub mod chain;
pub mod tracked_transaction;
pub mod unspent;

pub use chain::{ChainTransaction, SignedTransaction, TransactionDetail, WalletInfo};
pub use tracked_transaction::{OutPoint, OutputKey, TrackedTransaction, TransactionState};
pub use unspent::{UnspentOutput, UnspentSnapshot};

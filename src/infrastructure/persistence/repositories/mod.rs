pub mod tracked_transaction_repository;

pub use tracked_transaction_repository::TrackedTransactionRepository;

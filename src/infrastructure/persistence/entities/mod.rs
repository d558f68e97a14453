pub mod tracked_transaction;

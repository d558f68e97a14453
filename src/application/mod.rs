pub mod cashout;
pub mod processor;

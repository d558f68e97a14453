use std::fmt;
use std::io::{self, Write};

use crate::domain::services::SweepBatch;

pub use crate::config::ConfirmMode;

/// Operator sign-off before a sweep is broadcast
pub trait ApprovalGate: Send + Sync + fmt::Debug {
    /// Shown the batches about to be broadcast; `Ok(false)` declines them
    fn approve(&self, batches: &[SweepBatch]) -> io::Result<bool>;
}

/// Prints each batch and asks on the terminal. Only a literal `yes` proceeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalApproval;

impl ApprovalGate for TerminalApproval {
    fn approve(&self, batches: &[SweepBatch]) -> io::Result<bool> {
        for batch in batches {
            println!("{}", describe_batch(batch));
        }
        print!("Is this ok? [yes/N]: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(is_approval(&input))
    }
}

/// Only the literal answer `yes` approves
pub fn is_approval(answer: &str) -> bool {
    answer.trim() == "yes"
}

/// Approves everything; used with `--yes` and `ConfirmMode::Never`
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn approve(&self, _batches: &[SweepBatch]) -> io::Result<bool> {
        Ok(true)
    }
}

/// Human-readable summary of one batch
pub fn describe_batch(batch: &SweepBatch) -> String {
    let mut out = format!(
        "Batch {}: {} inputs -> {}\n",
        batch.number,
        batch.inputs.len(),
        batch.target_address
    );
    for input in &batch.inputs {
        out.push_str(&format!(
            "  {}:{} {} ({})\n",
            input.txid, input.vout, input.amount, input.public_address
        ));
    }
    out.push_str(&format!(
        "  total {}  fee {}  net {}",
        batch.total, batch.fee, batch.net
    ));
    out
}

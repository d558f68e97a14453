//! Splits credited outputs into sweep batches and does the fee arithmetic.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::errors::BatchError;
use crate::domain::models::{OutPoint, TrackedTransaction};

/// Smallest unit the node accepts is 1e-8 of a coin
pub const COIN_DECIMALS: u32 = 8;

/// A set of credited outputs swept together in one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepBatch {
    /// Position of the batch within the run, starting at 1
    pub number: usize,
    pub inputs: Vec<TrackedTransaction>,
    pub target_address: String,
    pub total: Decimal,
    pub fee: Decimal,
    /// `total - fee`, always positive
    pub net: Decimal,
}

impl SweepBatch {
    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.inputs.iter().map(|tx| tx.outpoint()).collect()
    }

    /// Single-entry output map paying the net amount to the target
    pub fn outputs(&self) -> BTreeMap<String, Decimal> {
        let mut outputs = BTreeMap::new();
        outputs.insert(self.target_address.clone(), self.net);
        outputs
    }
}

#[derive(Debug, Clone)]
pub struct BatchBuilder {
    max_batch_size: usize,
    fee_per_batch: Decimal,
}

impl BatchBuilder {
    pub fn new(max_batch_size: usize, fee_per_batch: Decimal) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            fee_per_batch,
        }
    }

    /// Chunks `credited` in order; every chunk holds at most `max_batch_size` inputs
    pub fn partition(&self, credited: Vec<TrackedTransaction>) -> Vec<Vec<TrackedTransaction>> {
        credited
            .chunks(self.max_batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Sums the inputs and checks the fee leaves something to send
    pub fn build(
        &self,
        number: usize,
        inputs: Vec<TrackedTransaction>,
        target_address: &str,
    ) -> Result<SweepBatch, BatchError> {
        let total: Decimal = inputs.iter().map(|tx| tx.amount).sum();
        let net = total - self.fee_per_batch;
        if net <= Decimal::ZERO {
            return Err(BatchError::NonPositiveNet {
                total,
                fee: self.fee_per_batch,
            });
        }
        if net.normalize().scale() > COIN_DECIMALS {
            return Err(BatchError::UnrepresentableAmount(net));
        }

        Ok(SweepBatch {
            number,
            inputs,
            target_address: target_address.to_string(),
            total,
            fee: self.fee_per_batch,
            net,
        })
    }
}

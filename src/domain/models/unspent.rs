use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::tracked_transaction::{OutPoint, OutputKey};

/// One entry of the wallet's unspent-output set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub address: String,
    pub txid: String,
    pub vout: u32,
    pub amount: Decimal,
    pub confirmations: u32,
}

impl UnspentOutput {
    pub fn key(&self) -> OutputKey {
        OutputKey::new(self.address.clone(), self.txid.clone(), self.vout)
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }
}

/// Point-in-time view of every output the wallet still considers unspent.
///
/// Indexed by full key for discovery and by outpoint for promotion.
#[derive(Debug, Clone, Default)]
pub struct UnspentSnapshot {
    outputs: Vec<UnspentOutput>,
    by_key: HashMap<OutputKey, usize>,
    by_outpoint: HashMap<OutPoint, usize>,
}

impl UnspentSnapshot {
    /// Builds a snapshot, keeping the first occurrence of any repeated key
    pub fn new(entries: Vec<UnspentOutput>) -> Self {
        let mut snapshot = Self::default();
        for entry in entries {
            let key = entry.key();
            if snapshot.by_key.contains_key(&key) {
                continue;
            }
            let index = snapshot.outputs.len();
            snapshot.by_key.insert(key, index);
            snapshot.by_outpoint.entry(entry.outpoint()).or_insert(index);
            snapshot.outputs.push(entry);
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnspentOutput> {
        self.outputs.iter()
    }

    pub fn get(&self, key: &OutputKey) -> Option<&UnspentOutput> {
        self.by_key.get(key).map(|&i| &self.outputs[i])
    }

    /// Looks an output up by transaction id and index only
    pub fn find_outpoint(&self, txid: &str, vout: u32) -> Option<&UnspentOutput> {
        self.by_outpoint
            .get(&OutPoint::new(txid, vout))
            .map(|&i| &self.outputs[i])
    }

    /// Distinct transaction ids in ascending order
    pub fn txids(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|o| o.txid.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Outputs whose key is not in `known`, in snapshot order
    pub fn untracked<'a>(&'a self, known: &HashSet<OutputKey>) -> Vec<&'a UnspentOutput> {
        self.outputs
            .iter()
            .filter(|o| !known.contains(&o.key()))
            .collect()
    }
}

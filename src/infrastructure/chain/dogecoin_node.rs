//! Dogecoin Core wallet node provider

use async_trait::async_trait;
use bitcoincore_rpc::{Auth, Client, RpcApi};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use super::error::ChainClientError;
use super::provider::ChainNode;
use crate::config::ChainConfig;
use crate::domain::models::{ChainTransaction, OutPoint, SignedTransaction, UnspentOutput, WalletInfo};

/// Raw `listunspent` entry. Outputs to non-standard scripts carry no address.
#[derive(Debug, Deserialize)]
struct ListUnspentEntry {
    txid: String,
    vout: u32,
    #[serde(default)]
    address: Option<String>,
    amount: Decimal,
    confirmations: i64,
}

/// Wallet node provider speaking JSON-RPC through `bitcoincore-rpc`.
///
/// Dogecoin Core keeps the pre-0.17 Bitcoin wallet RPCs (`getinfo`,
/// `signrawtransaction`), so calls go through `RpcApi::call` rather than the
/// typed Bitcoin Core helpers.
#[derive(Debug)]
pub struct DogecoinNodeProvider {
    client: Arc<Client>,
    endpoint: String,
}

impl DogecoinNodeProvider {
    pub fn new(config: &ChainConfig) -> Result<Self, ChainClientError> {
        let endpoint = config.rpc_url();
        let auth = Auth::UserPass(config.username.clone(), config.password.clone());

        let client = Client::new(&endpoint, auth)
            .map_err(|e| ChainClientError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            endpoint,
        })
    }

    async fn call<T>(&self, method: &'static str, args: Vec<Value>) -> Result<T, ChainClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || {
            client
                .call::<T>(method, &args)
                .map_err(ChainClientError::from)
        })
        .await
        .map_err(|e| ChainClientError::NetworkError(e.to_string()))?
    }
}

/// RPC amounts are JSON numbers, not strings. The decimal text is carried
/// into the number as-is so no digit passes through a float.
fn amount_to_json(amount: Decimal) -> Result<Value, ChainClientError> {
    serde_json::Number::from_str(&amount.normalize().to_string())
        .map(Value::Number)
        .map_err(|e| ChainClientError::ParseError(format!("amount {}: {}", amount, e)))
}

fn into_unspent(entries: Vec<ListUnspentEntry>) -> Vec<UnspentOutput> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let Some(address) = entry.address else {
                warn!(
                    "Ignoring unspent output {}:{} without an address",
                    entry.txid, entry.vout
                );
                return None;
            };
            Some(UnspentOutput {
                address,
                txid: entry.txid,
                vout: entry.vout,
                amount: entry.amount,
                confirmations: u32::try_from(entry.confirmations).unwrap_or(0),
            })
        })
        .collect()
}

#[async_trait]
impl ChainNode for DogecoinNodeProvider {
    fn provider_name(&self) -> String {
        format!("Dogecoin Node ({})", self.endpoint)
    }

    async fn list_unspent(&self) -> Result<Vec<UnspentOutput>, ChainClientError> {
        // minconf 0 so deposits are tracked from the moment they reach the mempool
        let entries: Vec<ListUnspentEntry> = self.call("listunspent", vec![json!(0)]).await?;
        Ok(into_unspent(entries))
    }

    async fn get_transaction(&self, txid: &str) -> Result<ChainTransaction, ChainClientError> {
        self.call("gettransaction", vec![json!(txid)]).await
    }

    async fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &BTreeMap<String, Decimal>,
    ) -> Result<String, ChainClientError> {
        let mut output_map = serde_json::Map::new();
        for (address, amount) in outputs {
            output_map.insert(address.clone(), amount_to_json(*amount)?);
        }

        let raw: String = self
            .call(
                "createrawtransaction",
                vec![json!(inputs), Value::Object(output_map)],
            )
            .await?;

        let size = hex::decode(&raw)
            .map_err(|e| ChainClientError::ParseError(format!("createrawtransaction: {}", e)))?
            .len();
        debug!(
            "Created raw transaction with {} inputs ({} bytes)",
            inputs.len(),
            size
        );
        Ok(raw)
    }

    async fn sign_raw_transaction(&self, hex: &str) -> Result<SignedTransaction, ChainClientError> {
        self.call("signrawtransaction", vec![json!(hex)]).await
    }

    async fn send_raw_transaction(&self, hex: &str) -> Result<String, ChainClientError> {
        self.call("sendrawtransaction", vec![json!(hex)]).await
    }

    async fn wallet_passphrase(
        &self,
        passphrase: &str,
        unlock_secs: u64,
    ) -> Result<(), ChainClientError> {
        let _: Value = self
            .call("walletpassphrase", vec![json!(passphrase), json!(unlock_secs)])
            .await?;
        Ok(())
    }

    async fn get_info(&self) -> Result<WalletInfo, ChainClientError> {
        self.call("getinfo", Vec::new()).await
    }

    async fn key_pool_refill(&self) -> Result<(), ChainClientError> {
        let _: Value = self.call("keypoolrefill", Vec::new()).await?;
        Ok(())
    }
}

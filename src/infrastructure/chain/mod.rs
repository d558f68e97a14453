//! Access to the custodial Dogecoin wallet node.

mod dogecoin_node;
mod error;
mod provider;
mod wallet;

pub use dogecoin_node::DogecoinNodeProvider;
pub use error::{ChainClientError, RPC_WALLET_ALREADY_UNLOCKED};
pub use provider::ChainNode;
pub use wallet::{resolve_passphrase, WalletUnlocker};

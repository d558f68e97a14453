use thiserror::Error;

/// JSON-RPC error code returned by `walletpassphrase` when the wallet is already open
pub const RPC_WALLET_ALREADY_UNLOCKED: i32 = -17;

/// Represents errors that can occur in wallet node operations
#[derive(Debug, Error)]
pub enum ChainClientError {
    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// Transport or protocol failure from the RPC client
    #[error("Dogecoin RPC error: {0}")]
    Transport(bitcoincore_rpc::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The blocking RPC task could not be joined
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The node returned something we could not interpret
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ChainClientError {
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            ChainClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<bitcoincore_rpc::Error> for ChainClientError {
    fn from(error: bitcoincore_rpc::Error) -> Self {
        use bitcoincore_rpc::jsonrpc::error::Error as JsonRpcError;

        match error {
            bitcoincore_rpc::Error::JsonRpc(JsonRpcError::Rpc(rpc)) => ChainClientError::Rpc {
                code: rpc.code,
                message: rpc.message,
            },
            other => ChainClientError::Transport(other),
        }
    }
}

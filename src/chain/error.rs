use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Transport-level failure (connection refused, timeout, bad response).
    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    /// The node or wallet answered but refused the call.
    #[error("Call rejected: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChainError {
    /// Whether the same call may succeed if simply repeated later.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::RpcConnection(_))
    }
}

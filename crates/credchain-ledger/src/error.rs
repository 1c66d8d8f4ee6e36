//! Error types for the ledger client.

use ethers::types::U256;
use thiserror::Error;

/// Failure reported by a [`ChainRpc`](crate::rpc::ChainRpc) call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error (execution reverted,
    /// nonce too low, insufficient funds, ...).
    #[error("node rejected request: {0}")]
    Rejected(String),

    /// The node could not be reached or answered garbage.
    #[error("rpc transport error: {0}")]
    Transport(String),
}

/// Result type for raw chain calls.
pub type RpcResult<T> = std::result::Result<T, ChainError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The signing account cannot pay for an attestation.
    #[error("insufficient balance: {balance} wei available, {required} wei required")]
    InsufficientBalance { balance: U256, required: U256 },

    /// The node predicted the attestation would revert; nothing was broadcast.
    #[error("transaction would revert: {0}")]
    TransactionWouldRevert(String),

    /// The attestation was mined with a failed status.
    #[error("attestation reverted in transaction {tx_hash}")]
    AttestationReverted { tx_hash: String },

    /// The attestation was broadcast but no receipt appeared in time.
    /// Whether it lands is unknown.
    #[error("no receipt for transaction {tx_hash} before timeout")]
    ConfirmationTimeout { tx_hash: String },

    /// Network failure or an unusable node response.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The signing key is missing or malformed.
    #[error("invalid signing credentials: {0}")]
    InvalidCredentials(String),

    /// The client configuration is unusable (bad address, bad amount).
    #[error("invalid ledger configuration: {0}")]
    Config(String),

    /// Contract call encoding or decoding failed.
    #[error("contract abi error: {0}")]
    Abi(String),
}

impl From<ChainError> for LedgerError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Rejected(msg) | ChainError::Transport(msg) => LedgerError::Transport(msg),
        }
    }
}

impl From<ethers::abi::AbiError> for LedgerError {
    fn from(err: ethers::abi::AbiError) -> Self {
        LedgerError::Abi(err.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

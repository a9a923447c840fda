//! Error types for the token transfer workflow

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the transfer workflow
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    // RPC / wallet connection errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Wallet connection failed: {0}")]
    WalletConnection(String),

    #[error("Chain id mismatch: expected {expected}, node reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    #[error("No account available from wallet")]
    NoAccount,

    // Contract errors
    #[error("Contract read failed: {0}")]
    ContractRead(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Transaction errors
    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction {0} was dropped from the mempool")]
    TransactionDropped(String),

    #[error("Transaction {0} reverted")]
    TransactionReverted(String),

    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: String, required: String },

    // Workflow errors
    #[error("Unhandled failure in {step}: {message}")]
    UnhandledFailure { step: String, message: String },

    #[error("Workflow stopped")]
    WorkflowClosed,

    #[error("Simulated failure: {0}")]
    Simulated(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

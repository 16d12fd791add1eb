use thiserror::Error;

/// Unified error type for the swap core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("read error: {0}")]
    Read(#[from] ReadError),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] InvalidAmount),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("config error: {0}")]
    Config(String),
}

/// Errors from wallet/session establishment.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("connection rejected: {0}")]
    Rejected(String),
}

/// Errors from read-only ledger queries.
///
/// A failed read means the value is *unknown*, never zero — callers must
/// not fall back to a default amount.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    #[error("rpc failure: {0}")]
    Rpc(String),

    #[error("read timed out: {0}")]
    Timeout(String),

    #[error("no quote available for token {token}")]
    NoQuote { token: String },
}

/// Errors from user-entered amounts. Handled locally; never reaches the
/// transaction layer.
#[derive(Debug, Clone, Error)]
pub enum InvalidAmount {
    #[error("amount is empty")]
    Empty,

    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("negative amount: {0:?}")]
    Negative(String),
}

/// Errors from transaction submission through the external signer.
#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    #[error("rejected by signer: {0}")]
    Rejected(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transaction timed out")]
    Timeout,
}

use bmt_core::BmtError;
use bmt_crypto::SignatureError;
use thiserror::Error;

/// Errors produced by transaction operations.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("signature not found")]
    SignatureNotFound,

    #[error("public key not found")]
    PubkeyNotFound,

    #[error("sender address does not match public key")]
    AddressMismatch,

    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("index error: {0}")]
    Index(#[from] BmtError),
}

pub type TxResult<T> = Result<T, TxError>;

//! Unified error type for Herald.

use thiserror::Error;

/// Every failure a Herald component can report.
///
/// Only [`HeraldError::Fetch`] is meant to end a run early; the other kinds
/// are recorded per item and the batch keeps going.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Source data was unreachable or malformed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The transport rejected or failed to deliver one message.
    #[error("send error: {0}")]
    Send(String),

    /// Appending to the ledger failed.
    #[error("ledger write error: {0}")]
    Write(String),

    /// Loading the ledger failed.
    #[error("ledger read error: {0}")]
    Read(String),

    #[error("config error: {0}")]
    Config(String),

    /// A message could not be rendered (missing recipient, bad address).
    #[error("template error: {0}")]
    Template(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HeraldError>;

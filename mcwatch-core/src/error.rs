use std::time::Duration;

use thiserror::Error;

/// Why a status query did not produce a snapshot.
///
/// Every variant means the same thing to the rest of the system: the server
/// is unreachable for this poll.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("status query io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("status query timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed status response: {0}")]
    Protocol(&'static str),

    #[error("status response is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("server address is empty")]
    Empty,

    #[error("invalid port in server address: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger file io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("player {0} has never been seen on the server")]
    UnknownPlayer(String),
}

/// Reasons a verification attempt is refused before it starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("player {0} has never been seen on the server")]
    UnknownPlayer(String),

    #[error("player {0} is already linked")]
    AlreadyLinked(String),

    #[error("a verification for {0} is already running")]
    AlreadyInProgress(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

use crate::types::{DataPointId, RequestId};
use std::fmt;
use thiserror::Error;

/// What a `NotFound` lookup was looking for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Missing {
    DataPoint(DataPointId),
    /// A series that has never had a point revealed.
    Series(String),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::DataPoint(id) => write!(f, "data point {id}"),
            Missing::Series(name) => write!(f, "series {name:?}"),
        }
    }
}

/// Failures surfaced by ledger operations.
///
/// Every error is returned before any state is touched: a failed call leaves the ledger exactly
/// as it was.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error("data point {0} already revealed")]
    AlreadyRevealed(DataPointId),

    #[error("series stat request {0} already settled")]
    AlreadySettled(RequestId),

    #[error("a reveal request is already outstanding: request {0}")]
    RevealInFlight(RequestId),

    #[error("unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("request {0} was answered through the wrong callback")]
    CallbackMismatch(RequestId),

    #[error("invalid proof for request {0}")]
    InvalidProof(RequestId),

    /// A series correlation key that does not resolve to a known series.
    #[error("series not found: {0}")]
    SeriesNotFound(String),

    #[error("oracle issued duplicate request id {0}")]
    DuplicateRequestId(RequestId),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("uninitialized ciphertext handle: {0}")]
    UninitializedHandle(&'static str),

    #[error("oracle error: {0}")]
    Oracle(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

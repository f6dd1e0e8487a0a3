//! Error kinds, named by effect rather than by type, matching the
//! propagation policy: errors on the initiating side are returned to the
//! caller; errors on the receive side are logged and recorded as
//! `Rejected` where appropriate.

use ribochain_types::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("argument error: {0}")]
    Argument(#[from] ArgError),

    #[error("hash not found: {0}")]
    HashNotFound(Hash),

    #[error("hash {old} was modified, follow to {new}")]
    HashModified { old: Hash, new: Hash },

    #[error("invalid entry: {0}")]
    ValidationFailed(String),

    #[error("entry type mismatch: expected {expected}, got {actual}")]
    EntryTypeMismatch { expected: String, actual: String },

    #[error("unknown entry type: {0}")]
    UnknownEntryType(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action is not callable directly, it is a reply-only action")]
    NonCallableAction,

    #[error("action does not have a DHT wire message")]
    NonDHTAction,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    #[error("chain error: {0}")]
    Chain(#[from] crate::chain::ChainError),

    #[error("dht error: {0}")]
    Dht(#[from] crate::dht::DhtError),

    #[error("unexpected validation response shape")]
    MalformedValidationResponse,

    #[error("missing validation package section: {0}")]
    MissingPackageSection(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Wrong argument count or wrong shape for a given index; fatal to the
/// call, surfaced verbatim.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgError {
    #[error("expected between {required} and {total} arguments, got {provided}")]
    WrongCount {
        required: usize,
        total: usize,
        provided: usize,
    },

    #[error("argument {index} ('{name}') has the wrong shape")]
    WrongShape { index: usize, name: String },
}

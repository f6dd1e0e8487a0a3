//! Error kinds shared across the type model. Workflow-level errors (chain,
//! DHT, validation) live in `ribochain_core` and compose these via `#[from]`.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed hash: {0}")]
    MalformedHash(String),

    #[error("entry type mismatch: expected {expected}, got {actual}")]
    EntryTypeMismatch { expected: String, actual: String },
}

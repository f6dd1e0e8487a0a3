//! Entry, header, and hash types shared by the ribochain action/validation
//! core. This crate has no knowledge of chains, DHTs, or networking; it is
//! the data model the rest of the workspace operates on.

pub mod agent;
pub mod entry;
pub mod entry_def;
pub mod error;
pub mod hash;
pub mod header;
pub mod links;

pub use agent::{AgentId, LocalSigner, PeerId, Signature, Signer};
pub use entry::{DelEntry, Entry, EntryType};
pub use entry_def::{AnySchema, DataFormat, EntryDef, SchemaValidator, Sharing, ZomeRegistry};
pub use error::TypeError;
pub use hash::{Blake2bBase58, Hash, HashSpec};
pub use header::{Change, ChangeAction, Header};
pub use links::{Link, LinkAction, Links};

//! The ribochain core: local chains, the gossiped DHT, the validation
//! pipeline, the uniform action contract, wire dispatch, and the bootstrap
//! client that ties an agent process to a rendezvous directory.

pub mod action;
pub mod bootstrap;
pub mod chain;
pub mod context;
pub mod dht;
pub mod dispatch;
pub mod error;
pub mod ribosome;
pub mod transport;
pub mod validation;

pub use chain::LocalChain;
pub use context::{Context, RibochainConfig};
pub use error::{CoreError, CoreResult};

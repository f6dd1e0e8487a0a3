//! The explicit context passed into every action invocation, replacing the
//! ambient globals a process-wide logger or config would otherwise reach for.

use crate::dht::{DhtStore, RetryQueue};
use crate::ribosome::RibosomeT;
use crate::transport::{PeerRouterT, TransportT};
use crate::LocalChain;
use ribochain_types::{HashSpec, PeerId, ZomeRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration loaded from the environment.
#[derive(Clone, Debug)]
pub struct RibochainConfig {
    pub bootstrap_url: Option<String>,
    /// `HCBOOTSTRAP_RETURN_ADDR`, overrides the advertised return address
    /// in bootstrap posts.
    pub bootstrap_return_addr: Option<String>,
}

impl RibochainConfig {
    /// Read from the process environment once, at startup.
    pub fn from_env() -> Self {
        Self {
            bootstrap_url: std::env::var("RIBOCHAIN_BOOTSTRAP_URL").ok(),
            bootstrap_return_addr: std::env::var("HCBOOTSTRAP_RETURN_ADDR").ok(),
        }
    }

    pub fn for_test() -> Self {
        Self {
            bootstrap_url: None,
            bootstrap_return_addr: None,
        }
    }
}

/// Everything an action's `Do`/`Receive` needs: chain, DHT store, zome
/// registry and ribosomes, transport, peer routing, and config. One
/// `Context` per running agent process; cheaply clonable (everything inside
/// is already `Arc`).
#[derive(Clone)]
pub struct Context {
    pub self_peer_id: PeerId,
    pub chain: Arc<RwLock<LocalChain>>,
    pub dht: Arc<DhtStore>,
    pub retry_queue: Arc<RetryQueue>,
    pub registry: Arc<ZomeRegistry>,
    pub ribosomes: Arc<HashMap<String, Arc<dyn RibosomeT>>>,
    pub transport: Arc<dyn TransportT>,
    pub router: Arc<dyn PeerRouterT>,
    pub hash_spec: Arc<dyn HashSpec>,
    pub config: RibochainConfig,
}

impl Context {
    pub fn ribosome_for_zome(&self, zome: &str) -> Option<Arc<dyn RibosomeT>> {
        self.ribosomes.get(zome).cloned()
    }
}

//! The wire protocol envelope and the narrow transport/routing interfaces
//! the core consumes. The real peer-to-peer transport and peer store are
//! external collaborators; this module defines the contract they must
//! satisfy and ships an in-memory implementation used by tests and by the
//! end-to-end scenarios.

use async_trait::async_trait;
use ribochain_types::{DelEntry, Entry, EntryType, Hash, Header, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dht::{Status, StatusMask};
use crate::error::{CoreError, CoreResult};
use crate::validation::package::ValidationPackage;

/// Two protocols ride the same transport: user-facing verbs
/// (`ActionProtocol`) and the validation back-channel (`ValidateProtocol`).
/// Both are represented by the same envelope; `kind` distinguishes them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageKind {
    AppMessage,
    PutRequest,
    GetRequest,
    ModRequest,
    DelRequest,
    LinkRequest,
    GetLinkRequest,
    ValidatePutRequest,
    ValidateModRequest,
    ValidateDelRequest,
    ValidateLinkRequest,
    ValidateResponse,
    GetResponse,
    GetLinkResponse,
    Ack,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub from: PeerId,
    pub body: serde_json::Value,
}

impl Message {
    pub fn new(kind: MessageKind, from: PeerId, body: impl Serialize) -> Self {
        Self {
            kind,
            from,
            body: serde_json::to_value(body).expect("message body serialization is infallible"),
        }
    }

    /// Deserialize `self.body` into `T`, failing fast with a structural
    /// mismatch error rather than panicking.
    pub fn body_as<T: for<'de> Deserialize<'de>>(&self) -> CoreResult<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| CoreError::Transport(format!("malformed message body: {e}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppMsgBody {
    pub zome_type: String,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PutRequestBody {
    pub h: Hash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetRequestBody {
    pub h: Hash,
    pub status_mask: u8,
    pub get_mask: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModRequestBody {
    pub h: Hash,
    pub n: Hash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelRequestBody {
    pub h: Hash,
    pub by: Hash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkRequestBody {
    pub base: Hash,
    pub links: Hash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetLinkRequestBody {
    pub base: Hash,
    pub tag: String,
    pub status_mask: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidateRequestBody {
    pub h: Hash,
}

/// The `{Type, Entry, Header, Package}` reply to a `VALIDATE_*_REQUEST`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidateResponseBody {
    pub entry_type: EntryType,
    pub entry: Entry,
    pub header: Header,
    pub package: SerializablePackage,
}

/// `ValidationPackage` carries trait-free data only, so it can derive
/// `Serialize`/`Deserialize` directly; this wrapper exists solely so the
/// wire body and the in-process type can evolve independently.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SerializablePackage {
    pub entry: Option<Entry>,
    pub header: Option<Header>,
    pub headers_of_type: Option<Vec<Header>>,
    pub full_chain: Option<Vec<(Header, Entry)>>,
}

impl From<ValidationPackage> for SerializablePackage {
    fn from(p: ValidationPackage) -> Self {
        Self {
            entry: p.entry,
            header: p.header,
            headers_of_type: p.headers_of_type,
            full_chain: p.full_chain,
        }
    }
}

impl From<SerializablePackage> for ValidationPackage {
    fn from(p: SerializablePackage) -> Self {
        Self {
            entry: p.entry,
            header: p.header,
            headers_of_type: p.headers_of_type,
            full_chain: p.full_chain,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetResponseBody {
    pub entry: Option<Vec<u8>>,
    pub entry_type: Option<EntryType>,
    pub sources: Option<Vec<PeerId>>,
    pub follow_hash: Option<Hash>,
    pub status: Option<StatusWire>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusWire {
    Live,
    Rejected,
    Modified,
    Deleted,
}

impl From<Status> for StatusWire {
    fn from(s: Status) -> Self {
        match s {
            Status::Live => StatusWire::Live,
            Status::Rejected => StatusWire::Rejected,
            Status::Modified => StatusWire::Modified,
            Status::Deleted => StatusWire::Deleted,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkResultWire {
    pub h: Hash,
    pub tag: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetLinkResponseBody {
    pub links: Vec<LinkResultWire>,
}

/// The envelope every receive handler falls back to when it has no
/// dedicated reply shape (or has failed): `ok` lets callers distinguish a
/// genuine acknowledgement from an error carried back as plain text, since
/// the wire protocol has no separate error `MessageKind`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AckBody {
    pub ok: bool,
    pub message: String,
}

impl AckBody {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { ok: true, message: message.into() }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }
}

/// Convenience accessors for the two entry bodies the del-entry path needs.
impl DelRequestBody {
    pub fn into_del_entry(self, message: String) -> DelEntry {
        DelEntry { hash: self.h, message }
    }
}

pub fn status_mask_from_wire(bits: u8) -> StatusMask {
    StatusMask::new(bits)
}

/// The narrow peer-to-peer transport interface the core consumes. A real
/// implementation rides an actual network; `LoopbackTransport` below is an
/// in-process stand-in for tests.
#[async_trait]
pub trait TransportT: Send + Sync {
    /// Send `msg` to `to` and await its reply.
    async fn send(&self, to: &PeerId, msg: Message) -> CoreResult<Message>;

    /// Hand a newly discovered peer's address to the transport's peer
    /// store (used by the bootstrap client).
    async fn peer_add(&self, peer: PeerId, multiaddr: String) -> CoreResult<()>;
}

/// The narrow peer-store interface for resolving which peer is responsible
/// for a given DHT key. A real implementation would consult rendezvous
/// hashing over the live peer set; this crate only needs the contract.
pub trait PeerRouterT: Send + Sync {
    fn owner_of(&self, key: &Hash) -> PeerId;
}

/// Routes every key to one fixed peer. Adequate for the two/three-node
/// fixtures exercised by this crate's tests; a real deployment would shard
/// across the live peer set.
pub struct FixedRouter {
    pub owner: PeerId,
}

impl PeerRouterT for FixedRouter {
    fn owner_of(&self, _key: &Hash) -> PeerId {
        self.owner.clone()
    }
}

/// An inbound message handler a `LoopbackTransport` can dispatch to.
/// Implemented by `ribochain_core::dispatch::MessageDispatcher`.
#[async_trait]
pub trait Inbox: Send + Sync {
    async fn handle(&self, msg: Message) -> Message;
}

/// An in-memory transport connecting however many `Inbox`es are registered
/// with it by peer ID. Used by tests and by the end-to-end scenarios as the
/// "two peers talking" fixture; also records `peer_add` calls so the
/// bootstrap client's behavior can be asserted on directly.
#[derive(Default)]
pub struct LoopbackTransport {
    peers: RwLock<HashMap<PeerId, Arc<dyn Inbox>>>,
    added_peers: RwLock<Vec<(PeerId, String)>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, peer: PeerId, inbox: Arc<dyn Inbox>) {
        self.peers.write().await.insert(peer, inbox);
    }

    pub async fn added_peers(&self) -> Vec<(PeerId, String)> {
        self.added_peers.read().await.clone()
    }
}

#[async_trait]
impl TransportT for LoopbackTransport {
    async fn send(&self, to: &PeerId, msg: Message) -> CoreResult<Message> {
        let inbox = {
            let peers = self.peers.read().await;
            peers
                .get(to)
                .cloned()
                .ok_or_else(|| CoreError::Transport(format!("no route to peer {to}")))?
        };
        Ok(inbox.handle(msg).await)
    }

    async fn peer_add(&self, peer: PeerId, multiaddr: String) -> CoreResult<()> {
        self.added_peers.write().await.push((peer, multiaddr));
        Ok(())
    }
}

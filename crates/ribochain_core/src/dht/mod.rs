//! The DHT store: `Hash -> Record` plus a `Base -> [Link]` secondary index,
//! with the status state machine:
//!
//! ```text
//!             PUT_ok                MOD                DEL
//!   absent ─────────► Live ─────────────► Modified ─────► Deleted
//!      │               │                                   ▲
//!      │               └───────────────── DEL ─────────────┘
//!      │  PUT_invalid
//!      └───────────────► Rejected     (terminal)
//! ```
//!
//! Status transitions for a single hash are serialized through a per-hash
//! lock acquired by `DhtStore::guard`, held only across the read-modify-write
//! of the record; never across a network round trip.

mod retry;

pub use retry::{RetryQueue, RetryReason};

use ribochain_types::{EntryType, Hash, PeerId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Live,
    Rejected,
    Modified,
    Deleted,
}

/// Bitfield over `Status`, used to filter `GET`/`GETLINK` responses.
/// `StatusDefault = Live`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusMask(u8);

impl StatusMask {
    pub const LIVE: u8 = 0b0001;
    pub const REJECTED: u8 = 0b0010;
    pub const MODIFIED: u8 = 0b0100;
    pub const DELETED: u8 = 0b1000;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn default_mask() -> Self {
        Self(Self::LIVE)
    }

    pub fn all() -> Self {
        Self(Self::LIVE | Self::REJECTED | Self::MODIFIED | Self::DELETED)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn matches(&self, status: Status) -> bool {
        let bit = match status {
            Status::Live => Self::LIVE,
            Status::Rejected => Self::REJECTED,
            Status::Modified => Self::MODIFIED,
            Status::Deleted => Self::DELETED,
        };
        self.0 & bit != 0
    }
}

#[derive(Clone, Debug)]
pub struct Record {
    pub entry_type: EntryType,
    pub bytes: Vec<u8>,
    pub sources: HashSet<PeerId>,
    pub status: Status,
    pub follow_hash: Option<Hash>,
}

impl Record {
    fn new(entry_type: EntryType, bytes: Vec<u8>, source: PeerId, status: Status) -> Self {
        let mut sources = HashSet::new();
        sources.insert(source);
        Self {
            entry_type,
            bytes,
            sources,
            status,
            follow_hash: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEntry {
    pub link: Hash,
    pub tag: String,
    pub source: PeerId,
    pub status: Status,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DhtError {
    #[error("no record at hash {0}")]
    NotFound(Hash),
    #[error("cannot transition record {0} from {1:?}, it is terminal")]
    TerminalStatus(Hash, Status),
    #[error("base {0} is not live")]
    BaseNotLive(Hash),
    #[error("entry type {0} is not publicly shareable")]
    NotPublic(String),
}

pub type DhtResult<T> = Result<T, DhtError>;

/// `Hash -> Record` plus the links secondary index, guarded per key.
pub struct DhtStore {
    records: RwLock<HashMap<Hash, Record>>,
    links: RwLock<HashMap<Hash, Vec<LinkEntry>>>,
    locks: RwLock<HashMap<Hash, Arc<Mutex<()>>>>,
}

impl Default for DhtStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DhtStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire the per-hash critical section. Callers must not hold the
    /// returned guard across an `.await` on network I/O.
    async fn guard(&self, hash: &Hash) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(hash) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(hash.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn get(&self, hash: &Hash) -> Option<Record> {
        self.records.read().await.get(hash).cloned()
    }

    /// `PUT` receive: first touch of a hash, status decided by the caller's
    /// validation outcome.
    pub async fn put(&self, hash: Hash, entry_type: EntryType, bytes: Vec<u8>, source: PeerId, status: Status) -> DhtResult<()> {
        let lock = self.guard(&hash).await;
        let _permit = lock.lock().await;
        let mut records = self.records.write().await;
        match records.get_mut(&hash) {
            Some(existing) => {
                existing.sources.insert(source);
            }
            None => {
                records.insert(hash, Record::new(entry_type, bytes, source, status));
            }
        }
        Ok(())
    }

    /// `MOD` receive: transition `old_hash` from `Live` to `Modified`,
    /// pointing `follow_hash` at `new_hash`. Precondition (old record
    /// exists) is the caller's responsibility, surfaced here
    /// as `DhtError::NotFound` so the caller can enqueue a retry.
    pub async fn mod_(&self, old_hash: &Hash, new_hash: Hash, source: PeerId) -> DhtResult<()> {
        let lock = self.guard(old_hash).await;
        let _permit = lock.lock().await;
        let mut records = self.records.write().await;
        let record = records.get_mut(old_hash).ok_or_else(|| DhtError::NotFound(old_hash.clone()))?;
        if matches!(record.status, Status::Rejected | Status::Deleted) {
            return Err(DhtError::TerminalStatus(old_hash.clone(), record.status));
        }
        record.status = Status::Modified;
        record.follow_hash = Some(new_hash);
        record.sources.insert(source);
        Ok(())
    }

    /// `DEL` receive: transition `target` to `Deleted` from either `Live`
    /// or `Modified` (not terminal).
    pub async fn del(&self, target: &Hash, source: PeerId) -> DhtResult<()> {
        let lock = self.guard(target).await;
        let _permit = lock.lock().await;
        let mut records = self.records.write().await;
        let record = records.get_mut(target).ok_or_else(|| DhtError::NotFound(target.clone()))?;
        if matches!(record.status, Status::Rejected | Status::Deleted) {
            return Err(DhtError::TerminalStatus(target.clone(), record.status));
        }
        record.status = Status::Deleted;
        record.sources.insert(source);
        Ok(())
    }

    pub async fn put_link(&self, base: Hash, link: Hash, tag: String, source: PeerId) -> DhtResult<()> {
        let base_status = self
            .get(&base)
            .await
            .map(|r| r.status)
            .ok_or_else(|| DhtError::NotFound(base.clone()))?;
        if base_status != Status::Live {
            return Err(DhtError::BaseNotLive(base));
        }
        let mut links = self.links.write().await;
        let entries = links.entry(base).or_default();
        if let Some(existing) = entries.iter_mut().find(|e| e.link == link && e.tag == tag) {
            existing.status = Status::Live;
            existing.source = source;
        } else {
            entries.push(LinkEntry {
                link,
                tag,
                source,
                status: Status::Live,
            });
        }
        Ok(())
    }

    pub async fn del_link(&self, base: &Hash, link: &Hash, tag: &str, source: PeerId) -> DhtResult<()> {
        let mut links = self.links.write().await;
        let entries = links.entry(base.clone()).or_default();
        if let Some(existing) = entries.iter_mut().find(|e| e.link == *link && e.tag == tag) {
            existing.status = Status::Deleted;
            existing.source = source;
        } else {
            entries.push(LinkEntry {
                link: link.clone(),
                tag: tag.to_string(),
                source,
                status: Status::Deleted,
            });
        }
        Ok(())
    }

    pub async fn get_link(&self, base: &Hash, tag: &str, mask: StatusMask) -> Vec<LinkEntry> {
        self.links
            .read()
            .await
            .get(base)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.tag == tag && mask.matches(e.status))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(n: &str) -> PeerId {
        PeerId(n.to_string())
    }

    fn hash(s: &str) -> Hash {
        Hash::of(s.as_bytes())
    }

    #[tokio::test]
    async fn put_then_mod_then_del_walks_the_state_machine() {
        let store = DhtStore::new();
        let h1 = hash("v1");
        let h2 = hash("v2");
        store
            .put(h1.clone(), EntryType::App("post".into()), b"A".to_vec(), peer("alice"), Status::Live)
            .await
            .unwrap();
        assert_eq!(store.get(&h1).await.unwrap().status, Status::Live);

        store.mod_(&h1, h2.clone(), peer("bob")).await.unwrap();
        let rec = store.get(&h1).await.unwrap();
        assert_eq!(rec.status, Status::Modified);
        assert_eq!(rec.follow_hash, Some(h2.clone()));

        store
            .put(h2.clone(), EntryType::App("post".into()), b"B".to_vec(), peer("alice"), Status::Live)
            .await
            .unwrap();
        store.del(&h2, peer("carol")).await.unwrap();
        assert_eq!(store.get(&h2).await.unwrap().status, Status::Deleted);

        // Modified is not terminal: a further DEL succeeds.
        store.del(&h1, peer("carol")).await.unwrap();
        assert_eq!(store.get(&h1).await.unwrap().status, Status::Deleted);
    }

    #[tokio::test]
    async fn rejected_and_deleted_are_terminal() {
        let store = DhtStore::new();
        let h = hash("bad");
        store
            .put(h.clone(), EntryType::App("post".into()), b"bad".to_vec(), peer("alice"), Status::Rejected)
            .await
            .unwrap();
        let err = store.del(&h, peer("bob")).await.unwrap_err();
        assert!(matches!(err, DhtError::TerminalStatus(_, Status::Rejected)));
    }

    #[tokio::test]
    async fn links_added_then_deleted_are_not_returned_live() {
        let store = DhtStore::new();
        let base = hash("h1");
        let target = hash("h2");
        store
            .put(base.clone(), EntryType::App("post".into()), b"base".to_vec(), peer("alice"), Status::Live)
            .await
            .unwrap();
        store
            .put_link(base.clone(), target.clone(), "likes".into(), peer("alice"))
            .await
            .unwrap();
        assert_eq!(store.get_link(&base, "likes", StatusMask::default_mask()).await.len(), 1);

        store.del_link(&base, &target, "likes", peer("alice")).await.unwrap();
        assert!(store.get_link(&base, "likes", StatusMask::default_mask()).await.is_empty());
    }

    #[tokio::test]
    async fn sources_accumulate_across_touches() {
        let store = DhtStore::new();
        let h = hash("shared");
        store
            .put(h.clone(), EntryType::App("post".into()), b"x".to_vec(), peer("alice"), Status::Live)
            .await
            .unwrap();
        store
            .put(h.clone(), EntryType::App("post".into()), b"x".to_vec(), peer("bob"), Status::Live)
            .await
            .unwrap();
        assert_eq!(store.get(&h).await.unwrap().sources.len(), 2);
    }
}

//! The local chain: an agent's append-only, totally ordered log of
//! `(Header, Entry)` pairs.
//!
//! `LocalChain` owns the only copy of this log and exposes `prepare_header`
//! / `add_entry` as two separate steps so validation can run
//! on a header that has been computed but not yet committed to the chain.

use ribochain_types::{AgentId, Change, Entry, EntryType, Hash, HashSpec, Header, Signer};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChainError {
    #[error("attempted to add entry at index {given}, but chain length is {actual}")]
    IndexMismatch { given: usize, actual: usize },

    #[error("header hash mismatch: prepared {prepared}, recomputed {recomputed}")]
    HashMismatch { prepared: Hash, recomputed: Hash },

    #[error("a header with hash {0} is already present in the chain")]
    DuplicateHeader(Hash),

    #[error("no such entry: {0}")]
    NotFound(Hash),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// The result of `prepare_header`: a header computed and signed, but not
/// yet appended. Carries the index it will land at so `add_entry` can check
/// that nothing else has raced ahead of it.
#[derive(Clone, Debug)]
pub struct PreparedHeader {
    pub index: usize,
    pub header_hash: Hash,
    pub header: Header,
}

pub struct LocalChain {
    agent: AgentId,
    signer: Arc<dyn Signer>,
    hash_spec: Arc<dyn HashSpec>,
    records: Vec<(Header, Entry)>,
    by_header_hash: HashMap<Hash, usize>,
    by_entry_hash: HashMap<Hash, usize>,
    last_of_type: HashMap<EntryType, Hash>,
}

impl LocalChain {
    pub fn new(agent: AgentId, signer: Arc<dyn Signer>, hash_spec: Arc<dyn HashSpec>) -> Self {
        Self {
            agent,
            signer,
            hash_spec,
            records: Vec::new(),
            by_header_hash: HashMap::new(),
            by_entry_hash: HashMap::new(),
            last_of_type: HashMap::new(),
        }
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hash of the most recently appended header, or `None` for an empty
    /// chain (the next header prepared will be the genesis header).
    pub fn head(&self) -> Option<Hash> {
        self.records.last().map(|(h, _)| header_hash(h, &*self.hash_spec))
    }

    /// Compute the entry hash, resolve `HeaderLink`/`TypeLink`, assemble and
    /// sign a header. Does not mutate the chain.
    pub fn prepare_header(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        entry: &Entry,
        change: Option<Change>,
    ) -> PreparedHeader {
        let entry_link = entry.sum(&*self.hash_spec);
        let entry_type = entry.entry_type();
        let header_link = self.head();
        let type_link = self.last_of_type.get(&entry_type).cloned();

        let signable = Header::signable_bytes(&now, &entry_type, &entry_link, &header_link, &type_link, &change);
        let signature = self.signer.sign(&signable);

        let header = Header {
            time: now,
            entry_type,
            entry_link,
            header_link,
            type_link,
            signature,
            change,
        };
        let header_hash = header_hash(&header, &*self.hash_spec);

        PreparedHeader {
            index: self.records.len(),
            header_hash,
            header,
        }
    }

    /// Append a prepared header and its entry. Rejects an out-of-order
    /// index, a header hash that doesn't match recomputation, and a
    /// duplicate header hash.
    pub fn add_entry(&mut self, prepared: PreparedHeader, entry: Entry) -> ChainResult<()> {
        let PreparedHeader {
            index,
            header_hash: expected_hash,
            header,
        } = prepared;

        if index != self.records.len() {
            return Err(ChainError::IndexMismatch {
                given: index,
                actual: self.records.len(),
            });
        }

        let recomputed = header_hash(&header, &*self.hash_spec);
        if recomputed != expected_hash {
            return Err(ChainError::HashMismatch {
                prepared: expected_hash,
                recomputed,
            });
        }

        if self.by_header_hash.contains_key(&recomputed) {
            return Err(ChainError::DuplicateHeader(recomputed));
        }

        let entry_hash = header.entry_link.clone();
        let entry_type = header.entry_type.clone();

        self.last_of_type.insert(entry_type, recomputed.clone());
        self.by_header_hash.insert(recomputed, index);
        self.by_entry_hash.insert(entry_hash, index);
        self.records.push((header, entry));

        Ok(())
    }

    pub fn get_entry(&self, hash: &Hash) -> Option<(Entry, EntryType)> {
        let idx = *self.by_entry_hash.get(hash)?;
        let (header, entry) = &self.records[idx];
        Some((entry.clone(), header.entry_type.clone()))
    }

    /// The header whose `entry_link` is `hash`.
    pub fn get_entry_header(&self, hash: &Hash) -> Option<Header> {
        let idx = *self.by_entry_hash.get(hash)?;
        Some(self.records[idx].0.clone())
    }

    pub fn get_header(&self, header_hash: &Hash) -> Option<Header> {
        let idx = *self.by_header_hash.get(header_hash)?;
        Some(self.records[idx].0.clone())
    }

    /// Headers of a given entry type, most recent first, by walking
    /// `type_link` back from the tail, the positional-index DAG described
    /// in the design notes, not raw pointers.
    pub fn headers_of_type(&self, entry_type: &EntryType) -> Vec<Header> {
        let mut out = Vec::new();
        let mut cursor = self.last_of_type.get(entry_type).cloned();
        while let Some(hash) = cursor {
            let idx = match self.by_header_hash.get(&hash) {
                Some(i) => *i,
                None => break,
            };
            let header = self.records[idx].0.clone();
            cursor = header.type_link.clone();
            out.push(header);
        }
        out
    }

    /// The full `(Header, Entry)` slice from genesis to head, used to build
    /// a `FullChain` validation package section.
    pub fn full_slice(&self) -> &[(Header, Entry)] {
        &self.records
    }
}

pub fn header_hash(header: &Header, hash_spec: &dyn HashSpec) -> Hash {
    hash_spec.hash(&header.canonical_bytes())
}

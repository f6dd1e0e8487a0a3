//! Chain headers: the signed linkage records that bind an entry into an
//! agent's local chain.

use crate::agent::Signature;
use crate::entry::EntryType;
use crate::hash::Hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a header supersedes, and how.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Mod,
    Del,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: ChangeAction,
    pub hash: Hash,
}

/// `{Time, Type, EntryLink, HeaderLink, TypeLink, Signature, Change?}`.
///
/// `HeaderLink` is `None` only for the genesis header. `TypeLink` points at
/// the previous header of the same `Type`, so a chain can be filtered to a
/// single entry type's history without scanning every header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    pub time: DateTime<Utc>,
    pub entry_type: EntryType,
    pub entry_link: Hash,
    pub header_link: Option<Hash>,
    pub type_link: Option<Hash>,
    pub signature: Signature,
    pub change: Option<Change>,
}

/// The fields of a header that go into the signature, i.e. everything but
/// the signature itself.
#[derive(Serialize)]
struct SignableHeader<'a> {
    time: &'a DateTime<Utc>,
    entry_type: &'a EntryType,
    entry_link: &'a Hash,
    header_link: &'a Option<Hash>,
    type_link: &'a Option<Hash>,
    change: &'a Option<Change>,
}

impl Header {
    /// Bytes a signer signs over and a verifier checks against. Excludes the
    /// signature field itself so signing is well-defined.
    pub fn signable_bytes(
        time: &DateTime<Utc>,
        entry_type: &EntryType,
        entry_link: &Hash,
        header_link: &Option<Hash>,
        type_link: &Option<Hash>,
        change: &Option<Change>,
    ) -> Vec<u8> {
        serde_json::to_vec(&SignableHeader {
            time,
            entry_type,
            entry_link,
            header_link,
            type_link,
            change,
        })
        .expect("Header serialization is infallible")
    }

    pub fn to_signable_bytes(&self) -> Vec<u8> {
        Self::signable_bytes(
            &self.time,
            &self.entry_type,
            &self.entry_link,
            &self.header_link,
            &self.type_link,
            &self.change,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.header_link.is_none()
    }

    /// Canonical bytes for computing this header's own content address.
    /// Includes the signature, since two headers with identical fields but
    /// different signers are genuinely distinct records.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Header serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LocalSigner;
    use crate::agent::Signer as _;

    #[test]
    fn genesis_header_has_no_header_link() {
        let signer = LocalSigner::generate("alice");
        let entry_link = Hash::of(b"dna");
        let bytes = Header::signable_bytes(&Utc::now(), &EntryType::Dna, &entry_link, &None, &None, &None);
        let header = Header {
            time: Utc::now(),
            entry_type: EntryType::Dna,
            entry_link,
            header_link: None,
            type_link: None,
            signature: signer.sign(&bytes),
            change: None,
        };
        assert!(header.is_genesis());
    }

    #[test]
    fn signature_verifies_under_agents_key() {
        let signer = LocalSigner::generate("alice");
        let agent = signer.agent_id();
        let entry_link = Hash::of(b"post");
        let time = Utc::now();
        let bytes = Header::signable_bytes(&time, &EntryType::App("post".into()), &entry_link, &None, &None, &None);
        let sig = signer.sign(&bytes);
        assert!(agent.verify(&bytes, &sig));
    }
}

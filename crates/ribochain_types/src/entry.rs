//! Entry content and the type tag that travels alongside it in headers.

use crate::hash::{Hash, HashSpec};
use crate::links::Links;
use serde::{Deserialize, Serialize};

/// The type tag of an entry: either one of the three system types, or an
/// application-defined type named by a `ZomeRegistry` entry.
#[derive(Clone, Debug, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub enum EntryType {
    Dna,
    Agent,
    Key,
    App(String),
}

impl EntryType {
    pub fn app_name(&self) -> Option<&str> {
        match self {
            EntryType::App(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, EntryType::Dna | EntryType::Agent | EntryType::Key)
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Dna => write!(f, "%dna"),
            EntryType::Agent => write!(f, "%agent"),
            EntryType::Key => write!(f, "%key"),
            EntryType::App(name) => write!(f, "{name}"),
        }
    }
}

/// The payload of a deletion record: which hash is being deleted, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelEntry {
    pub hash: Hash,
    pub message: String,
}

/// A typed content-addressed payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Entry {
    /// Opaque application content under a declared entry-type name.
    App { entry_type: String, content: Vec<u8> },
    /// The immutable application definition. Never served over the DHT.
    Dna { placeholder: Vec<u8> },
    /// A committed agent identity.
    Agent { placeholder: Vec<u8> },
    /// A rotated/auxiliary key record.
    Key { placeholder: Vec<u8> },
    /// A batch of link assertions/retractions.
    Links(Links),
    /// The body of a `del` action.
    Deletion(DelEntry),
}

impl Entry {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Entry::App { entry_type, .. } => EntryType::App(entry_type.clone()),
            Entry::Dna { .. } => EntryType::Dna,
            Entry::Agent { .. } => EntryType::Agent,
            Entry::Key { .. } => EntryType::Key,
            // Links and deletion entries carry their own declared app
            // entry-type name via the committing action, not the Entry
            // itself; system-level code only needs to recognize the shape.
            Entry::Links(_) => EntryType::App("%links".to_string()),
            Entry::Deletion(_) => EntryType::App("%deletion".to_string()),
        }
    }

    /// Canonical serialization used both for hashing and for signing a
    /// header over this entry's content.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Entry serialization is infallible")
    }

    pub fn content_bytes(&self) -> Vec<u8> {
        match self {
            Entry::App { content, .. } => content.clone(),
            Entry::Dna { placeholder }
            | Entry::Agent { placeholder }
            | Entry::Key { placeholder } => placeholder.clone(),
            Entry::Links(_) | Entry::Deletion(_) => self.canonical_bytes(),
        }
    }

    /// Sum this entry's canonical bytes under the given hash spec.
    pub fn sum(&self, hash_spec: &dyn HashSpec) -> Hash {
        hash_spec.hash(&self.canonical_bytes())
    }

    pub fn as_links(&self) -> Option<&Links> {
        match self {
            Entry::Links(links) => Some(links),
            _ => None,
        }
    }

    pub fn as_deletion(&self) -> Option<&DelEntry> {
        match self {
            Entry::Deletion(del) => Some(del),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Blake2bBase58;

    #[test]
    fn sum_is_stable_for_identical_content() {
        let a = Entry::App {
            entry_type: "post".into(),
            content: b"hello".to_vec(),
        };
        let b = Entry::App {
            entry_type: "post".into(),
            content: b"hello".to_vec(),
        };
        assert_eq!(a.sum(&Blake2bBase58), b.sum(&Blake2bBase58));
    }

    #[test]
    fn sum_differs_for_different_types_same_content() {
        let a = Entry::App {
            entry_type: "post".into(),
            content: b"hello".to_vec(),
        };
        let b = Entry::App {
            entry_type: "comment".into(),
            content: b"hello".to_vec(),
        };
        assert_ne!(a.sum(&Blake2bBase58), b.sum(&Blake2bBase58));
    }
}

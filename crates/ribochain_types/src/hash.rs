//! Content addresses.
//!
//! A [`Hash`] is a fixed-width digest of a canonically serialized [`crate::entry::Entry`],
//! carried around in text form as a multibase-encoded string so it can be logged,
//! hashed into a `HashMap` key, and round-tripped through JSON wire bodies without
//! any extra encoding step at the call site.

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes of the BLAKE2b-512 digest actually kept. 256 bits is plenty for a
/// content address and keeps the multibase string short.
const DIGEST_LEN: usize = 32;

/// A content address, multibase-encoded (base58btc) in text form.
///
/// Equality and ordering operate on the encoded text, which is fine because
/// the encoding is a bijection of the underlying digest bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(String);

/// A hash specification: how entry bytes are turned into a [`Hash`].
/// Pluggable so a DNA could in principle choose a different digest, though
/// only the default is implemented here.
pub trait HashSpec: Send + Sync {
    fn hash(&self, canonical_bytes: &[u8]) -> Hash;
}

/// BLAKE2b-256-over-base58btc, the default and only shipped hash spec.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake2bBase58;

impl HashSpec for Blake2bBase58 {
    fn hash(&self, canonical_bytes: &[u8]) -> Hash {
        Hash::of(canonical_bytes)
    }
}

impl Hash {
    /// Hash arbitrary canonical bytes under the default hash spec.
    pub fn of(canonical_bytes: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(canonical_bytes);
        let digest = hasher.finalize();
        let encoded = multibase::encode(multibase::Base::Base58Btc, &digest[..DIGEST_LEN]);
        Hash(encoded)
    }

    /// Wrap an already-encoded hash string without recomputing it, e.g. when
    /// parsing one out of a wire message. Does not validate multibase shape;
    /// callers that need that should go through `FromStr` instead.
    pub fn from_raw_string(s: impl Into<String>) -> Self {
        Hash(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.0)
    }
}

impl std::str::FromStr for Hash {
    type Err = multibase::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        multibase::decode(s)?;
        Ok(Hash(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(Hash::of(b"hello"), Hash::of(b"hello"));
        assert_ne!(Hash::of(b"hello"), Hash::of(b"world"));
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let h = Hash::of(b"hello");
        let parsed: Hash = h.to_string().parse().unwrap();
        assert_eq!(h, parsed);
    }
}

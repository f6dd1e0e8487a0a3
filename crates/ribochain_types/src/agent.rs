//! Agent identity and signing.
//!
//! Key management itself is an external collaborator; what lives here is
//! just enough shape (a public key, a signature type, and the narrow
//! [`Signer`] trait) for headers to be verifiably signed.

use ed25519_dalek::{Signature as EdSignature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A network peer identifier. Distinct from [`AgentId`] because a peer in the
/// transport/DHT sense need not be the same agent whose chain we're tracking
/// (e.g. a relay), though in practice they usually coincide.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keypair-identified participant that owns a chain.
#[derive(Clone)]
pub struct AgentId {
    pub nick: String,
    verifying_key: VerifyingKey,
}

impl AgentId {
    pub fn new(nick: impl Into<String>, verifying_key: VerifyingKey) -> Self {
        Self {
            nick: nick.into(),
            verifying_key,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId(format!(
            "{}:{}",
            self.nick,
            multibase::encode(multibase::Base::Base58Btc, self.verifying_key.as_bytes())
        ))
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.verifying_key.verify(message, &signature.0).is_ok()
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentId").field("nick", &self.nick).finish()
    }
}

impl PartialEq for AgentId {
    fn eq(&self, other: &Self) -> bool {
        self.verifying_key == other.verifying_key
    }
}
impl Eq for AgentId {}

/// An Ed25519 signature over a header's canonical encoding.
#[derive(Clone, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "sig_serde")] EdSignature);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", multibase::encode(multibase::Base::Base58Btc, self.0.to_bytes()))
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}
impl Eq for Signature {}

mod sig_serde {
    use super::EdSignature;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(sig: &EdSignature, s: S) -> Result<S::Ok, S::Error> {
        sig.to_bytes().to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EdSignature, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(d)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))?;
        Ok(EdSignature::from_bytes(&arr))
    }
}

/// A narrow interface over whatever holds the agent's private key material.
/// Kept separate from [`AgentId`] so the core never has to hold a signing key.
pub trait Signer: Send + Sync {
    fn agent_id(&self) -> AgentId;
    fn sign(&self, message: &[u8]) -> Signature;
}

/// An in-memory signer backed by a freshly generated keypair. Suitable for
/// tests and for single-process deployments that don't need an external
/// keystore.
pub struct LocalSigner {
    signing_key: SigningKey,
    nick: String,
}

impl LocalSigner {
    pub fn generate(nick: impl Into<String>) -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
            nick: nick.into(),
        }
    }
}

impl Signer for LocalSigner {
    fn agent_id(&self) -> AgentId {
        AgentId::new(self.nick.clone(), self.signing_key.verifying_key())
    }

    fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips_and_verifies() {
        let signer = LocalSigner::generate("alice");
        let agent = signer.agent_id();
        let sig = signer.sign(b"payload");
        assert!(agent.verify(b"payload", &sig));
        assert!(!agent.verify(b"other", &sig));
    }

    #[test]
    fn wrong_agent_does_not_verify() {
        let signer_a = LocalSigner::generate("alice");
        let signer_b = LocalSigner::generate("bob");
        let sig = signer_a.sign(b"payload");
        assert!(!signer_b.agent_id().verify(b"payload", &sig));
    }
}

//! The ribosome: the application-code interpreter that runs a zome's
//! validation rules and `receive` handler. Implementing a real ribosome
//! (i.e. a WASM or other guest-code runtime) is out of scope for this
//! crate; what lives here is the narrow async interface the validation
//! driver and the `send` action consume, plus two reference implementations
//! used by tests.

use crate::validation::package::{PackagingReq, ValidationPackage};
use async_trait::async_trait;
use ribochain_types::{Entry, EntryDef, PeerId};
use std::sync::Arc;

/// The interface a loaded zome's application engine exposes to the core.
#[async_trait]
pub trait RibosomeT: Send + Sync {
    /// Run application-level validation for a committing or validating
    /// action. `entry` is `None` for validating actions that don't carry
    /// one.
    async fn validate_action(
        &self,
        action_name: &str,
        def: &EntryDef,
        entry: Option<&Entry>,
        package: &ValidationPackage,
        sources: &[PeerId],
    ) -> Result<(), String>;

    /// What chain context this zome wants shipped for a given action/type
    /// pair, queried by `getValidationResponse` on the source peer.
    fn packaging_req(&self, action_name: &str, def: &EntryDef) -> PackagingReq {
        let _ = (action_name, def);
        PackagingReq::entry_and_header()
    }

    /// Handle an application message (`send` action) addressed to this
    /// zome, returning the reply body.
    async fn receive(&self, from: PeerId, body: Vec<u8>) -> Vec<u8>;
}

/// A ribosome that accepts every entry and echoes `send` bodies back.
/// Useful as the default for zomes that declare no validation rule.
#[derive(Clone, Copy, Default)]
pub struct NullRibosome;

#[async_trait]
impl RibosomeT for NullRibosome {
    async fn validate_action(
        &self,
        _action_name: &str,
        _def: &EntryDef,
        _entry: Option<&Entry>,
        _package: &ValidationPackage,
        _sources: &[PeerId],
    ) -> Result<(), String> {
        Ok(())
    }

    async fn receive(&self, _from: PeerId, body: Vec<u8>) -> Vec<u8> {
        body
    }
}

/// A ribosome used by tests and by the rejection end-to-end scenario:
/// rejects any entry whose content starts with a configured prefix.
#[derive(Clone)]
pub struct RejectPrefixRibosome {
    pub rejected_prefix: Arc<str>,
}

impl RejectPrefixRibosome {
    pub fn new(rejected_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            rejected_prefix: rejected_prefix.into(),
        }
    }
}

#[async_trait]
impl RibosomeT for RejectPrefixRibosome {
    async fn validate_action(
        &self,
        _action_name: &str,
        _def: &EntryDef,
        entry: Option<&Entry>,
        _package: &ValidationPackage,
        _sources: &[PeerId],
    ) -> Result<(), String> {
        if let Some(entry) = entry {
            let content = entry.content_bytes();
            if content.starts_with(self.rejected_prefix.as_bytes()) {
                return Err(format!(
                    "content starts with forbidden prefix '{}'",
                    self.rejected_prefix
                ));
            }
        }
        Ok(())
    }

    async fn receive(&self, _from: PeerId, body: Vec<u8>) -> Vec<u8> {
        body
    }
}

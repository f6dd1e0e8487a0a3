//! The validation driver: the central `validateAction` contract (spec
//! §4.3) plus the complementary `getValidationResponse` run on the origin
//! peer when justifying a record to a validator.

pub mod package;
mod sys_validate;

pub use package::{ChainOption, PackagingReq, ValidationPackage};
pub use sys_validate::{sys_validate_entry, SysValidationError};

use crate::chain::LocalChain;
use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::ribosome::RibosomeT;
use ribochain_types::{Entry, EntryDef, EntryType, Hash, Header, PeerId, ZomeRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Build a `ValidationPackage` against a `PackagingReq`, given the entry and
/// header under consideration plus the chain they belong to. Shared by the
/// source peer's `getValidationResponse` and by `do_commit`'s local,
/// proactive assembly (the committing agent already holds the chain, so
/// there is nothing to negotiate over the wire).
pub fn assemble_package(chain: &LocalChain, entry_type: &EntryType, entry: &Entry, header: &Header, req: &PackagingReq) -> ValidationPackage {
    let mut package = ValidationPackage::default();
    if req.include_entry {
        package.entry = Some(entry.clone());
    }
    if req.include_header {
        package.header = Some(header.clone());
    }
    match req.chain_option {
        ChainOption::None => {}
        ChainOption::EntriesOfType => {
            package.headers_of_type = Some(chain.headers_of_type(entry_type));
        }
        ChainOption::Full => {
            package.full_chain = Some(chain.full_slice().to_vec());
        }
    }
    package
}

/// What `validate_action` returns for the two kinds of entry type it
/// handles: system types carry no `EntryDef` at all, application types do.
pub enum ValidationOutcome {
    System,
    Typed(EntryDef),
}

impl ValidationOutcome {
    pub fn into_def(self) -> Option<EntryDef> {
        match self {
            ValidationOutcome::System => None,
            ValidationOutcome::Typed(def) => Some(def),
        }
    }
}

/// Orchestrates the two validation phases, system-level then
/// application-level. Borrows the registry/ribosome table rather than
/// owning them so it can be constructed cheaply at each call site from a
/// `Context`.
pub struct ValidationDriver<'a> {
    pub registry: &'a ZomeRegistry,
    pub ribosomes: &'a HashMap<String, Arc<dyn RibosomeT>>,
    pub self_peer: &'a PeerId,
}

impl<'a> ValidationDriver<'a> {
    pub fn from_context(ctx: &'a Context) -> Self {
        Self {
            registry: &ctx.registry,
            ribosomes: &ctx.ribosomes,
            self_peer: &ctx.self_peer_id,
        }
    }

    /// `validateAction(a, entryType, pkg?, sources)`.
    ///
    /// `check_validation_request` is the action variant's own
    /// `CheckValidationRequest(def)`, e.g. the link action demanding
    /// `DataFormat::Links`, invoked once the `EntryDef` is known and before
    /// the validation package is assembled.
    pub async fn validate_action(
        &self,
        action_name: &str,
        entry_type: &EntryType,
        entry: Option<&Entry>,
        package: Option<&ValidationPackage>,
        sources: &[PeerId],
        check_validation_request: impl Fn(&EntryDef) -> CoreResult<()>,
    ) -> CoreResult<ValidationOutcome> {
        match entry_type {
            EntryType::Dna => Ok(ValidationOutcome::System),
            EntryType::Agent | EntryType::Key => {
                if !sources.contains(self.self_peer) {
                    return Err(CoreError::ValidationFailed(
                        "agent identity entries may only be authored by the owning agent".into(),
                    ));
                }
                Ok(ValidationOutcome::System)
            }
            EntryType::App(name) if name == "%links" => {
                let links_entry = entry.ok_or(CoreError::ValidationFailed("entry is required but missing".into()))?;
                sys_validate::validate_links_shape(links_entry).map_err(|e| CoreError::ValidationFailed(e.to_string()))?;
                Ok(ValidationOutcome::System)
            }
            EntryType::App(name) if name == "%deletion" => {
                let del_entry = entry.ok_or(CoreError::ValidationFailed("entry is required but missing".into()))?;
                del_entry
                    .as_deletion()
                    .ok_or_else(|| CoreError::ValidationFailed("expected a Deletion entry".into()))?;
                Ok(ValidationOutcome::System)
            }
            EntryType::App(name) => {
                let def = self
                    .registry
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| CoreError::UnknownEntryType(name.clone()))?;

                check_validation_request(&def)?;

                let ribosome = self
                    .ribosomes
                    .get(&def.zome)
                    .cloned()
                    .ok_or_else(|| CoreError::UnknownEntryType(name.clone()))?;

                let req = ribosome.packaging_req(action_name, &def);
                let pkg = package.cloned().unwrap_or_default();
                pkg.check_complete(&req)
                    .map_err(CoreError::MissingPackageSection)?;

                sys_validate_entry(entry, &def).map_err(|e| CoreError::ValidationFailed(e.to_string()))?;

                ribosome
                    .validate_action(action_name, &def, entry, &pkg, sources)
                    .await
                    .map_err(CoreError::ValidationFailed)?;

                Ok(ValidationOutcome::Typed(def))
            }
        }
    }
}

/// `{Type, Entry, Header, Package}`, returned by `getValidationResponse`.
#[derive(Clone, Debug)]
pub struct ValidationResponseData {
    pub entry_type: EntryType,
    pub entry: Entry,
    pub header: Header,
    pub package: ValidationPackage,
}

/// Runs on the origin peer when another peer asks it to justify a record:
/// fetch entry+header from the local chain, let the application inspect the
/// `EntryDef` via `check_validation_request`, ask for its `PackagingReq`,
/// and return the assembled package. `DNA` is a hard error: never served.
pub async fn get_validation_response(
    ctx: &Context,
    hash: &Hash,
    check_validation_request: impl Fn(&EntryDef) -> CoreResult<()>,
) -> CoreResult<ValidationResponseData> {
    let chain = ctx.chain.read().await;
    let header = chain
        .get_entry_header(hash)
        .ok_or_else(|| CoreError::HashNotFound(hash.clone()))?;
    let (entry, entry_type) = chain
        .get_entry(hash)
        .ok_or_else(|| CoreError::HashNotFound(hash.clone()))?;

    if matches!(entry_type, EntryType::Dna) {
        return Err(CoreError::ValidationFailed(
            "DNA entries are never served for validation".into(),
        ));
    }

    let req = match &entry_type {
        EntryType::App(name) if name == "%links" || name == "%deletion" => PackagingReq::entry_and_header(),
        EntryType::App(name) => {
            let def = ctx
                .registry
                .lookup(name)
                .cloned()
                .ok_or_else(|| CoreError::UnknownEntryType(name.clone()))?;
            check_validation_request(&def)?;
            let ribosome = ctx
                .ribosome_for_zome(&def.zome)
                .ok_or_else(|| CoreError::UnknownEntryType(name.clone()))?;
            ribosome.packaging_req("validate", &def)
        }
        // Agent/Key carry placeholder payloads; no zome to ask for a
        // package shape, so only entry+header are ever returned.
        _ => PackagingReq::entry_and_header(),
    };

    let package = assemble_package(&chain, &entry_type, &entry, &header, &req);

    Ok(ValidationResponseData {
        entry_type,
        entry,
        header,
        package,
    })
}

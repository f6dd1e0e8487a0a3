//! The validation package: chain context an application has declared it
//! needs in order to validate an entry, assembled at the source peer and
//! shipped to whoever is validating.

use ribochain_types::{Entry, Header};

/// How much of the chain, beyond the entry and its header, the application
/// wants shipped along with a validation request.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ChainOption {
    #[default]
    None,
    /// All prior headers of the entry's own type.
    EntriesOfType,
    /// The full chain slice from genesis to the entry's header.
    Full,
}

/// Negotiated shape of a `ValidationPackage`, returned by the ribosome for
/// a given `(action, EntryDef)` pair.
#[derive(Clone, Debug, Default)]
pub struct PackagingReq {
    pub include_entry: bool,
    pub include_header: bool,
    pub chain_option: ChainOption,
}

impl PackagingReq {
    pub fn entry_and_header() -> Self {
        Self {
            include_entry: true,
            include_header: true,
            chain_option: ChainOption::None,
        }
    }
}

/// A bundle assembled at the source peer containing whatever chain context
/// the application declared it needs for validation. Sections the
/// application didn't ask for are simply `None`.
#[derive(Clone, Debug, Default)]
pub struct ValidationPackage {
    pub entry: Option<Entry>,
    pub header: Option<Header>,
    pub headers_of_type: Option<Vec<Header>>,
    pub full_chain: Option<Vec<(Header, Entry)>>,
}

impl ValidationPackage {
    /// Check that every section the `PackagingReq` demanded is present.
    /// Fails with the name of the first missing section, matching the
    /// "failing if required sections are missing" step of `validateAction`.
    pub fn check_complete(&self, req: &PackagingReq) -> Result<(), String> {
        if req.include_entry && self.entry.is_none() {
            return Err("entry".to_string());
        }
        if req.include_header && self.header.is_none() {
            return Err("header".to_string());
        }
        match req.chain_option {
            ChainOption::None => {}
            ChainOption::EntriesOfType if self.headers_of_type.is_none() => {
                return Err("headers_of_type".to_string())
            }
            ChainOption::Full if self.full_chain.is_none() => return Err("full_chain".to_string()),
            _ => {}
        }
        Ok(())
    }
}

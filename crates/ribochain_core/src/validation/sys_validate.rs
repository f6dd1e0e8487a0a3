//! System-level entry validation, run before the ribosome ever sees an
//! entry: presence, schema shape, and the `Links` payload's own structural
//! rules.

use ribochain_types::{DataFormat, Entry, EntryDef};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SysValidationError {
    #[error("entry is required but missing")]
    MissingEntry,

    #[error("entry content is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("schema rejected entry: {0}")]
    SchemaRejected(String),

    #[error("entry type declares DataFormat::Links but the entry is not a Links entry")]
    NotLinks,

    #[error("a Links entry must contain at least one link")]
    EmptyLinks,

    #[error("a link has a malformed base, link, or tag")]
    MalformedLink,
}

/// `sysValidateEntry`: entry must be non-nil; if `def` has a schema
/// validator, parse per `DataFormat` and validate; if `DataFormat = Links`,
/// the payload must parse as a well-formed, non-empty `Links` batch.
pub fn sys_validate_entry(entry: Option<&Entry>, def: &EntryDef) -> Result<(), SysValidationError> {
    let entry = entry.ok_or(SysValidationError::MissingEntry)?;

    match def.data_format {
        DataFormat::Raw => Ok(()),
        DataFormat::Json => {
            let bytes = entry.content_bytes();
            let value: serde_json::Value =
                serde_json::from_slice(&bytes).map_err(|e| SysValidationError::MalformedJson(e.to_string()))?;
            if let Some(schema) = &def.schema {
                schema.validate(&value).map_err(SysValidationError::SchemaRejected)?;
            }
            Ok(())
        }
        DataFormat::Links => validate_links_shape(entry),
    }
}

/// The structural rules for a `Links` batch: must actually be one, must be
/// non-empty, and every link's base/link/tag must be non-empty. Shared
/// between `DataFormat::Links` application entries and the synthetic
/// `%links` records `ValidationDriver` handles as a system type.
pub fn validate_links_shape(entry: &Entry) -> Result<(), SysValidationError> {
    let links = entry.as_links().ok_or(SysValidationError::NotLinks)?;
    if links.links.is_empty() {
        return Err(SysValidationError::EmptyLinks);
    }
    for link in &links.links {
        if link.tag.is_empty() || link.base.as_str().is_empty() || link.link.as_str().is_empty() {
            return Err(SysValidationError::MalformedLink);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ribochain_types::Sharing;

    fn raw_def() -> EntryDef {
        EntryDef::new("test", "post", DataFormat::Raw, Sharing::Public)
    }

    #[test]
    fn missing_entry_fails() {
        let err = sys_validate_entry(None, &raw_def()).unwrap_err();
        assert_eq!(err, SysValidationError::MissingEntry);
    }

    #[test]
    fn raw_entries_pass_without_schema() {
        let entry = Entry::App {
            entry_type: "post".into(),
            content: b"anything".to_vec(),
        };
        assert!(sys_validate_entry(Some(&entry), &raw_def()).is_ok());
    }

    #[test]
    fn json_entries_require_valid_json() {
        let def = EntryDef::new("test", "post", DataFormat::Json, Sharing::Public);
        let entry = Entry::App {
            entry_type: "post".into(),
            content: b"not json".to_vec(),
        };
        assert!(matches!(
            sys_validate_entry(Some(&entry), &def),
            Err(SysValidationError::MalformedJson(_))
        ));
    }
}

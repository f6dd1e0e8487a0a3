//! Per-entry-type declarations: how an application-defined entry type is
//! shaped, shared, and validated at the system level.

use std::fmt;
use std::sync::Arc;

/// How an entry's payload is structured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    /// Opaque bytes, no structural validation beyond presence.
    Raw,
    /// JSON payload, parsed and handed to the schema validator (if any).
    Json,
    /// A `Links` entry: `{Base, Link, Tag, LinkAction}` list.
    Links,
}

/// Whether an entry of this type may be gossiped to the DHT at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sharing {
    Private,
    Public,
}

/// A schema validator invoked by `sysValidateEntry` when `DataFormat = Json`.
/// Boxed trait object so a zome can supply whatever validation logic it
/// wants without `EntryDef` needing a type parameter.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, value: &serde_json::Value) -> Result<(), String>;
}

/// A validator that accepts everything; the default when a zome declares no
/// schema.
#[derive(Clone, Copy, Default)]
pub struct AnySchema;

impl SchemaValidator for AnySchema {
    fn validate(&self, _value: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }
}

/// An application-defined entry type: name, data format, sharing policy, and
/// optional schema validator. An entry-type name appears in at most one zome
/// per DNA, enforced by `ZomeRegistry::register` at load time.
#[derive(Clone)]
pub struct EntryDef {
    pub name: String,
    pub data_format: DataFormat,
    pub sharing: Sharing,
    pub schema: Option<Arc<dyn SchemaValidator>>,
    /// Name of the zome this entry type belongs to.
    pub zome: String,
}

impl fmt::Debug for EntryDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryDef")
            .field("name", &self.name)
            .field("data_format", &self.data_format)
            .field("sharing", &self.sharing)
            .field("zome", &self.zome)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl EntryDef {
    pub fn new(zome: impl Into<String>, name: impl Into<String>, data_format: DataFormat, sharing: Sharing) -> Self {
        Self {
            name: name.into(),
            data_format,
            sharing,
            schema: None,
            zome: zome.into(),
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn SchemaValidator>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn is_public(&self) -> bool {
        matches!(self.sharing, Sharing::Public)
    }
}

/// Registry mapping entry-type name to `(zome, EntryDef)`, owned by a loaded
/// DNA. Loading the DNA itself is out of scope; this is the narrow shape the
/// validation driver consumes.
#[derive(Clone, Default)]
pub struct ZomeRegistry {
    defs: std::collections::HashMap<String, EntryDef>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entry type '{0}' is already registered in zome '{1}'")]
    DuplicateEntryType(String, String),
}

impl ZomeRegistry {
    pub fn register(&mut self, def: EntryDef) -> Result<(), RegistryError> {
        if let Some(existing) = self.defs.get(&def.name) {
            return Err(RegistryError::DuplicateEntryType(def.name, existing.zome.clone()));
        }
        self.defs.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn lookup(&self, entry_type: &str) -> Option<&EntryDef> {
        self.defs.get(entry_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_names_are_unique_across_zomes() {
        let mut reg = ZomeRegistry::default();
        reg.register(EntryDef::new("blog", "post", DataFormat::Json, Sharing::Public))
            .unwrap();
        let err = reg
            .register(EntryDef::new("chat", "post", DataFormat::Json, Sharing::Public))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateEntryType("post".into(), "blog".into()));
    }
}

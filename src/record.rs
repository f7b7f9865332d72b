//! Business-entity records.
//!
//! A record carries the raw fields supplied by the record store plus two
//! derived keys: the identifier root and the canonical name. The derived
//! keys are pure functions of the raw fields and are computed once, when the
//! record is built; they cannot be set independently.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::identifier::{IdentifierCanonicalizer, IdentifierRoot};
use crate::normalize::NameNormalizer;
use crate::value::AttributeValue;

/// Opaque reference to the record in its source system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record id from any string-like source reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw source reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Role the business plays for the host application.
///
/// The resolver's entity-type tag scopes store lookups to one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityKind {
    /// A business that buys from the host.
    #[default]
    Customer,
    /// A business that sells to the host.
    Supplier,
    /// A host-defined kind.
    Custom(String),
}

impl TryFrom<String> for EntityKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err("entity kind cannot be empty".to_string());
        }

        let bytes = value.as_bytes();
        if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"custom:") {
            let rest = value[7..].trim();
            if rest.is_empty() {
                return Err("custom entity kind cannot be empty".to_string());
            }
            return Ok(Self::Custom(rest.to_string()));
        }

        if value.eq_ignore_ascii_case("customer") {
            Ok(Self::Customer)
        } else if value.eq_ignore_ascii_case("supplier") {
            Ok(Self::Supplier)
        } else {
            Err(format!(
                "unknown entity kind: {value}. Use customer, supplier, or prefix custom kinds with custom:<name>"
            ))
        }
    }
}

impl From<EntityKind> for String {
    fn from(value: EntityKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Supplier => write!(f, "supplier"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Computes the derived keys of a record.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    identifiers: IdentifierCanonicalizer,
    names: Arc<NameNormalizer>,
}

impl KeyDeriver {
    /// Creates a deriver from explicit components.
    #[must_use]
    pub fn new(identifiers: IdentifierCanonicalizer, names: Arc<NameNormalizer>) -> Self {
        Self { identifiers, names }
    }

    /// Creates a deriver from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ValidationError> {
        Ok(Self::new(
            IdentifierCanonicalizer::from_config(&config.identifier),
            Arc::new(NameNormalizer::new(&config.normalizer)?),
        ))
    }

    /// Identifier canonicalizer in use.
    #[must_use]
    pub const fn identifiers(&self) -> &IdentifierCanonicalizer {
        &self.identifiers
    }

    /// Name normalizer in use.
    #[must_use]
    pub fn names(&self) -> &Arc<NameNormalizer> {
        &self.names
    }

    /// Builds a record from its raw fields.
    #[must_use]
    pub fn derive(&self, fields: RecordFields) -> EntityRecord {
        let identifier_root = self.identifiers.root(fields.identifier_raw.as_deref());
        let normalized_name = self.names.normalize_opt(fields.display_name.as_deref());
        EntityRecord {
            fields,
            identifier_root,
            normalized_name,
        }
    }

    /// Recomputes the derived keys of an existing record.
    #[must_use]
    pub fn rekey(&self, record: EntityRecord) -> EntityRecord {
        self.derive(record.fields)
    }
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(
            IdentifierCanonicalizer::default(),
            Arc::new(NameNormalizer::default()),
        )
    }
}

static DEFAULT_DERIVER: OnceLock<KeyDeriver> = OnceLock::new();

fn default_deriver() -> &'static KeyDeriver {
    DEFAULT_DERIVER.get_or_init(KeyDeriver::default)
}

/// Raw fields of a record as supplied by the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordFields {
    /// Source reference of the record.
    pub id: RecordId,
    /// Entity kind; customer when absent.
    #[serde(default)]
    pub kind: EntityKind,
    /// Organization identifier as stored, punctuation included.
    #[serde(default)]
    pub identifier_raw: Option<String>,
    /// Display name as stored.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Auxiliary attributes such as location or dates.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// A business-entity record with its derived matching keys.
///
/// # Examples
///
/// ```
/// use groupscope::EntityRecord;
///
/// let record = EntityRecord::new("r1", Some("12.345.678/0001-90"), Some("ACME LOGISTICS LTDA"));
/// assert_eq!(record.identifier_root().unwrap().as_str(), "12345678");
/// assert_eq!(record.normalized_name(), "acme");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RecordFields", into = "RecordFields")]
pub struct EntityRecord {
    fields: RecordFields,
    identifier_root: Option<IdentifierRoot>,
    normalized_name: String,
}

impl EntityRecord {
    /// Builds a customer record with the default matching rules.
    #[must_use]
    pub fn new(id: impl Into<RecordId>, identifier_raw: Option<&str>, display_name: Option<&str>) -> Self {
        default_deriver().derive(RecordFields {
            id: id.into(),
            kind: EntityKind::Customer,
            identifier_raw: identifier_raw.map(str::to_string),
            display_name: display_name.map(str::to_string),
            attributes: BTreeMap::new(),
        })
    }

    /// Sets the entity kind. Kind does not affect the derived keys.
    #[must_use]
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.fields.kind = kind;
        self
    }

    /// Adds an auxiliary attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.fields.attributes.insert(name.into(), value.into());
        self
    }

    /// Source reference.
    pub fn id(&self) -> &RecordId {
        &self.fields.id
    }

    /// Entity kind.
    pub fn kind(&self) -> &EntityKind {
        &self.fields.kind
    }

    /// Identifier as stored.
    pub fn identifier_raw(&self) -> Option<&str> {
        self.fields.identifier_raw.as_deref()
    }

    /// Display name as stored.
    pub fn display_name(&self) -> Option<&str> {
        self.fields.display_name.as_deref()
    }

    /// All auxiliary attributes.
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.fields.attributes
    }

    /// Attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.fields.attributes.get(name)
    }

    /// Company-level root of the identifier, if the identifier has one.
    pub fn identifier_root(&self) -> Option<&IdentifierRoot> {
        self.identifier_root.as_ref()
    }

    /// Canonical display name (empty when the name is absent).
    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    /// Returns the raw fields.
    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }
}

impl From<RecordFields> for EntityRecord {
    fn from(fields: RecordFields) -> Self {
        default_deriver().derive(fields)
    }
}

impl From<EntityRecord> for RecordFields {
    fn from(record: EntityRecord) -> Self {
        record.fields
    }
}

// Records are identified by their source reference.
impl PartialEq for EntityRecord {
    fn eq(&self, other: &Self) -> bool {
        self.fields.id == other.fields.id
    }
}

impl Eq for EntityRecord {}

impl std::hash::Hash for EntityRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fields.id.hash(state);
    }
}

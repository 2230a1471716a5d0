//! Entity capabilities required by the store.
//!
//! The store never inspects an entity's concrete type: it enumerates fields,
//! reads and writes the identifier, and asks the entity to construct siblings
//! of the same namespace from plain documents. [`Record`] is a ready-made
//! implementation for callers without an entity model of their own.

use std::fmt;

use bson::{Bson, Document};

use crate::id::{ENTITY_ID_FIELD, decode_id};

/// The `(zone, base, name)` triple identifying an entity's logical collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub zone: Option<String>,
    pub base: Option<String>,
    pub name: String,
}

impl Namespace {
    /// Creates a namespace with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Namespace { zone: None, base: None, name: name.into() }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |part: &Option<String>| part.clone().unwrap_or_else(|| "-".to_string());
        write!(f, "{}/{}/{}", part(&self.zone), part(&self.base), self.name)
    }
}

/// An entity the store can persist.
pub trait Entity: Send + Sync + Sized {
    /// The namespace the entity belongs to.
    fn namespace(&self) -> &Namespace;

    /// The persisted identifier, `None` for entities never saved.
    fn id(&self) -> Option<&str>;

    /// Assigns the identifier after a successful insert.
    fn set_id(&mut self, id: String);

    /// An identifier requested for the first save, if any.
    fn desired_id(&self) -> Option<&Bson> {
        None
    }

    /// Names of the data fields currently present, excluding the identifier.
    fn field_names(&self) -> Vec<String>;

    /// The value of a data field.
    fn field(&self, name: &str) -> Option<&Bson>;

    /// Constructs a new entity of the same namespace from a loaded document.
    ///
    /// The document carries the identifier as a string under `id`.
    fn make(&self, document: Document) -> Self;
}

/// A schemaless entity holding its fields in a BSON document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    namespace: Namespace,
    id: Option<String>,
    desired_id: Option<Bson>,
    fields: Document,
}

impl Record {
    /// Creates an empty, unsaved record in `namespace`.
    pub fn new(namespace: Namespace) -> Self {
        Record { namespace, ..Default::default() }
    }

    /// Creates an unsaved record from a document of fields.
    ///
    /// An `id` entry becomes the record's identifier.
    pub fn from_document(namespace: Namespace, mut fields: Document) -> Self {
        let id = fields.remove(ENTITY_ID_FIELD).map(|id| decode_id(&id));
        Record { namespace, id, desired_id: None, fields }
    }

    /// Requests a specific identifier for the first save.
    pub fn with_desired_id(mut self, id: impl Into<Bson>) -> Self {
        self.desired_id = Some(id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Bson>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Bson> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Bson::as_str)
    }

    /// Removes a field from the in-memory record.
    pub fn unset(&mut self, name: &str) -> Option<Bson> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &Document {
        &self.fields
    }
}

impl Entity for Record {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn desired_id(&self) -> Option<&Bson> {
        self.desired_id.as_ref()
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn field(&self, name: &str) -> Option<&Bson> {
        self.fields.get(name)
    }

    fn make(&self, document: Document) -> Self {
        Record::from_document(self.namespace.clone(), document)
    }
}

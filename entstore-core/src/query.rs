//! Abstract entity queries.
//!
//! A [`Query`] is a flat document of field names to expected values. Keys
//! ending in [`DIRECTIVE_MARKER`] are directives: they shape the query
//! instead of contributing to the filter.
//!
//! ```ignore
//! use entstore::query::Query;
//!
//! let query = Query::new()
//!     .eq("status", "active")
//!     .sort("created", -1)
//!     .limit(10)
//!     .skip(20);
//! ```
//!
//! # Directives
//!
//! | key       | effect                                                   |
//! |-----------|----------------------------------------------------------|
//! | `sort$`   | `{field: direction}`, only the first entry is honored    |
//! | `limit$`  | maximum number of results                                |
//! | `skip$`   | number of results to skip                                |
//! | `fields$` | projection                                               |
//! | `native$` | `[filter, options]` or `filter`, bypasses translation    |
//! | `all$`    | remove every match instead of one                        |
//! | `load$`   | return the removed entity (defaults to true)             |

use bson::{Bson, Document, ser::serialize_to_bson};
use serde_json::Value;

use crate::{
    error::{EntityStoreError, EntityStoreResult},
    id::ENTITY_ID_FIELD,
};

/// Trailing marker that distinguishes directive keys from filter fields.
pub const DIRECTIVE_MARKER: char = '$';

/// Returns true when `key` names a directive rather than a filter field.
pub fn is_directive_key(key: &str) -> bool {
    key.ends_with(DIRECTIVE_MARKER)
}

/// Reserved query directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Sort,
    Limit,
    Skip,
    Fields,
    Native,
    All,
    Load,
}

impl Directive {
    /// The query key for this directive.
    pub const fn key(self) -> &'static str {
        match self {
            Directive::Sort => "sort$",
            Directive::Limit => "limit$",
            Directive::Skip => "skip$",
            Directive::Fields => "fields$",
            Directive::Native => "native$",
            Directive::All => "all$",
            Directive::Load => "load$",
        }
    }
}

/// Returns false for values that count as "not set": null, false, zero and the empty string.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0 && !n.is_nan(),
        Bson::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// An abstract query over the entities of one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    document: Document,
}

impl Query {
    /// Creates an empty query, which matches every entity.
    pub fn new() -> Self {
        Query { document: Document::new() }
    }

    /// Creates a query matching the entity with the given identifier.
    pub fn by_id(id: impl Into<String>) -> Self {
        Query::new().eq(ENTITY_ID_FIELD, id.into())
    }

    /// Builds a query from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object.
    pub fn from_json(value: Value) -> EntityStoreResult<Self> {
        match serialize_to_bson(&value)? {
            Bson::Document(document) => Ok(Query { document }),
            other => Err(EntityStoreError::InvalidQuery(format!(
                "Expected a query object, got {other}"
            ))),
        }
    }

    /// Adds an equality constraint on `field`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.document.insert(field.into(), value.into());
        self
    }

    /// Sorts by `field`, descending when `direction` is negative.
    pub fn sort(self, field: impl Into<String>, direction: i32) -> Self {
        let mut sort = Document::new();
        sort.insert(field.into(), direction);
        self.directive(Directive::Sort, sort)
    }

    /// Limits the number of results.
    pub fn limit(self, limit: i64) -> Self {
        self.directive(Directive::Limit, limit)
    }

    /// Skips the given number of results.
    pub fn skip(self, skip: i64) -> Self {
        self.directive(Directive::Skip, skip)
    }

    /// Restricts the returned fields.
    pub fn fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|field| Bson::String(field.into()))
            .collect::<Vec<_>>();
        self.directive(Directive::Fields, fields)
    }

    /// Replaces translation with a native filter and optional native options.
    pub fn native(self, filter: Document, options: Option<Document>) -> Self {
        match options {
            Some(options) => self.directive(Directive::Native, vec![Bson::Document(filter), Bson::Document(options)]),
            None => self.directive(Directive::Native, filter),
        }
    }

    /// Removes every match instead of a single one.
    pub fn all(self, all: bool) -> Self {
        self.directive(Directive::All, all)
    }

    /// Controls whether a single remove returns the removed entity.
    pub fn load(self, load: bool) -> Self {
        self.directive(Directive::Load, load)
    }

    /// Sets a directive to an arbitrary value.
    pub fn directive(mut self, directive: Directive, value: impl Into<Bson>) -> Self {
        self.document.insert(directive.key(), value.into());
        self
    }

    /// Returns the raw value of a directive, if present.
    pub fn get_directive(&self, directive: Directive) -> Option<&Bson> {
        self.document.get(directive.key())
    }

    /// Returns the directive value only when it is truthy.
    pub fn active_directive(&self, directive: Directive) -> Option<&Bson> {
        self.get_directive(directive).filter(|value| is_truthy(value))
    }

    /// Iterates the filter fields, skipping directives.
    pub fn filter_fields(&self) -> impl Iterator<Item = (&String, &Bson)> {
        self.document.iter().filter(|(key, _)| !is_directive_key(key))
    }

    /// The underlying query document, directives included.
    pub fn as_document(&self) -> &Document {
        &self.document
    }
}

impl From<Document> for Query {
    fn from(document: Document) -> Self {
        Query { document }
    }
}

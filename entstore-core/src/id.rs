//! Conversion between entity identifiers and native document identifiers.
//!
//! Entities carry their identifier as a string. Documents carry it under
//! [`NATIVE_ID_FIELD`] as an [`ObjectId`] whenever the string is a valid
//! 24 character hex form, and verbatim otherwise.

use bson::{Bson, oid::ObjectId};

/// Field under which documents store their identifier.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Field under which entities and abstract queries carry their identifier.
pub const ENTITY_ID_FIELD: &str = "id";

const OBJECT_ID_HEX_LEN: usize = 24;

/// Converts an entity identifier into its native document form.
///
/// A string of exactly 24 characters that parses as an [`ObjectId`] becomes
/// one. Every other value, including a 24 character string that does not
/// parse, is returned unchanged.
pub fn encode_id(value: &Bson) -> Bson {
    match value {
        Bson::String(s) if s.chars().count() == OBJECT_ID_HEX_LEN => ObjectId::parse_str(s)
            .map(Bson::ObjectId)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}

/// Converts a native document identifier back into the entity string form.
pub fn decode_id(value: &Bson) -> String {
    match value {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(n) => n.to_string(),
        Bson::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

//! Translation of abstract queries into native filter and option documents.
//!
//! The filter document keeps every plain field of the query, with a truthy
//! `id` rewritten to `_id`. The options document carries sort, limit, skip and
//! projection in the shape [`FindSpec`](crate::options::FindSpec) parses.
//! A truthy `native$` directive bypasses both.

use bson::{Bson, Document, doc};

use crate::{
    error::{EntityStoreError, EntityStoreResult},
    id::{ENTITY_ID_FIELD, NATIVE_ID_FIELD, encode_id},
    query::{Directive, Query, is_truthy},
};

/// Translates [`Query`] values into native filter and option documents.
pub struct QueryTranslator;

impl QueryTranslator {
    /// Builds the native filter for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`EntityStoreError::InvalidQuery`] when `native$` holds something
    /// other than a filter document or a `[filter, options]` array.
    pub fn filter(query: &Query) -> EntityStoreResult<Document> {
        if let Some(native) = query.active_directive(Directive::Native) {
            return native_part(native, 0).map(Option::unwrap_or_default);
        }

        let mut filter = query
            .filter_fields()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Document>();

        // A falsy id stays a plain `id` field filter.
        if let Some(id) = filter.get(ENTITY_ID_FIELD).filter(|id| is_truthy(id)).cloned() {
            filter.remove(ENTITY_ID_FIELD);
            filter.insert(NATIVE_ID_FIELD, encode_id(&id));
        }

        Ok(filter)
    }

    /// Builds the native options for `query`.
    ///
    /// Directives with falsy values are omitted, so `limit$: 0` and
    /// `skip$: 0` mean "not set".
    ///
    /// # Errors
    ///
    /// Returns [`EntityStoreError::InvalidQuery`] for a malformed `native$`
    /// or a `sort$` that is not a document.
    pub fn options(query: &Query) -> EntityStoreResult<Document> {
        if let Some(native) = query.active_directive(Directive::Native) {
            return match native {
                Bson::Array(_) => native_part(native, 1).map(Option::unwrap_or_default),
                _ => Ok(Document::new()),
            };
        }

        let mut options = Document::new();

        if let Some(sort) = query.active_directive(Directive::Sort) {
            let sort = sort.as_document().ok_or_else(|| {
                EntityStoreError::InvalidQuery(format!("sort$ must be a document, got {sort}"))
            })?;

            // Only a single sort key is honored.
            if let Some((field, direction)) = sort.iter().next() {
                let direction = if is_negative(direction) { "descending" } else { "ascending" };
                options.insert("sort", vec![Bson::Array(vec![field.clone().into(), direction.into()])]);
            }
        }

        if let Some(limit) = query.active_directive(Directive::Limit) {
            options.insert("limit", limit.clone());
        }

        if let Some(skip) = query.active_directive(Directive::Skip) {
            options.insert("skip", skip.clone());
        }

        if let Some(fields) = query.active_directive(Directive::Fields) {
            options.insert("fields", fields.clone());
        }

        Ok(options)
    }

    /// Builds the filter selecting the document with the given entity identifier.
    pub fn id_filter(id: &str) -> Document {
        doc! { NATIVE_ID_FIELD: encode_id(&Bson::String(id.to_string())) }
    }
}

fn native_part(native: &Bson, index: usize) -> EntityStoreResult<Option<Document>> {
    let part = match native {
        Bson::Array(parts) => parts.get(index),
        other if index == 0 => Some(other),
        _ => None,
    };

    match part {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(document)) => Ok(Some(document.clone())),
        Some(other) => Err(EntityStoreError::InvalidQuery(format!(
            "native$ entries must be documents, got {other}"
        ))),
    }
}

fn is_negative(value: &Bson) -> bool {
    match value {
        Bson::Int32(n) => *n < 0,
        Bson::Int64(n) => *n < 0,
        Bson::Double(n) => *n < 0.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use bson::oid::ObjectId;

    use super::*;

    #[test]
    fn filter_drops_directives() {
        let query = Query::from(doc! { "p1": "v1", "p2": 2, "limit$": 5, "sort$": { "p1": 1 } });

        assert_eq!(QueryTranslator::filter(&query).unwrap(), doc! { "p1": "v1", "p2": 2 });
    }

    #[test]
    fn filter_rewrites_hex_id() {
        let oid = ObjectId::new();
        let query = Query::by_id(oid.to_hex()).eq("p1", "v1");

        assert_eq!(QueryTranslator::filter(&query).unwrap(), doc! { "p1": "v1", "_id": oid });
    }

    #[test]
    fn filter_keeps_custom_id_verbatim() {
        let query = Query::by_id("zxy");

        assert_eq!(QueryTranslator::filter(&query).unwrap(), doc! { "_id": "zxy" });
    }

    #[test]
    fn filter_keeps_falsy_id_as_a_plain_field() {
        let null = Query::new().eq("id", Bson::Null);
        assert_eq!(QueryTranslator::filter(&null).unwrap(), doc! { "id": null });

        let empty = Query::by_id("");
        assert_eq!(QueryTranslator::filter(&empty).unwrap(), doc! { "id": "" });
    }

    #[test]
    fn empty_query_translates_to_empty_documents() {
        let query = Query::new();

        assert_eq!(QueryTranslator::filter(&query).unwrap(), doc! {});
        assert_eq!(QueryTranslator::options(&query).unwrap(), doc! {});
    }

    #[test]
    fn options_use_first_sort_key_only() {
        let query = Query::from(doc! { "sort$": { "a": -1, "b": 1 } });

        assert_eq!(
            QueryTranslator::options(&query).unwrap(),
            doc! { "sort": [["a", "descending"]] }
        );

        let query = Query::new().sort("b", 1);
        assert_eq!(
            QueryTranslator::options(&query).unwrap(),
            doc! { "sort": [["b", "ascending"]] }
        );
    }

    #[test]
    fn options_pass_through_limit_skip_fields() {
        let query = Query::from(doc! { "limit$": 2, "skip$": 3, "fields$": ["p1"] });

        assert_eq!(
            QueryTranslator::options(&query).unwrap(),
            doc! { "limit": 2, "skip": 3, "fields": ["p1"] }
        );
    }

    #[test]
    fn falsy_directives_are_absent() {
        let query = Query::from(doc! { "limit$": 0, "skip$": 0, "sort$": null, "fields$": false });

        assert_eq!(QueryTranslator::options(&query).unwrap(), doc! {});
    }

    #[test]
    fn sort_must_be_a_document() {
        let query = Query::from(doc! { "sort$": "a" });

        assert!(matches!(
            QueryTranslator::options(&query),
            Err(EntityStoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn native_pair_bypasses_translation() {
        let query = Query::from(doc! {
            "id": "ignored",
            "limit$": 4,
            "native$": [{ "$or": [{ "a": 1 }, { "a": 2 }] }, { "sort": [["a", -1]] }],
        });

        assert_eq!(
            QueryTranslator::filter(&query).unwrap(),
            doc! { "$or": [{ "a": 1 }, { "a": 2 }] }
        );
        assert_eq!(
            QueryTranslator::options(&query).unwrap(),
            doc! { "sort": [["a", -1]] }
        );
    }

    #[test]
    fn native_document_has_empty_options() {
        let query = Query::new().native(doc! { "a": { "$gt": 1 } }, None).limit(3);

        assert_eq!(QueryTranslator::filter(&query).unwrap(), doc! { "a": { "$gt": 1 } });
        assert_eq!(QueryTranslator::options(&query).unwrap(), doc! {});
    }

    #[test]
    fn native_with_scalar_is_rejected() {
        let query = Query::from(doc! { "native$": 5 });

        assert!(QueryTranslator::filter(&query).is_err());
    }

    #[test]
    fn id_filter_encodes() {
        let oid = ObjectId::new();

        assert_eq!(QueryTranslator::id_filter(&oid.to_hex()), doc! { "_id": oid });
        assert_eq!(QueryTranslator::id_filter("abc"), doc! { "_id": "abc" });
    }
}

//! Conversion between entities and native documents.

use bson::Document;

use crate::{
    entity::Entity,
    id::{ENTITY_ID_FIELD, NATIVE_ID_FIELD, decode_id, encode_id},
};

/// Maps entities to persistable documents and back.
pub struct EntityMapper;

impl EntityMapper {
    /// Builds the document to persist for `entity`.
    ///
    /// Every reported field is copied except `id`. An unsaved entity with a
    /// desired identifier gets it as `_id`.
    pub fn to_document<E: Entity>(entity: &E) -> Document {
        let mut document = entity
            .field_names()
            .into_iter()
            .filter(|name| name.as_str() != ENTITY_ID_FIELD)
            .filter_map(|name| entity.field(&name).cloned().map(|value| (name, value)))
            .collect::<Document>();

        if entity.id().is_none_or(str::is_empty) {
            if let Some(desired) = entity.desired_id() {
                document.insert(NATIVE_ID_FIELD, encode_id(desired));
            }
        }

        document
    }

    /// Builds an entity from a loaded document through `template`'s factory.
    ///
    /// `_id` is moved into a string `id` field. An absent document yields no entity.
    pub fn from_document<E: Entity>(template: &E, document: Option<Document>) -> Option<E> {
        let mut document = document?;

        if let Some(native_id) = document.remove(NATIVE_ID_FIELD) {
            document.insert(ENTITY_ID_FIELD, decode_id(&native_id));
        }

        Some(template.make(document))
    }
}

#[cfg(test)]
mod tests {
    use bson::{Bson, doc, oid::ObjectId};

    use super::*;
    use crate::entity::{Namespace, Record};

    #[test]
    fn to_document_copies_fields() {
        let record = Record::new(Namespace::new("foo"))
            .with_field("p1", "v1")
            .with_field("p3", "v3");

        assert_eq!(EntityMapper::to_document(&record), doc! { "p1": "v1", "p3": "v3" });
    }

    #[test]
    fn desired_id_applies_to_unsaved_entities_only() {
        let oid = ObjectId::new();
        let unsaved = Record::new(Namespace::new("foo")).with_desired_id(oid.to_hex());
        assert_eq!(EntityMapper::to_document(&unsaved), doc! { "_id": oid });

        let custom = Record::new(Namespace::new("foo")).with_desired_id("zxy");
        assert_eq!(EntityMapper::to_document(&custom), doc! { "_id": "zxy" });

        let mut saved = Record::new(Namespace::new("foo")).with_desired_id("zxy");
        saved.set_id("abc".to_string());
        assert_eq!(EntityMapper::to_document(&saved), doc! {});
    }

    #[test]
    fn empty_id_counts_as_unsaved() {
        let mut record = Record::new(Namespace::new("foo")).with_desired_id("zxy");
        record.set_id(String::new());

        assert_eq!(EntityMapper::to_document(&record), doc! { "_id": "zxy" });
    }

    #[test]
    fn from_document_renames_native_id() {
        let oid = ObjectId::new();
        let template = Record::new(Namespace::new("foo"));

        let record = EntityMapper::from_document(&template, Some(doc! { "_id": oid, "p1": "v1" })).unwrap();

        assert_eq!(record.id(), Some(oid.to_hex().as_str()));
        assert_eq!(record.get("p1"), Some(&Bson::String("v1".into())));
        assert!(record.get("_id").is_none());
        assert!(record.get("id").is_none());
    }

    #[test]
    fn from_document_absent_is_none() {
        let template = Record::new(Namespace::new("foo"));

        assert!(EntityMapper::from_document(&template, None).is_none());
    }
}

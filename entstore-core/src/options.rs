//! Parsing of native option documents.
//!
//! Options reach a backend either from [`QueryTranslator::options`](crate::translate::QueryTranslator::options)
//! or verbatim from a `native$` directive, so both the translated shape and
//! the driver's own shape are accepted here.

use bson::{Bson, Document};

use crate::error::{EntityStoreError, EntityStoreResult};

/// Backend-neutral find options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    /// Sort keys in precedence order, `{field: 1 | -1}`.
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
    /// Projection document, `{field: 1}` or `{field: 0}`.
    pub projection: Option<Document>,
}

impl FindSpec {
    /// Parses an options document.
    ///
    /// Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EntityStoreError::InvalidQuery`] for malformed sort, limit, skip or projection values.
    pub fn from_options(options: &Document) -> EntityStoreResult<Self> {
        let mut parsed = FindSpec::default();

        if let Some(sort) = options.get("sort") {
            parsed.sort = parse_sort(sort)?;
        }

        if let Some(limit) = options.get("limit") {
            parsed.limit = parse_integer("limit", limit)?
                .map(|limit| i64::try_from(limit.unsigned_abs()).unwrap_or(i64::MAX))
                .filter(|limit| *limit != 0);
        }

        if let Some(skip) = options.get("skip") {
            parsed.skip = match parse_integer("skip", skip)? {
                Some(skip) if skip < 0 => {
                    return Err(EntityStoreError::InvalidQuery(format!("skip must not be negative, got {skip}")));
                }
                Some(skip) => Some(skip as u64).filter(|skip| *skip != 0),
                None => None,
            };
        }

        if let Some(fields) = options.get("projection").or_else(|| options.get("fields")) {
            parsed.projection = parse_projection(fields)?;
        }

        Ok(parsed)
    }
}

fn parse_sort(value: &Bson) -> EntityStoreResult<Option<Document>> {
    let mut sort = Document::new();

    match value {
        Bson::Null => return Ok(None),
        Bson::Document(document) => {
            for (field, direction) in document {
                sort.insert(field.clone(), parse_direction(direction)?);
            }
        }
        // A single `[field, direction]` pair.
        Bson::Array(pair) if matches!(pair.first(), Some(Bson::String(_))) => {
            let (field, direction) = parse_pair(pair)?;
            sort.insert(field, direction);
        }
        Bson::Array(pairs) => {
            for pair in pairs {
                match pair {
                    Bson::Array(pair) => {
                        let (field, direction) = parse_pair(pair)?;
                        sort.insert(field, direction);
                    }
                    Bson::String(field) => {
                        sort.insert(field.clone(), 1);
                    }
                    other => {
                        return Err(EntityStoreError::InvalidQuery(format!("Invalid sort entry {other}")));
                    }
                }
            }
        }
        Bson::String(field) => {
            sort.insert(field.clone(), 1);
        }
        other => return Err(EntityStoreError::InvalidQuery(format!("Invalid sort {other}"))),
    }

    Ok(Some(sort).filter(|sort| !sort.is_empty()))
}

fn parse_pair(pair: &[Bson]) -> EntityStoreResult<(String, i32)> {
    match pair {
        [Bson::String(field)] => Ok((field.clone(), 1)),
        [Bson::String(field), direction] => Ok((field.clone(), parse_direction(direction)?)),
        _ => Err(EntityStoreError::InvalidQuery(format!(
            "Sort pairs must be [field, direction], got {}",
            Bson::Array(pair.to_vec())
        ))),
    }
}

fn parse_direction(value: &Bson) -> EntityStoreResult<i32> {
    let negative = match value {
        Bson::Int32(n) => *n < 0,
        Bson::Int64(n) => *n < 0,
        Bson::Double(n) => *n < 0.0,
        Bson::String(s) => match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => false,
            "desc" | "descending" | "-1" => true,
            _ => return Err(EntityStoreError::InvalidQuery(format!("Invalid sort direction {s}"))),
        },
        other => return Err(EntityStoreError::InvalidQuery(format!("Invalid sort direction {other}"))),
    };

    Ok(if negative { -1 } else { 1 })
}

fn parse_integer(name: &str, value: &Bson) -> EntityStoreResult<Option<i64>> {
    match value {
        Bson::Null => Ok(None),
        Bson::Int32(n) => Ok(Some(i64::from(*n))),
        Bson::Int64(n) => Ok(Some(*n)),
        Bson::Double(n) if n.fract() == 0.0 && n.is_finite() => Ok(Some(*n as i64)),
        other => Err(EntityStoreError::InvalidQuery(format!("{name} must be an integer, got {other}"))),
    }
}

fn parse_projection(value: &Bson) -> EntityStoreResult<Option<Document>> {
    match value {
        Bson::Null => Ok(None),
        Bson::Document(document) => Ok(Some(document.clone()).filter(|projection| !projection.is_empty())),
        Bson::Array(fields) => {
            let mut projection = Document::new();
            for field in fields {
                match field {
                    Bson::String(field) => {
                        projection.insert(field.clone(), 1);
                    }
                    other => {
                        return Err(EntityStoreError::InvalidQuery(format!("Projection fields must be strings, got {other}")));
                    }
                }
            }
            Ok(Some(projection).filter(|projection| !projection.is_empty()))
        }
        other => Err(EntityStoreError::InvalidQuery(format!("Invalid projection {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn parses_translated_options() {
        let parsed = FindSpec::from_options(&doc! {
            "sort": [["p1", "descending"]],
            "limit": 2,
            "skip": 1,
            "fields": ["p1", "p2"],
        })
        .unwrap();

        assert_eq!(
            parsed,
            FindSpec {
                sort: Some(doc! { "p1": -1 }),
                limit: Some(2),
                skip: Some(1),
                projection: Some(doc! { "p1": 1, "p2": 1 }),
            }
        );
    }

    #[test]
    fn parses_driver_shapes() {
        let parsed = FindSpec::from_options(&doc! {
            "sort": { "a": -1, "b": "asc" },
            "projection": { "secret": 0 },
        })
        .unwrap();

        assert_eq!(parsed.sort, Some(doc! { "a": -1, "b": 1 }));
        assert_eq!(parsed.projection, Some(doc! { "secret": 0 }));
    }

    #[test]
    fn parses_legacy_sort_pairs() {
        let pair = FindSpec::from_options(&doc! { "sort": ["a", -1] }).unwrap();
        assert_eq!(pair.sort, Some(doc! { "a": -1 }));

        let pairs = FindSpec::from_options(&doc! { "sort": [["a", -1], ["b", 1]] }).unwrap();
        assert_eq!(pairs.sort, Some(doc! { "a": -1, "b": 1 }));
    }

    #[test]
    fn zero_limit_and_skip_are_unset() {
        let parsed = FindSpec::from_options(&doc! { "limit": 0, "skip": 0 }).unwrap();

        assert_eq!(parsed, FindSpec::default());
    }

    #[test]
    fn extreme_limits_clamp_instead_of_overflowing() {
        let min = FindSpec::from_options(&doc! { "limit": i64::MIN }).unwrap();
        assert_eq!(min.limit, Some(i64::MAX));

        let saturated = FindSpec::from_options(&doc! { "limit": -1.0e300 }).unwrap();
        assert_eq!(saturated.limit, Some(i64::MAX));

        let negative = FindSpec::from_options(&doc! { "limit": -3_i64 }).unwrap();
        assert_eq!(negative.limit, Some(3));
    }

    #[test]
    fn rejects_malformed_values() {
        for options in [
            doc! { "limit": "ten" },
            doc! { "skip": -1 },
            doc! { "sort": [["a", "sideways"]] },
            doc! { "fields": [1] },
        ] {
            assert!(FindSpec::from_options(&options).is_err(), "{options}");
        }
    }
}

//! Native filter evaluation for in-memory documents.
//!
//! Supports the filters the query translator produces plus the common
//! native operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`, `$exists`, and top-level `$and`, `$or`, `$nor`.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use entstore_core::error::{EntityStoreError, EntityStoreResult};

/// Type-erased, comparable representation of BSON values.
///
/// Integers keep their exact value; doubles compare against them exactly.
/// Types without a normalized form compare by exact BSON equality only.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect::<Vec<_>>()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            other => Comparable::Other(other),
        }
    }
}

// Exact comparison of an integer with a double.
fn compare_integer(integer: i64, double: f64) -> Option<Ordering> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if double.is_nan() {
        return None;
    }
    if double >= BOUND {
        return Some(Ordering::Less);
    }
    if double < -BOUND {
        return Some(Ordering::Greater);
    }

    let truncated = double.trunc();
    Some(integer.cmp(&(truncated as i64)).then_with(|| {
        if double > truncated {
            Ordering::Less
        } else if double < truncated {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }))
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::Integer(a), Comparable::Number(b)) | (Comparable::Number(b), Comparable::Integer(a)) => {
                compare_integer(*a, *b) == Some(Ordering::Equal)
            }
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => compare_integer(*a, *b),
            (Comparable::Number(a), Comparable::Integer(b)) => compare_integer(*b, *a).map(Ordering::reverse),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    // Cross-type ordering used for sorting.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Integer(_) | Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Other(_) => 8,
        }
    }

    /// Total order for sorting; values of different types order by type.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

/// Looks up a possibly dotted field path.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = current.as_document()?.get(part)?;
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Evaluates a native filter document against the document.
    pub fn matches(&self, filter: &Document) -> EntityStoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all_of(condition)?.iter().all(|m| *m),
                "$or" => self.all_of(condition)?.iter().any(|m| *m),
                "$nor" => !self.all_of(condition)?.iter().any(|m| *m),
                op if op.starts_with('$') => {
                    return Err(EntityStoreError::InvalidQuery(format!("Unsupported top-level operator {op}")));
                }
                field => matches_condition(lookup(self.document, field), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn all_of(&self, clauses: &Bson) -> EntityStoreResult<Vec<bool>> {
        let clauses = clauses
            .as_array()
            .ok_or_else(|| EntityStoreError::InvalidQuery("Logical operators require an array".to_string()))?;

        clauses
            .iter()
            .map(|clause| match clause {
                Bson::Document(clause) => self.matches(clause),
                other => Err(EntityStoreError::InvalidQuery(format!("Logical clauses must be documents, got {other}"))),
            })
            .collect()
    }
}

fn is_operator_document(condition: &Bson) -> bool {
    condition
        .as_document()
        .and_then(|doc| doc.keys().next())
        .is_some_and(|key| key.starts_with('$'))
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> EntityStoreResult<bool> {
    if !is_operator_document(condition) {
        return Ok(equals(value, condition));
    }

    for (op, operand) in condition.as_document().into_iter().flatten() {
        let matched = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => compares(value, operand, |o| o != Ordering::Less),
            "$lt" => compares(value, operand, |o| o == Ordering::Less),
            "$lte" => compares(value, operand, |o| o != Ordering::Greater),
            "$in" => in_list(value, operand)?,
            "$nin" => !in_list(value, operand)?,
            "$exists" => value.is_some() == entstore_core::query::is_truthy(operand),
            other => {
                return Err(EntityStoreError::InvalidQuery(format!("Unsupported operator {other}")));
            }
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

// Missing fields equal null; array fields match when any element does.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match value {
        None => expected == Comparable::Null,
        Some(value) => {
            let actual = Comparable::from(value);
            if actual == expected {
                return true;
            }
            match actual {
                Comparable::Array(items) => items.iter().any(|item| *item == expected),
                _ => false,
            }
        }
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    let operand = Comparable::from(operand);

    match Comparable::from(value) {
        Comparable::Array(items) => items
            .iter()
            .any(|item| item.partial_cmp(&operand).is_some_and(&accept)),
        actual => actual.partial_cmp(&operand).is_some_and(accept),
    }
}

fn in_list(value: Option<&Bson>, operand: &Bson) -> EntityStoreResult<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| EntityStoreError::InvalidQuery("$in and $nin require an array".to_string()))?;

    Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

//! Native filter evaluation for in-memory documents.
//!
//! This module interprets the BSON filter documents produced by the filter
//! compiler (`field: value`, `$lt`, `$lte`, `$gt`, `$gte`, `$in`, `$regex`, ...)
//! against stored documents, following the store's matching rules: dot-paths
//! reach into embedded documents, array fields match when any element does, and
//! range operators only compare values of the same type bracket.

use std::cmp::Ordering;

use bson::{Bson, DateTime, Document, oid::ObjectId};
use regex::{Regex, RegexBuilder};

use docaccess_core::error::{DocumentStoreError, DocumentStoreResult};

/// Comparable representation of BSON values.
///
/// Numeric types are normalized to `f64` so `Int32(5)`, `Int64(5)` and
/// `Double(5.0)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Values without an ordering or equality in this evaluator.
    Other,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Other,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the store's cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other => 10,
        }
    }

    /// Total order used for sorting, ranking mismatched types by bracket.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dot-path such as `customer.address.city` or `items.0.sku`.
pub(crate) fn resolve_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// The value itself followed by its elements when it is an array.
fn candidates(value: &Bson) -> impl Iterator<Item = &Bson> {
    std::iter::once(value).chain(value.as_array().into_iter().flatten())
}

fn equals(field: Option<&Bson>, target: &Bson) -> bool {
    match field {
        None => matches!(target, Bson::Null),
        Some(value) => {
            let target = Comparable::from(target);
            candidates(value).any(|candidate| Comparable::from(candidate) == target)
        }
    }
}

fn compares(field: Option<&Bson>, target: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let Some(value) = field else {
        return false;
    };
    let target = Comparable::from(target);

    candidates(value).any(|candidate| {
        Comparable::from(candidate)
            .partial_cmp(&target)
            .is_some_and(accept)
    })
}

fn member_of(field: Option<&Bson>, set: &Bson) -> DocumentStoreResult<bool> {
    match set {
        Bson::Array(values) => Ok(values.iter().any(|value| equals(field, value))),
        other => Err(DocumentStoreError::Backend(format!("$in needs an array, got {other}"))),
    }
}

fn build_regex(pattern: &Bson, options: Option<&Bson>) -> DocumentStoreResult<Regex> {
    let (pattern, mut flags) = match pattern {
        Bson::String(pattern) => (pattern.as_str(), String::new()),
        Bson::RegularExpression(regex) => (regex.pattern.as_str(), regex.options.as_str().to_owned()),
        other => {
            return Err(DocumentStoreError::Backend(format!(
                "$regex has to be a string, got {other}"
            )));
        }
    };
    if let Some(Bson::String(options)) = options {
        flags.push_str(options);
    }

    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| DocumentStoreError::Backend(format!("invalid $regex: {e}")))
}

fn matches_pattern(field: Option<&Bson>, regex: &Regex) -> bool {
    field.is_some_and(|value| {
        candidates(value).any(|candidate| candidate.as_str().is_some_and(|s| regex.is_match(s)))
    })
}

fn is_operator_document(condition: &Bson) -> bool {
    condition
        .as_document()
        .and_then(|doc| doc.keys().next())
        .is_some_and(|key| key.starts_with('$'))
}

fn field_matches(field: Option<&Bson>, operators: &Document) -> DocumentStoreResult<bool> {
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$gt" => compares(field, operand, |o| o == Ordering::Greater),
            "$gte" => compares(field, operand, |o| o != Ordering::Less),
            "$lt" => compares(field, operand, |o| o == Ordering::Less),
            "$lte" => compares(field, operand, |o| o != Ordering::Greater),
            "$in" => member_of(field, operand)?,
            "$nin" => !member_of(field, operand)?,
            "$exists" => field.is_some() == docaccess_core::filter::is_truthy(operand),
            "$regex" => matches_pattern(field, &build_regex(operand, operators.get("$options"))?),
            "$options" => true,
            other => {
                return Err(DocumentStoreError::Backend(format!(
                    "unsupported query operator {other}"
                )));
            }
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn all_of(document: &Document, clauses: &Bson) -> DocumentStoreResult<Vec<bool>> {
    clauses
        .as_array()
        .ok_or_else(|| DocumentStoreError::Backend("logical operators need an array".into()))?
        .iter()
        .map(|clause| match clause {
            Bson::Document(clause) => matches(document, clause),
            other => Err(DocumentStoreError::Backend(format!(
                "logical clause has to be a document, got {other}"
            ))),
        })
        .collect()
}

/// Evaluates a native filter document against `document`.
///
/// An empty filter matches every document.
pub(crate) fn matches(document: &Document, filter: &Document) -> DocumentStoreResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => all_of(document, condition)?.into_iter().all(|m| m),
            "$or" => all_of(document, condition)?.into_iter().any(|m| m),
            "$nor" => !all_of(document, condition)?.into_iter().any(|m| m),
            path if path.starts_with('$') => {
                return Err(DocumentStoreError::Backend(format!(
                    "unsupported top-level operator {path}"
                )));
            }
            path => match condition {
                Bson::Document(operators) if is_operator_document(condition) => {
                    field_matches(resolve_path(document, path), operators)?
                }
                value => equals(resolve_path(document, path), value),
            },
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Orders documents by a native sort specification (`{ field: 1 | -1, ... }`).
pub(crate) fn compare_by(sort: &Document, a: &Document, b: &Document) -> Ordering {
    for (field, direction) in sort {
        let left = resolve_path(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = resolve_path(b, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let descending = matches!(Comparable::from(direction), Comparable::Number(n) if n < 0.0);

        let ordering = if descending {
            right.sort_cmp(&left)
        } else {
            left.sort_cmp(&right)
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

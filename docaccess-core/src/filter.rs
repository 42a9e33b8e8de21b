//! Filter triples and their compilation into native store predicates.
//!
//! Callers describe constraints as an ordered list of [`FilterTriple`]s, each a
//! `(field, operator, value)` tuple. [`compile`] folds the list into one BSON
//! filter document understood by the store. The triples are implicitly ANDed;
//! there is no OR composition.
//!
//! Two compilation policies look surprising and are relied upon by callers:
//!
//! - **Falsy values are dropped.** A triple whose value is not [`is_truthy`]
//!   produces no constraint at all. In particular a filter for the literal `0`
//!   cannot be expressed through triples.
//! - **Last write wins per field.** A later triple on the same field replaces the
//!   sub-constraint compiled for an earlier one instead of merging with it.
//!
//! # Example
//!
//! ```ignore
//! use docaccess::filter::{FilterTriple, compile};
//!
//! let filter = compile(&[
//!     FilterTriple::equal("status", "open"),
//!     FilterTriple::between("total", 10, 100),
//!     FilterTriple::contains_text("customer.name", "smith"),
//! ]);
//! // { status: "open", total: { $gt: 10, $lt: 100 },
//! //   "customer.name": { $regex: ".*smith.*", $options: "i" } }
//! ```

use std::{fmt, str::FromStr};

use bson::{Bson, DateTime, Document, doc, ser::serialize_to_bson};
use chrono::DateTime as ChronoDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Comparison operators available to filter triples.
///
/// The set is closed. Each operator serializes to the short token callers use on
/// the wire (`=`, `<`, `>`, `<=`, `>=`, `in`, `like`, `between`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Direct equality.
    Equal,
    /// Strictly less than.
    Less,
    /// Strictly greater than.
    Greater,
    /// Less than or equal to.
    LessOrEqual,
    /// Greater than or equal to.
    GreaterOrEqual,
    /// Field value is a member of the supplied array.
    InSet,
    /// Case-insensitive substring match.
    ContainsText,
    /// Open interval between `value.from` and `value.to`.
    Between,
}

impl Operator {
    /// Returns the wire token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::LessOrEqual => "<=",
            Operator::GreaterOrEqual => ">=",
            Operator::InSet => "in",
            Operator::ContainsText => "like",
            Operator::Between => "between",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Operator {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Operator::Equal),
            "<" => Ok(Operator::Less),
            ">" => Ok(Operator::Greater),
            "<=" => Ok(Operator::LessOrEqual),
            ">=" => Ok(Operator::GreaterOrEqual),
            "in" => Ok(Operator::InSet),
            "like" => Ok(Operator::ContainsText),
            "between" => Ok(Operator::Between),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "unknown filter operator `{other}`"
            ))),
        }
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

/// One `(field, operator, value)` constraint.
///
/// `field` is a dot-path into the document. The expected shape of `value` depends
/// on the operator: an array for [`Operator::InSet`], a `{ from, to }` document for
/// [`Operator::Between`], a scalar or date otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTriple {
    pub field: String,
    pub operator: Operator,
    pub value: Bson,
}

impl FilterTriple {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), operator, value: value.into() }
    }

    /// Builds a triple from a JSON value, e.g. one taken from a request query.
    ///
    /// Extended-JSON values such as `{ "$date": "..." }` are read as their native
    /// BSON type, so dates arrive as `Bson::DateTime`.
    pub fn from_json(
        field: impl Into<String>,
        operator: Operator,
        value: &serde_json::Value,
    ) -> DocumentStoreResult<Self> {
        Ok(Self::new(field, operator, serialize_to_bson(value)?))
    }

    pub fn equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Equal, value)
    }

    pub fn less(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Less, value)
    }

    pub fn less_or_equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::LessOrEqual, value)
    }

    pub fn greater(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Greater, value)
    }

    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::GreaterOrEqual, value)
    }

    /// Membership in a set of values.
    pub fn in_set<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            field,
            Operator::InSet,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn contains_text(field: impl Into<String>, text: impl Into<Bson>) -> Self {
        Self::new(field, Operator::ContainsText, text)
    }

    /// Open interval: both `from` and `to` are excluded.
    pub fn between(field: impl Into<String>, from: impl Into<Bson>, to: impl Into<Bson>) -> Self {
        let (from, to): (Bson, Bson) = (from.into(), to.into());

        Self::new(field, Operator::Between, doc! { "from": from, "to": to })
    }
}

/// Truthiness policy deciding whether a triple takes part in the predicate.
///
/// `Null`, `Undefined`, `false`, numeric zero, `NaN` and the empty string are
/// falsy. Every other value, including empty arrays and documents, is truthy.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0 && !f.is_nan(),
        Bson::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Coerces a comparison operand to a native datetime when it is a temporal object.
///
/// Primitive values pass through unchanged so the same operators serve numeric and
/// string ranges as well as date ranges.
pub fn coerce_temporal(value: &Bson) -> Bson {
    match value {
        Bson::Timestamp(ts) => Bson::DateTime(DateTime::from_millis(i64::from(ts.time) * 1000)),
        Bson::Document(document) if document.len() == 1 => match document.get("$date") {
            Some(Bson::String(s)) => match ChronoDateTime::parse_from_rfc3339(s) {
                Ok(parsed) => Bson::DateTime(DateTime::from_millis(parsed.timestamp_millis())),
                Err(_) => value.clone(),
            },
            Some(Bson::Int64(millis)) => Bson::DateTime(DateTime::from_millis(*millis)),
            Some(Bson::Int32(millis)) => Bson::DateTime(DateTime::from_millis(i64::from(*millis))),
            Some(Bson::Document(canonical)) => match canonical.get("$numberLong") {
                Some(Bson::String(millis)) => millis
                    .parse::<i64>()
                    .map(|millis| Bson::DateTime(DateTime::from_millis(millis)))
                    .unwrap_or_else(|_| value.clone()),
                _ => value.clone(),
            },
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Open-interval constraint for a `{ from, to }` range, or `None` when the range
/// carries no usable bound.
fn between_constraint(range: &Bson) -> Option<Document> {
    let Bson::Document(bounds) = range else {
        return None;
    };
    let mut constraint = Document::new();

    if let Some(from) = bounds.get("from").filter(|b| !matches!(b, Bson::Null | Bson::Undefined)) {
        constraint.insert("$gt", coerce_temporal(from));
    }
    if let Some(to) = bounds.get("to").filter(|b| !matches!(b, Bson::Null | Bson::Undefined)) {
        constraint.insert("$lt", coerce_temporal(to));
    }

    (!constraint.is_empty()).then_some(constraint)
}

fn text_pattern(value: &Bson) -> String {
    let text = match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => f.to_string(),
        other => other.to_string(),
    };

    format!(".*{text}.*")
}

/// Compiles a single triple into the value stored under its field, or `None` when
/// the triple is dropped by the truthiness policy.
pub fn compile_constraint(triple: &FilterTriple) -> Option<Bson> {
    if !is_truthy(&triple.value) {
        return None;
    }

    let value = &triple.value;

    Some(match triple.operator {
        Operator::Equal => value.clone(),
        Operator::Less => Bson::Document(doc! { "$lt": coerce_temporal(value) }),
        Operator::LessOrEqual => Bson::Document(doc! { "$lte": coerce_temporal(value) }),
        Operator::Greater => Bson::Document(doc! { "$gt": coerce_temporal(value) }),
        Operator::GreaterOrEqual => Bson::Document(doc! { "$gte": coerce_temporal(value) }),
        Operator::Between => Bson::Document(between_constraint(value)?),
        Operator::InSet => Bson::Document(doc! { "$in": value.clone() }),
        Operator::ContainsText => Bson::Document(doc! {
            "$regex": text_pattern(value),
            "$options": "i",
        }),
    })
}

/// Compiles an ordered list of triples into one native filter document.
///
/// An empty list compiles to an empty document, which matches every document.
pub fn compile(triples: &[FilterTriple]) -> Document {
    let mut filter = Document::new();

    for triple in triples {
        if let Some(constraint) = compile_constraint(triple) {
            // Replaces any earlier constraint on the same field.
            filter.insert(triple.field.clone(), constraint);
        }
    }

    filter
}

/// Expands identifier parameters into triples.
///
/// Every entry of `ids` becomes an [`Operator::InSet`] triple (its value is the set
/// of accepted identifiers); every entry of `secondary` becomes an
/// [`Operator::Equal`] triple.
pub fn id_set_triples(ids: &Document, secondary: Option<&Document>) -> Vec<FilterTriple> {
    ids.iter()
        .map(|(field, values)| FilterTriple::new(field.as_str(), Operator::InSet, values.clone()))
        .chain(
            secondary
                .into_iter()
                .flat_map(|params| params.iter())
                .map(|(field, value)| FilterTriple::equal(field.as_str(), value.clone())),
        )
        .collect()
}

/// Expands single-valued identifier parameters into [`Operator::Equal`] triples.
pub fn id_triples(ids: &Document) -> Vec<FilterTriple> {
    ids.iter()
        .map(|(field, value)| FilterTriple::equal(field.as_str(), value.clone()))
        .collect()
}

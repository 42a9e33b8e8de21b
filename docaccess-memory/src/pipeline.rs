//! Aggregation pipeline stages for the in-memory store.
//!
//! Supports `$match`, `$sort`, `$skip`, `$limit` and `$group` with `$sum`
//! accumulators. Any other stage is rejected.

use bson::{Bson, Document};

use docaccess_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::evaluator::{Comparable, compare_by, matches, resolve_path};

fn stage_error(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::Backend(message.into())
}

fn count_operand(stage: &str, value: &Bson) -> DocumentStoreResult<usize> {
    let count = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        other => return Err(stage_error(format!("{stage} needs an integer, got {other}"))),
    };

    usize::try_from(count).map_err(|_| stage_error(format!("{stage} cannot be negative")))
}

/// Evaluates a `$field` reference or returns the constant as is.
fn evaluate(document: &Document, expression: &Bson) -> Bson {
    match expression {
        Bson::String(path) if path.starts_with('$') => resolve_path(document, &path[1..])
            .cloned()
            .unwrap_or(Bson::Null),
        constant => constant.clone(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Sum {
    Int(i64),
    Double(f64),
}

impl Sum {
    fn add(self, value: &Bson) -> Self {
        let integral = match value {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            _ => None,
        };

        match (self, integral, value) {
            (Sum::Int(total), Some(n), _) => total
                .checked_add(n)
                .map_or(Sum::Double(total as f64 + n as f64), Sum::Int),
            (Sum::Double(total), Some(n), _) => Sum::Double(total + n as f64),
            (Sum::Int(total), None, Bson::Double(n)) => Sum::Double(total as f64 + n),
            (Sum::Double(total), None, Bson::Double(n)) => Sum::Double(total + n),
            (sum, _, _) => sum,
        }
    }

    fn into_bson(self) -> Bson {
        match self {
            Sum::Int(total) => i32::try_from(total).map_or(Bson::Int64(total), Bson::Int32),
            Sum::Double(total) => Bson::Double(total),
        }
    }
}

struct Accumulator<'a> {
    name: &'a str,
    expression: &'a Bson,
}

fn accumulators(definition: &Document) -> DocumentStoreResult<Vec<Accumulator<'_>>> {
    definition
        .iter()
        .filter(|(name, _)| name.as_str() != "_id")
        .map(|(name, accumulator)| {
            let operator = accumulator
                .as_document()
                .filter(|d| d.len() == 1)
                .and_then(|d| d.iter().next())
                .ok_or_else(|| stage_error(format!("accumulator {name} must be a single operator")))?;

            match (operator.0.as_str(), operator.1) {
                ("$sum", expression) => Ok(Accumulator { name, expression }),
                (other, _) => Err(stage_error(format!("unsupported accumulator {other}"))),
            }
        })
        .collect()
}

fn group(documents: Vec<Document>, definition: &Document) -> DocumentStoreResult<Vec<Document>> {
    let key_expression = definition
        .get("_id")
        .ok_or_else(|| stage_error("$group requires an _id expression"))?;
    let accumulators = accumulators(definition)?;

    // Groups keep the order in which their key was first seen.
    let mut groups: Vec<(Bson, Vec<Sum>)> = Vec::new();

    for document in &documents {
        let key = evaluate(document, key_expression);
        let position = groups
            .iter()
            .position(|(existing, _)| Comparable::from(existing) == Comparable::from(&key));
        let index = match position {
            Some(index) => index,
            None => {
                groups.push((key, vec![Sum::Int(0); accumulators.len()]));
                groups.len() - 1
            }
        };

        for (sum, accumulator) in groups[index].1.iter_mut().zip(&accumulators) {
            *sum = sum.add(&evaluate(document, accumulator.expression));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, sums)| {
            let mut output = Document::new();
            output.insert("_id", key);

            for (sum, accumulator) in sums.into_iter().zip(&accumulators) {
                output.insert(accumulator.name, sum.into_bson());
            }

            output
        })
        .collect())
}

/// Runs `pipeline` over `documents`, stage by stage.
pub(crate) fn run(
    mut documents: Vec<Document>,
    pipeline: &[Document],
) -> DocumentStoreResult<Vec<Document>> {
    for stage in pipeline {
        let (name, operand) = stage
            .iter()
            .next()
            .filter(|_| stage.len() == 1)
            .ok_or_else(|| stage_error("a pipeline stage must have exactly one operator"))?;

        documents = match (name.as_str(), operand) {
            ("$match", Bson::Document(filter)) => {
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if matches(&document, filter)? {
                        kept.push(document);
                    }
                }
                kept
            }
            ("$sort", Bson::Document(sort)) => {
                documents.sort_by(|a, b| compare_by(sort, a, b));
                documents
            }
            ("$skip", count) => {
                let count = count_operand("$skip", count)?;
                documents.into_iter().skip(count).collect()
            }
            ("$limit", count) => {
                let count = count_operand("$limit", count)?;
                if count == 0 {
                    return Err(stage_error("$limit must be positive"));
                }
                documents.into_iter().take(count).collect()
            }
            ("$group", Bson::Document(definition)) => group(documents, definition)?,
            (other, _) => return Err(stage_error(format!("unsupported pipeline stage {other}"))),
        };
    }

    Ok(documents)
}

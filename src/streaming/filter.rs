// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! Conjunctive field filters over dot-pathed JSON data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported predicate operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// Value is one of a set.
    In,
    /// Value is not one of a set.
    NotIn,
    /// String field contains a substring.
    Contains,
    /// String field starts with a prefix.
    StartsWith,
    /// String field ends with a suffix.
    EndsWith,
}

/// A single field predicate. `path` is dot-separated (e.g. `"orbit.apogee_km"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Dotted path into the message data.
    pub path: String,
    /// Operator.
    pub op: FilterOp,
    /// Comparison value (or array of values for `In`/`NotIn`).
    pub value: Value,
}

fn get_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compare_ordering(field: &Value, target: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (numeric(field), numeric(target)) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (field.as_str(), target.as_str()) {
        return Some(a.cmp(b));
    }
    None
}

fn eval_one(field: &Value, filter: &FieldFilter) -> bool {
    match filter.op {
        FilterOp::Eq => field == &filter.value,
        FilterOp::Ne => field != &filter.value,
        FilterOp::Lt => compare_ordering(field, &filter.value) == Some(std::cmp::Ordering::Less),
        FilterOp::Lte => matches!(
            compare_ordering(field, &filter.value),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        FilterOp::Gt => compare_ordering(field, &filter.value) == Some(std::cmp::Ordering::Greater),
        FilterOp::Gte => matches!(
            compare_ordering(field, &filter.value),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
        FilterOp::In => filter.value.as_array().is_some_and(|arr| arr.contains(field)),
        FilterOp::NotIn => !filter.value.as_array().is_some_and(|arr| arr.contains(field)),
        FilterOp::Contains => match (field.as_str(), filter.value.as_str()) {
            (Some(f), Some(v)) => f.contains(v),
            _ => false,
        },
        FilterOp::StartsWith => match (field.as_str(), filter.value.as_str()) {
            (Some(f), Some(v)) => f.starts_with(v),
            _ => false,
        },
        FilterOp::EndsWith => match (field.as_str(), filter.value.as_str()) {
            (Some(f), Some(v)) => f.ends_with(v),
            _ => false,
        },
    }
}

/// Evaluate every filter against `data` (conjunctive: all must pass). A
/// missing field fails the predicate rather than throwing. An empty
/// filter list evaluates to `true`.
pub fn evaluate_filters(filters: &[FieldFilter], data: &Value) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters.iter().all(|f| match get_path(data, &f.path) {
        Some(field) => eval_one(field, f),
        None => false,
    })
}

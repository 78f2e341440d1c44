//! Query execution over a feature set.
//!
//! Evaluation is a single pass: the predicate tree runs against every
//! candidate feature, matches feed the requested aggregations, and the
//! output is plain data for the surrounding layer to serialize. There is
//! no shared state; evaluation over an immutable database is safe to run
//! from any number of workers at once.

use crate::filter::{Aggregation, Query};
use rustc_hash::FxHashMap;
use serde::Serialize;
use skygrid_core::{Feature, Value};

/// Cap on distinct values reported by a `value_counts` aggregation.
///
/// High-cardinality fields get the most frequent values (count desc, value
/// asc), plus the count of distinct values that were cut.
pub const VALUE_COUNTS_CAP: usize = 256;

/// One aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateOutput {
    /// Wire name of the operation.
    pub op: String,

    /// Field the aggregation read, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// The computed value, already in wire form.
    pub value: serde_json::Value,
}

/// Output of a direct (non-tile) query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutput {
    /// Number of features matching the filter.
    pub matched: u64,

    /// Aggregation results, in request order.
    pub aggregates: Vec<AggregateOutput>,
}

/// Ids of the features matching a query's filter, in id order.
pub fn matching_ids(features: &[Feature], query: &Query) -> Vec<u32> {
    features
        .iter()
        .enumerate()
        .filter(|(_, f)| query.filter.matches(&f.properties))
        .map(|(i, _)| i as u32)
        .collect()
}

/// Evaluate a query over the full feature set.
pub fn evaluate(features: &[Feature], query: &Query) -> QueryOutput {
    let matches: Vec<&Feature> = features
        .iter()
        .filter(|f| query.filter.matches(&f.properties))
        .collect();

    let aggregates = query
        .aggregations
        .iter()
        .map(|agg| run_aggregation(agg, &matches))
        .collect();

    QueryOutput {
        matched: matches.len() as u64,
        aggregates,
    }
}

fn run_aggregation(agg: &Aggregation, matches: &[&Feature]) -> AggregateOutput {
    let value = match agg {
        Aggregation::Count { field: None } => serde_json::json!(matches.len()),
        Aggregation::Count { field: Some(f) } => {
            let n = matches.iter().filter(|m| m.property(f).is_some()).count();
            serde_json::json!(n)
        }
        Aggregation::Min { field } => extremum(matches, field, std::cmp::Ordering::Less),
        Aggregation::Max { field } => extremum(matches, field, std::cmp::Ordering::Greater),
        Aggregation::ValueCounts { field } => value_counts(matches, field),
    };
    AggregateOutput {
        op: agg.op_name().to_string(),
        field: agg.field().map(String::from),
        value,
    }
}

/// Min/max by value comparison. Values incomparable with the current best
/// (mixed kinds, NaN) are skipped; no values at all yields null.
fn extremum(matches: &[&Feature], field: &str, keep: std::cmp::Ordering) -> serde_json::Value {
    let mut best: Option<&Value> = None;
    for feature in matches {
        let Some(value) = feature.property(field) else {
            continue;
        };
        match best {
            None => best = Some(value),
            Some(current) => {
                if value.partial_cmp_value(current) == Some(keep) {
                    best = Some(value);
                }
            }
        }
    }
    best.map(Value::to_json).unwrap_or(serde_json::Value::Null)
}

/// Distinct values with occurrence counts.
///
/// Rendered as `{"values": {<value>: count, ...}, "truncated": n}` with
/// values ordered by (count desc, rendered value asc) so the output is
/// deterministic. Numeric values are keyed by their display rendering.
fn value_counts(matches: &[&Feature], field: &str) -> serde_json::Value {
    let mut counts: FxHashMap<String, u64> = FxHashMap::default();
    for feature in matches {
        if let Some(value) = feature.property(field) {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
    }

    let mut ordered: Vec<(String, u64)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let truncated = ordered.len().saturating_sub(VALUE_COUNTS_CAP);
    ordered.truncate(VALUE_COUNTS_CAP);

    let mut values = serde_json::Map::new();
    for (value, count) in ordered {
        values.insert(value, serde_json::json!(count));
    }
    serde_json::json!({"values": values, "truncated": truncated})
}

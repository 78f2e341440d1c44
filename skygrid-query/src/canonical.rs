//! Canonical form and hashing of queries.
//!
//! Two structurally equivalent filters must collapse to one query hash, so
//! hashing never runs over the spec as received. Instead the parsed tree is
//! rendered into a canonical JSON encoding: object keys in a fixed order,
//! combinator children sorted by their own canonical encoding and
//! deduplicated. The hash binds the query to the database it targets by
//! embedding the database content hash in the hashed payload, so a query
//! hash can never alias across database revisions.

use crate::filter::{Aggregation, FilterNode, Query};
use serde_json::{json, Value as Json};
use skygrid_core::hash_payload;

/// Render a filter node into canonical JSON.
pub fn canonical_filter(node: &FilterNode) -> Json {
    match node {
        FilterNode::Compare { field, op, value } => {
            json!({"field": field, "op": op.name(), "value": value.to_json()})
        }
        FilterNode::In { field, values } => {
            let mut rendered: Vec<String> = values
                .iter()
                .map(|v| v.to_json().to_string())
                .collect();
            rendered.sort_unstable();
            rendered.dedup();
            let values: Vec<Json> = rendered
                .iter()
                .map(|s| serde_json::from_str(s).unwrap_or(Json::Null))
                .collect();
            json!({"field": field, "op": "in", "values": values})
        }
        FilterNode::All(children) => json!({"all": canonical_children(children)}),
        FilterNode::Any(children) => json!({"any": canonical_children(children)}),
        FilterNode::Not(child) => json!({"not": canonical_filter(child)}),
    }
}

/// Canonicalize combinator children: each child canonicalized, then the
/// list sorted by encoding and deduplicated.
fn canonical_children(children: &[FilterNode]) -> Vec<Json> {
    let mut rendered: Vec<String> = children
        .iter()
        .map(|c| canonical_filter(c).to_string())
        .collect();
    rendered.sort_unstable();
    rendered.dedup();
    rendered
        .iter()
        .map(|s| serde_json::from_str(s).unwrap_or(Json::Null))
        .collect()
}

fn canonical_aggregation(agg: &Aggregation) -> Json {
    match agg.field() {
        Some(field) => json!({"op": agg.op_name(), "field": field}),
        None => json!({"op": agg.op_name()}),
    }
}

/// Render a whole query into canonical JSON, bound to a database hash.
///
/// Aggregation order is preserved: result order is part of the contract,
/// so `[count, min]` and `[min, count]` are different queries.
pub fn canonical_query(query: &Query, database_hash: &str) -> Json {
    json!({
        "database": database_hash,
        "filter": canonical_filter(&query.filter),
        "aggregations": query
            .aggregations
            .iter()
            .map(canonical_aggregation)
            .collect::<Vec<_>>(),
    })
}

/// Compute the query hash for a parsed query against a database.
pub fn query_hash(query: &Query, database_hash: &str) -> String {
    hash_payload(canonical_query(query, database_hash).to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skygrid_core::FieldSchema;

    fn schema() -> FieldSchema {
        serde_json::from_value(serde_json::json!({
            "fields": [
                {"name": "a", "type": "number"},
                {"name": "b", "type": "number"}
            ]
        }))
        .unwrap()
    }

    fn parse(spec: serde_json::Value) -> Query {
        Query::parse(&spec, &schema()).unwrap()
    }

    #[test]
    fn test_reordered_filters_share_a_hash() {
        let q1 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "eq", "value": 1.0},
            {"field": "b", "op": "lt", "value": 2.0}
        ]}));
        let q2 = parse(serde_json::json!({"constraints": [
            {"field": "b", "op": "lt", "value": 2.0},
            {"field": "a", "op": "eq", "value": 1.0}
        ]}));
        assert_eq!(query_hash(&q1, "db1"), query_hash(&q2, "db1"));
    }

    #[test]
    fn test_duplicate_constraints_collapse() {
        let q1 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "eq", "value": 1.0},
            {"field": "a", "op": "eq", "value": 1.0}
        ]}));
        let q2 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "eq", "value": 1.0}
        ]}));
        assert_eq!(query_hash(&q1, "db1"), query_hash(&q2, "db1"));
    }

    #[test]
    fn test_different_filters_differ() {
        let q1 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "eq", "value": 1.0}
        ]}));
        let q2 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "eq", "value": 2.0}
        ]}));
        assert_ne!(query_hash(&q1, "db1"), query_hash(&q2, "db1"));
    }

    #[test]
    fn test_hash_is_bound_to_database() {
        let q = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "eq", "value": 1.0}
        ]}));
        assert_ne!(query_hash(&q, "db1"), query_hash(&q, "db2"));
    }

    #[test]
    fn test_membership_values_are_order_insensitive() {
        let q1 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "in", "values": [1.0, 2.0]}
        ]}));
        let q2 = parse(serde_json::json!({"constraints": [
            {"field": "a", "op": "in", "values": [2.0, 1.0, 2.0]}
        ]}));
        assert_eq!(query_hash(&q1, "db1"), query_hash(&q2, "db1"));
    }

    #[test]
    fn test_aggregation_order_is_preserved() {
        let q1 = parse(serde_json::json!({"aggregations": [
            {"op": "count"}, {"op": "min", "field": "a"}
        ]}));
        let q2 = parse(serde_json::json!({"aggregations": [
            {"op": "min", "field": "a"}, {"op": "count"}
        ]}));
        assert_ne!(query_hash(&q1, "db1"), query_hash(&q2, "db1"));
    }
}

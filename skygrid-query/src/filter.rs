//! Filter specs and the tagged predicate tree.
//!
//! Callers submit loosely-shaped JSON filter specs. They are parsed exactly
//! once into [`FilterNode`] — a tagged tree of comparisons, membership tests
//! and boolean combinators — and validated against the field schema before
//! any evaluation. Everything downstream works on the tree, never on raw
//! JSON.
//!
//! # Wire shape
//!
//! ```json
//! {
//!   "constraints": [
//!     {"field": "telescope", "op": "eq", "value": "HST"},
//!     {"field": "band", "op": "in", "values": ["g", "r"]},
//!     {"any": [
//!       {"field": "mag_limit", "op": "gte", "value": 24.0},
//!       {"not": {"field": "mode", "op": "eq", "value": "grism"}}
//!     ]}
//!   ],
//!   "aggregations": [
//!     {"op": "count"},
//!     {"op": "min", "field": "obs_date"},
//!     {"op": "value_counts", "field": "band"}
//!   ]
//! }
//! ```
//!
//! The `constraints` array is an implicit `all`. An absent or empty array
//! matches every feature.
//!
//! # Evaluation semantics
//!
//! Two-valued logic. A missing property or a comparison across kinds
//! (string vs number) yields `false` — except `ne`, which is the negation
//! of `eq` and therefore yields `true` there. `not` negates whatever its
//! child produced.

use crate::error::{QueryError, Result};
use serde_json::Value as Json;
use skygrid_core::{FieldSchema, Value};
use std::collections::BTreeMap;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// Parse from the wire name.
    pub fn parse(s: &str) -> Option<CompareOp> {
        match s {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            _ => None,
        }
    }

    /// The wire name.
    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
        }
    }
}

/// A parsed filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Compare a field against a constant.
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Field value is one of the listed constants.
    In { field: String, values: Vec<Value> },
    /// All children match (true when empty).
    All(Vec<FilterNode>),
    /// At least one child matches (false when empty).
    Any(Vec<FilterNode>),
    /// Child does not match.
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// Parse one node from its JSON shape.
    pub fn parse(json: &Json) -> Result<FilterNode> {
        let obj = json
            .as_object()
            .ok_or_else(|| QueryError::InvalidFilter("constraint is not an object".into()))?;

        if let Some(children) = obj.get("all") {
            return Ok(FilterNode::All(Self::parse_children(children, "all")?));
        }
        if let Some(children) = obj.get("any") {
            return Ok(FilterNode::Any(Self::parse_children(children, "any")?));
        }
        if let Some(child) = obj.get("not") {
            return Ok(FilterNode::Not(Box::new(FilterNode::parse(child)?)));
        }

        let field = obj
            .get("field")
            .and_then(|f| f.as_str())
            .ok_or_else(|| QueryError::InvalidFilter("constraint without field".into()))?
            .to_string();
        let op = obj
            .get("op")
            .and_then(|o| o.as_str())
            .ok_or_else(|| QueryError::InvalidFilter(format!("field {field}: missing op")))?;

        if op == "in" {
            let values = obj
                .get("values")
                .and_then(|v| v.as_array())
                .ok_or_else(|| {
                    QueryError::InvalidFilter(format!("field {field}: 'in' needs a values array"))
                })?
                .iter()
                .map(|v| {
                    Value::from_json(v).ok_or_else(|| {
                        QueryError::InvalidFilter(format!("field {field}: non-scalar in values"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(FilterNode::In { field, values });
        }

        let op = CompareOp::parse(op)
            .ok_or_else(|| QueryError::InvalidFilter(format!("unknown op: {op}")))?;
        let value = obj
            .get("value")
            .and_then(Value::from_json)
            .ok_or_else(|| {
                QueryError::InvalidFilter(format!("field {field}: missing or non-scalar value"))
            })?;
        Ok(FilterNode::Compare { field, op, value })
    }

    fn parse_children(json: &Json, combinator: &str) -> Result<Vec<FilterNode>> {
        json.as_array()
            .ok_or_else(|| QueryError::InvalidFilter(format!("'{combinator}' is not an array")))?
            .iter()
            .map(FilterNode::parse)
            .collect()
    }

    /// Validate every referenced field against the schema.
    pub fn validate(&self, schema: &FieldSchema) -> Result<()> {
        match self {
            FilterNode::Compare { field, .. } | FilterNode::In { field, .. } => {
                if schema.has_field(field) {
                    Ok(())
                } else {
                    Err(QueryError::UnknownField(field.clone()))
                }
            }
            FilterNode::All(children) | FilterNode::Any(children) => {
                children.iter().try_for_each(|c| c.validate(schema))
            }
            FilterNode::Not(child) => child.validate(schema),
        }
    }

    /// Evaluate against one feature's properties.
    pub fn matches(&self, props: &BTreeMap<String, Value>) -> bool {
        match self {
            FilterNode::Compare { field, op, value } => {
                let actual = props.get(field);
                match op {
                    CompareOp::Eq => actual == Some(value),
                    CompareOp::Ne => actual != Some(value),
                    CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => actual
                        .and_then(|a| a.partial_cmp_value(value))
                        .is_some_and(|ord| match op {
                            CompareOp::Lt => ord.is_lt(),
                            CompareOp::Lte => ord.is_le(),
                            CompareOp::Gt => ord.is_gt(),
                            CompareOp::Gte => ord.is_ge(),
                            _ => unreachable!(),
                        }),
                }
            }
            FilterNode::In { field, values } => props
                .get(field)
                .map(|actual| values.contains(actual))
                .unwrap_or(false),
            FilterNode::All(children) => children.iter().all(|c| c.matches(props)),
            FilterNode::Any(children) => children.iter().any(|c| c.matches(props)),
            FilterNode::Not(child) => !child.matches(props),
        }
    }
}

/// Aggregation operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Count matching features; with a field, count features carrying it.
    Count { field: Option<String> },
    /// Minimum field value among matches.
    Min { field: String },
    /// Maximum field value among matches.
    Max { field: String },
    /// Distinct field values with occurrence counts (capped).
    ValueCounts { field: String },
}

impl Aggregation {
    /// Parse one aggregation from its JSON shape.
    pub fn parse(json: &Json) -> Result<Aggregation> {
        let obj = json
            .as_object()
            .ok_or_else(|| QueryError::InvalidAggregation("aggregation is not an object".into()))?;
        let op = obj
            .get("op")
            .and_then(|o| o.as_str())
            .ok_or_else(|| QueryError::InvalidAggregation("aggregation without op".into()))?;
        let field = obj.get("field").and_then(|f| f.as_str()).map(String::from);
        let required = |field: Option<String>| {
            field.ok_or_else(|| QueryError::InvalidAggregation(format!("'{op}' needs a field")))
        };
        match op {
            "count" => Ok(Aggregation::Count { field }),
            "min" => Ok(Aggregation::Min {
                field: required(field)?,
            }),
            "max" => Ok(Aggregation::Max {
                field: required(field)?,
            }),
            "value_counts" => Ok(Aggregation::ValueCounts {
                field: required(field)?,
            }),
            other => Err(QueryError::InvalidAggregation(format!(
                "unknown aggregation: {other}"
            ))),
        }
    }

    /// The field this aggregation reads, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Aggregation::Count { field } => field.as_deref(),
            Aggregation::Min { field }
            | Aggregation::Max { field }
            | Aggregation::ValueCounts { field } => Some(field),
        }
    }

    /// The wire name of the operation.
    pub fn op_name(&self) -> &'static str {
        match self {
            Aggregation::Count { .. } => "count",
            Aggregation::Min { .. } => "min",
            Aggregation::Max { .. } => "max",
            Aggregation::ValueCounts { .. } => "value_counts",
        }
    }
}

/// A fully parsed and validated query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Root predicate (implicit `all` over the spec's constraints).
    pub filter: FilterNode,

    /// Requested aggregations, in request order.
    pub aggregations: Vec<Aggregation>,
}

impl Query {
    /// Parse a spec and validate it against the schema.
    pub fn parse(spec: &Json, schema: &FieldSchema) -> Result<Query> {
        let obj = spec
            .as_object()
            .ok_or_else(|| QueryError::InvalidFilter("query spec is not an object".into()))?;

        let constraints = match obj.get("constraints") {
            None => Vec::new(),
            Some(c) => FilterNode::parse_children(c, "constraints")?,
        };
        let filter = FilterNode::All(constraints);
        filter.validate(schema)?;

        let aggregations = match obj.get("aggregations") {
            None => Vec::new(),
            Some(Json::Array(items)) => items
                .iter()
                .map(Aggregation::parse)
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(QueryError::InvalidAggregation(
                    "'aggregations' is not an array".into(),
                ))
            }
        };
        for agg in &aggregations {
            if let Some(field) = agg.field() {
                if !schema.has_field(field) {
                    return Err(QueryError::UnknownField(field.to_string()));
                }
            }
        }

        Ok(Query {
            filter,
            aggregations,
        })
    }
}

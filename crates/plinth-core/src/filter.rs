//! Structured filter/sort/pagination description for index queries.
//!
//! This module describes constraints; executing them belongs to storage
//! translators. The top-level filter value is a list of OR-groups, each
//! group a list of AND-conditions. The row-matching functions here are the
//! reference semantics those translators must honor, and what the
//! in-memory store uses directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SQL-style comparison operators supported by every storage translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "not like")]
    NotLike,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

/// Scalar comparison operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Filter operand — a scalar, or a scalar list for `in` / `not in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(Scalar),
    Many(Vec<Scalar>),
}

/// A single field condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFilter {
    pub field: String,
    pub operator: FilterOp,
    pub value: FilterValue,
}

/// An AND-group: every condition must hold.
pub type ComplexDataFilter = Vec<DataFilter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyType {
    Tag,
    Category,
}

/// Taxonomy selector — a direct taxonomy id, or a `{type, slug}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaxonomyFilter {
    Id {
        #[serde(rename = "taxonomyId")]
        taxonomy_id: String,
    },
    Slug {
        #[serde(rename = "type")]
        kind: TaxonomyType,
        slug: String,
    },
}

/// Filter/sort/pagination description for list-style queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// OR-combined list of AND-groups. Empty means "no constraint".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<ComplexDataFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<TaxonomyFilter>,
}

/// Index query echoed back with result counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMeta {
    #[serde(flatten)]
    pub query: IndexQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_count: Option<u64>,
}

impl DataFilter {
    /// Whether a JSON row satisfies this condition. Rows without the field
    /// match nothing, same as SQL null semantics.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(&self.field) else {
            return false;
        };
        match self.operator {
            FilterOp::Eq => self.single().is_some_and(|s| scalar_eq(field, s)),
            FilterOp::NotEq => self.single().is_some_and(|s| !scalar_eq(field, s)),
            FilterOp::Gt => self.compare(field, |ord| ord == std::cmp::Ordering::Greater),
            FilterOp::Lt => self.compare(field, |ord| ord == std::cmp::Ordering::Less),
            FilterOp::Gte => self.compare(field, |ord| ord != std::cmp::Ordering::Less),
            FilterOp::Lte => self.compare(field, |ord| ord != std::cmp::Ordering::Greater),
            FilterOp::Like => self.single().is_some_and(|s| like_match(field, s)),
            FilterOp::NotLike => self.single().is_some_and(|s| !like_match(field, s)),
            FilterOp::In => self.list().iter().any(|s| scalar_eq(field, s)),
            FilterOp::NotIn => !self.list().iter().any(|s| scalar_eq(field, s)),
        }
    }

    fn single(&self) -> Option<&Scalar> {
        match &self.value {
            FilterValue::One(scalar) => Some(scalar),
            FilterValue::Many(_) => None,
        }
    }

    /// `in`/`not in` accept a bare scalar as a one-element list.
    fn list(&self) -> &[Scalar] {
        match &self.value {
            FilterValue::One(scalar) => std::slice::from_ref(scalar),
            FilterValue::Many(scalars) => scalars.as_slice(),
        }
    }

    fn compare(&self, field: &Value, check: impl Fn(std::cmp::Ordering) -> bool) -> bool {
        self.single()
            .and_then(|s| scalar_cmp(field, s))
            .is_some_and(check)
    }
}

fn scalar_eq(field: &Value, scalar: &Scalar) -> bool {
    match (field, scalar) {
        (Value::String(a), Scalar::Text(b)) => a == b,
        (Value::Number(a), Scalar::Number(b)) => a.as_f64() == Some(*b),
        (Value::Bool(a), Scalar::Bool(b)) => a == b,
        _ => false,
    }
}

fn scalar_cmp(field: &Value, scalar: &Scalar) -> Option<std::cmp::Ordering> {
    match (field, scalar) {
        (Value::Number(a), Scalar::Number(b)) => a.as_f64()?.partial_cmp(b),
        (Value::String(a), Scalar::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

/// Case-insensitive `like` with `%` wildcards at either end.
fn like_match(field: &Value, scalar: &Scalar) -> bool {
    let (Value::String(haystack), Scalar::Text(pattern)) = (field, scalar) else {
        return false;
    };
    let haystack = haystack.to_lowercase();
    let pattern = pattern.to_lowercase();
    match (pattern.starts_with('%'), pattern.ends_with('%')) {
        (true, true) => haystack.contains(pattern.trim_matches('%')),
        (true, false) => haystack.ends_with(pattern.trim_start_matches('%')),
        (false, true) => haystack.starts_with(pattern.trim_end_matches('%')),
        (false, false) => haystack == pattern,
    }
}

/// Every condition in the group must hold (AND).
pub fn group_matches(group: &[DataFilter], row: &Value) -> bool {
    group.iter().all(|filter| filter.matches(row))
}

/// Any group may hold (OR of AND-groups). An empty filter list constrains
/// nothing — it matches every row, not no rows.
pub fn filters_match(filters: &[ComplexDataFilter], row: &Value) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters.iter().any(|group| group_matches(group, row))
}

impl IndexQuery {
    /// Reference execution over in-memory JSON rows: filter, sort,
    /// paginate. Returns the page plus the total matched count.
    ///
    /// Taxonomy selection is left to storage translators that model
    /// taxonomies; it is ignored here.
    pub fn apply(&self, rows: &[Value]) -> (Vec<Value>, u64) {
        let mut matched: Vec<Value> = rows
            .iter()
            .filter(|row| {
                self.filters
                    .as_deref()
                    .map(|filters| filters_match(filters, row))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if let Some(order_by) = &self.order_by {
            matched.sort_by(|a, b| json_field_cmp(a, b, order_by));
            if self.order == Some(Order::Desc) {
                matched.reverse();
            }
        }

        let count = matched.len() as u64;
        let offset = self.offset.unwrap_or(0) as usize;
        let page: Vec<Value> = match self.limit {
            Some(limit) => matched.into_iter().skip(offset).take(limit as usize).collect(),
            None => matched.into_iter().skip(offset).collect(),
        };
        (page, count)
    }

    /// Echo this query as result metadata.
    pub fn into_meta(self, count: u64) -> IndexMeta {
        IndexMeta {
            query: self,
            count: Some(count),
            changed_count: None,
        }
    }
}

fn json_field_cmp(a: &Value, b: &Value, field: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

//! Storage collaborator contract.
//!
//! The storage engine itself is external; units only see this port. Tables
//! are named, rows are JSON objects, and list operations take an
//! [`IndexQuery`] whose semantics are defined in [`crate::filter`].
//! [`MemStore`] is the in-process reference backend used by tests and
//! demos.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::filter::{filters_match, IndexQuery};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Query/insert/update/delete against named tables.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Rows matching the query (paginated) plus the total matched count.
    async fn select(
        &self,
        table: &str,
        query: &IndexQuery,
    ) -> Result<(Vec<Value>, u64), StoreError>;

    /// Insert a new row. Returns the stored row with assigned fields.
    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError>;

    /// Insert, or update the existing row sharing the natural key field.
    /// Calling twice with the same key value must keep a single row and
    /// return the same identifying `id`.
    async fn upsert(
        &self,
        table: &str,
        key_field: &str,
        record: Value,
    ) -> Result<Value, StoreError>;

    /// Patch all rows matching the query. Returns the changed count.
    async fn update(
        &self,
        table: &str,
        query: &IndexQuery,
        patch: Value,
    ) -> Result<u64, StoreError>;

    /// Delete all rows matching the query. Returns the deleted count.
    async fn delete(&self, table: &str, query: &IndexQuery) -> Result<u64, StoreError>;
}

/// In-memory `DataStore` over a table → rows map.
///
/// Assigns `id`, `createdAt`, and `updatedAt` on insert. Filter evaluation
/// follows the reference semantics in [`crate::filter`].
#[derive(Default)]
pub struct MemStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn as_object(record: Value) -> Result<serde_json::Map<String, Value>, StoreError> {
    match record {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn merge_into(row: &mut Value, patch: &serde_json::Map<String, Value>) {
    if let Value::Object(existing) = row {
        for (key, value) in patch {
            // Assigned bookkeeping fields are not patchable.
            if key == "id" || key == "createdAt" {
                continue;
            }
            existing.insert(key.clone(), value.clone());
        }
        existing.insert("updatedAt".into(), Value::String(Utc::now().to_rfc3339()));
    }
}

fn matches(query: &IndexQuery, row: &Value) -> bool {
    query
        .filters
        .as_deref()
        .map(|filters| filters_match(filters, row))
        .unwrap_or(true)
}

/// Assign bookkeeping fields to a fresh row.
fn stamp_new_row(mut record: serde_json::Map<String, Value>) -> Value {
    let now = Utc::now().to_rfc3339();
    record
        .entry("id".to_string())
        .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    record.insert("createdAt".into(), Value::String(now.clone()));
    record.insert("updatedAt".into(), Value::String(now));
    Value::Object(record)
}

#[async_trait]
impl DataStore for MemStore {
    async fn select(
        &self,
        table: &str,
        query: &IndexQuery,
    ) -> Result<(Vec<Value>, u64), StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(query.apply(rows))
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        let row = stamp_new_row(as_object(record)?);
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn upsert(
        &self,
        table: &str,
        key_field: &str,
        record: Value,
    ) -> Result<Value, StoreError> {
        let record = as_object(record)?;
        let key = record.get(key_field).cloned().ok_or_else(|| {
            StoreError::Malformed(format!("upsert record is missing key field '{}'", key_field))
        })?;

        // Find-or-insert under one held guard so two concurrent upserts of
        // the same natural key cannot both miss and both insert.
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(row) = rows.iter_mut().find(|row| row.get(key_field) == Some(&key)) {
            merge_into(row, &record);
            return Ok(row.clone());
        }

        let row = stamp_new_row(record);
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        query: &IndexQuery,
        patch: Value,
    ) -> Result<u64, StoreError> {
        let patch = as_object(patch)?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut changed = 0;
        for row in rows.iter_mut().filter(|row| matches(query, row)) {
            merge_into(row, &patch);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete(&self, table: &str, query: &IndexQuery) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches(query, row));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DataFilter, FilterOp, FilterValue, Scalar};
    use serde_json::json;

    fn by_field(field: &str, value: &str) -> IndexQuery {
        IndexQuery {
            filters: Some(vec![vec![DataFilter {
                field: field.into(),
                operator: FilterOp::Eq,
                value: FilterValue::One(Scalar::Text(value.into())),
            }]]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = MemStore::new();
        let row = store
            .insert("certs", json!({ "hostname": "a.test" }))
            .await
            .unwrap();
        assert!(row["id"].is_string());
        assert!(row["createdAt"].is_string());
        assert_eq!(row["hostname"], "a.test");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_natural_key() {
        let store = MemStore::new();
        let first = store
            .upsert("certs", "hostname", json!({ "hostname": "a.test", "status": "pending" }))
            .await
            .unwrap();
        let second = store
            .upsert("certs", "hostname", json!({ "hostname": "a.test", "status": "issued" }))
            .await
            .unwrap();

        assert_eq!(first["id"], second["id"]);
        assert_eq!(second["status"], "issued");

        let (rows, count) = store
            .select("certs", &by_field("hostname", "a.test"))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_one_row_per_key() {
        let store = std::sync::Arc::new(MemStore::new());

        let mut handles = Vec::new();
        for attempt in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert(
                        "certs",
                        "hostname",
                        json!({ "hostname": "a.test", "attempt": attempt }),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap()["id"].clone());
        }
        let first = ids[0].clone();
        assert!(
            ids.iter().all(|id| *id == first),
            "every upsert must resolve to the same row"
        );

        let (rows, count) = store
            .select("certs", &by_field("hostname", "a.test"))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_requires_key_field() {
        let store = MemStore::new();
        let err = store
            .upsert("certs", "hostname", json!({ "status": "pending" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("hostname"));
    }

    #[tokio::test]
    async fn test_update_and_delete_by_filter() {
        let store = MemStore::new();
        store.insert("subs", json!({ "email": "a@b.c", "seen": "no" })).await.unwrap();
        store.insert("subs", json!({ "email": "d@e.f", "seen": "no" })).await.unwrap();

        let changed = store
            .update("subs", &by_field("email", "a@b.c"), json!({ "seen": "yes" }))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let deleted = store
            .delete("subs", &by_field("seen", "no"))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let (rows, _) = store.select("subs", &IndexQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["seen"], "yes");
    }

    #[tokio::test]
    async fn test_select_missing_table_is_empty_not_error() {
        let store = MemStore::new();
        let (rows, count) = store.select("ghost", &IndexQuery::default()).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(count, 0);
    }
}

//! Default `StoreGateway`: a lock-protected in-memory map. Used by every
//! crate's test suite, and in production when the `sql` feature is off,
//! the same "works standalone, upgrades to Postgres" posture the teacher's
//! `agentkern-gate` takes with its optional backend.

use std::collections::HashMap;

use async_trait::async_trait;
use compliance_errors::{ComplianceError, ErrorKind};
use parking_lot::RwLock;
use serde_json::Value;

use crate::gateway::StoreGateway;

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<(String, Value)>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    async fn put(&self, kind: &str, key: &str, value: Value) -> Result<(), ComplianceError> {
        let mut tables = self.tables.write();
        let rows = tables.entry(kind.to_string()).or_default();
        if let Some(slot) = rows.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            rows.push((key.to_string(), value));
        }
        Ok(())
    }

    async fn get(&self, kind: &str, key: &str) -> Result<Option<Value>, ComplianceError> {
        let tables = self.tables.read();
        Ok(tables
            .get(kind)
            .and_then(|rows| rows.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone()))
    }

    async fn delete(&self, kind: &str, key: &str) -> Result<bool, ComplianceError> {
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(kind) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|(k, _)| k != key);
        Ok(rows.len() != before)
    }

    async fn list(&self, kind: &str) -> Result<Vec<(String, Value)>, ComplianceError> {
        let tables = self.tables.read();
        Ok(tables.get(kind).cloned().unwrap_or_default())
    }

    async fn compare_and_swap(
        &self,
        kind: &str,
        key: &str,
        expected: Option<Value>,
        new_value: Value,
    ) -> Result<bool, ComplianceError> {
        let mut tables = self.tables.write();
        let rows = tables.entry(kind.to_string()).or_default();
        let current = rows.iter().position(|(k, _)| k == key).map(|i| rows[i].1.clone());
        if current != expected {
            return Err(ComplianceError::new(
                ErrorKind::Conflict,
                "compliance-store",
                "compare_and_swap",
                format!("stored value for {kind}/{key} changed since it was read"),
            ));
        }
        match rows.iter().position(|(k, _)| k == key) {
            Some(i) => rows[i].1 = new_value,
            None => rows.push((key.to_string(), new_value)),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.put("rules", "r1", json!({"name": "rule one"})).await.unwrap();
        let got = store.get("rules", "r1").await.unwrap();
        assert_eq!(got, Some(json!({"name": "rule one"})));
    }

    #[tokio::test]
    async fn list_returns_all_rows_for_kind() {
        let store = InMemoryStore::new();
        store.put("changes", "c1", json!(1)).await.unwrap();
        store.put("changes", "c2", json!(2)).await.unwrap();
        store.put("rules", "r1", json!(3)).await.unwrap();
        let rows = store.list("changes").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let store = InMemoryStore::new();
        store.put("rules", "r1", json!(1)).await.unwrap();
        assert!(store.delete("rules", "r1").await.unwrap());
        assert!(!store.delete("rules", "r1").await.unwrap());
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_expectation() {
        let store = InMemoryStore::new();
        store.put("changes", "c1", json!({"status": "pending"})).await.unwrap();
        let ok = store
            .compare_and_swap("changes", "c1", Some(json!({"status": "pending"})), json!({"status": "approved"}))
            .await
            .unwrap();
        assert!(ok);

        let stale = store
            .compare_and_swap("changes", "c1", Some(json!({"status": "pending"})), json!({"status": "rejected"}))
            .await;
        assert!(stale.is_err());
    }
}

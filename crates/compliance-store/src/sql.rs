//! Postgres/SQLite-backed `StoreGateway`, gated behind the `sql` feature.
//! Mirrors `agentkern-gate`'s use of `sqlx::AnyPool` to stay agnostic over
//! the two backends the teacher supports; every row lives in one
//! `store_entries` table keyed by `(kind, key)` since this crate never
//! needs to reason about table shape, only opaque JSON values.

use async_trait::async_trait;
use compliance_errors::{ComplianceError, ErrorKind};
use serde_json::Value;
use sqlx::{AnyPool, Row};

use crate::gateway::StoreGateway;

pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    pub async fn connect(database_url: &str) -> Result<Self, ComplianceError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPool::connect(database_url)
            .await
            .map_err(|e| ComplianceError::new(ErrorKind::Database, "compliance-store", "connect", e.to_string()))?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_entries (\
                kind TEXT NOT NULL, \
                key TEXT NOT NULL, \
                value TEXT NOT NULL, \
                PRIMARY KEY (kind, key)\
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ComplianceError::new(ErrorKind::Database, "compliance-store", "migrate", e.to_string()))?;
        Ok(Self { pool })
    }
}

fn db_err(operation: &str, e: sqlx::Error) -> ComplianceError {
    ComplianceError::new(ErrorKind::Database, "compliance-store", operation, e.to_string())
}

#[async_trait]
impl StoreGateway for SqlStore {
    async fn put(&self, kind: &str, key: &str, value: Value) -> Result<(), ComplianceError> {
        let text = value.to_string();
        sqlx::query(
            "INSERT INTO store_entries (kind, key, value) VALUES ($1, $2, $3) \
             ON CONFLICT (kind, key) DO UPDATE SET value = excluded.value",
        )
        .bind(kind)
        .bind(key)
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("put", e))?;
        Ok(())
    }

    async fn get(&self, kind: &str, key: &str) -> Result<Option<Value>, ComplianceError> {
        let row = sqlx::query("SELECT value FROM store_entries WHERE kind = $1 AND key = $2")
            .bind(kind)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("get", e))?;
        Ok(match row {
            Some(row) => {
                let text: String = row.try_get("value").map_err(|e| db_err("get", e))?;
                Some(serde_json::from_str(&text).map_err(|e| {
                    ComplianceError::new(ErrorKind::Database, "compliance-store", "get", e.to_string())
                })?)
            }
            None => None,
        })
    }

    async fn delete(&self, kind: &str, key: &str) -> Result<bool, ComplianceError> {
        let result = sqlx::query("DELETE FROM store_entries WHERE kind = $1 AND key = $2")
            .bind(kind)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, kind: &str) -> Result<Vec<(String, Value)>, ComplianceError> {
        let rows = sqlx::query("SELECT key, value FROM store_entries WHERE kind = $1")
            .bind(kind)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list", e))?;
        rows.into_iter()
            .map(|row| {
                let key: String = row.try_get("key").map_err(|e| db_err("list", e))?;
                let text: String = row.try_get("value").map_err(|e| db_err("list", e))?;
                let value = serde_json::from_str(&text)
                    .map_err(|e| ComplianceError::new(ErrorKind::Database, "compliance-store", "list", e.to_string()))?;
                Ok((key, value))
            })
            .collect()
    }

    async fn compare_and_swap(
        &self,
        kind: &str,
        key: &str,
        expected: Option<Value>,
        new_value: Value,
    ) -> Result<bool, ComplianceError> {
        let current = self.get(kind, key).await?;
        if current != expected {
            return Err(ComplianceError::new(
                ErrorKind::Conflict,
                "compliance-store",
                "compare_and_swap",
                format!("stored value for {kind}/{key} changed since it was read"),
            ));
        }
        self.put(kind, key, new_value).await?;
        Ok(true)
    }
}

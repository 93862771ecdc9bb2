//! The transactional key/query surface every pillar persists through.
//! Deliberately narrow: a `kind` namespace (rules, changes, snapshots,
//! rollback requests, translation rules, ...) plus a string key, mirroring
//! how `agentkern-gate` treats its backing store as an opaque row store
//! rather than modeling each table as its own Rust type at this layer.

use async_trait::async_trait;
use compliance_errors::ComplianceError;
use serde_json::Value;

#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Inserts or overwrites `kind/key`. Whole-value replace, not a merge.
    async fn put(&self, kind: &str, key: &str, value: Value) -> Result<(), ComplianceError>;

    async fn get(&self, kind: &str, key: &str) -> Result<Option<Value>, ComplianceError>;

    async fn delete(&self, kind: &str, key: &str) -> Result<bool, ComplianceError>;

    /// All values under `kind`, in insertion order.
    async fn list(&self, kind: &str) -> Result<Vec<(String, Value)>, ComplianceError>;

    /// Atomically replaces `kind/key` only if the stored value still
    /// satisfies `expected`'s equality, used by the audit pillar to guard
    /// approve/reject races on the same change record.
    async fn compare_and_swap(
        &self,
        kind: &str,
        key: &str,
        expected: Option<Value>,
        new_value: Value,
    ) -> Result<bool, ComplianceError>;
}

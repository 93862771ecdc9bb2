use std::collections::HashMap;

use chrono::{DateTime, Utc};
use compliance_errors::{ComplianceError, ErrorKind};
use compliance_store::StoreGateway;
use compliance_types::{
    ChangeOperation, ChangeRecord, Diff, EntitySnapshot, RollbackRequest, RollbackStatus,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::impact::infer_impact;

const CHANGE_KIND: &str = "change_record";
const SNAPSHOT_KIND: &str = "entity_snapshot";
const ROLLBACK_KIND: &str = "rollback_request";

/// Caller-supplied fields for `record_change`; the engine fills in
/// `change_id`, `changed_at`, `diff`, and `impact`.
#[derive(Debug, Clone)]
pub struct ChangeInput {
    pub user_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub operation: ChangeOperation,
    pub old_value: Value,
    pub new_value: Value,
    pub reason: String,
    pub requires_approval: bool,
}

#[derive(Debug, Clone)]
pub struct SnapshotInput {
    pub entity_kind: String,
    pub entity_id: String,
    pub state: Value,
    pub created_by: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RollbackOutcome {
    pub restored_value: Value,
    pub compensating_change_id: String,
}

/// Journals mutations, snapshots entities, coordinates rollbacks. Per-entity
/// version counters are cached here and mirrored into the store so a restart
/// recomputes them from `list(SNAPSHOT_KIND)` rather than losing monotonicity.
pub struct AuditEngine {
    store: Arc<dyn StoreGateway>,
    version_counters: Mutex<HashMap<(String, String), u64>>,
}

impl AuditEngine {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store, version_counters: Mutex::new(HashMap::new()) }
    }

    pub async fn record_change(&self, input: ChangeInput) -> Result<String, ComplianceError> {
        let diff = Diff::compute(&input.old_value, &input.new_value);
        let impact = infer_impact(&input.entity_kind, input.operation, &diff);
        let change_id = format!("chg_{}", Uuid::new_v4());
        let record = ChangeRecord {
            change_id: change_id.clone(),
            user_id: input.user_id,
            entity_kind: input.entity_kind,
            entity_id: input.entity_id,
            operation: input.operation,
            impact,
            old_value: input.old_value,
            new_value: input.new_value,
            diff,
            reason: input.reason,
            approval_ref: None,
            requires_approval: input.requires_approval,
            approved: false,
            metadata: HashMap::new(),
            changed_at: Utc::now(),
            approved_at: None,
        };
        self.put_change(&record).await?;
        tracing::info!(change_id = %record.change_id, entity_kind = %record.entity_kind, entity_id = %record.entity_id, operation = ?record.operation, "change recorded");
        Ok(change_id)
    }

    pub async fn approve_change(&self, id: &str, approver: &str, comments: Option<String>) -> Result<(), ComplianceError> {
        let mut record = self.get_change(id).await?;
        record.approved = true;
        record.approved_at = Some(Utc::now());
        record.approval_ref = Some(approver.to_string());
        if let Some(comments) = comments {
            record.metadata.insert("approval_comments".to_string(), comments);
        }
        self.put_change(&record).await
    }

    pub async fn reject_change(&self, id: &str, rejector: &str, reason: &str) -> Result<(), ComplianceError> {
        let mut record = self.get_change(id).await?;
        record.approved = false;
        record.approval_ref = Some(rejector.to_string());
        record.metadata.insert("rejection_reason".to_string(), reason.to_string());
        self.put_change(&record).await
    }

    pub async fn get_change(&self, id: &str) -> Result<ChangeRecord, ComplianceError> {
        let value = self
            .store
            .get(CHANGE_KIND, id)
            .await?
            .ok_or_else(|| ComplianceError::new(ErrorKind::NotFound, "compliance-audit", "get_change", format!("no change {id}")))?;
        parse::<ChangeRecord>(value, "get_change")
    }

    async fn all_changes(&self) -> Result<Vec<ChangeRecord>, ComplianceError> {
        let rows = self.store.list(CHANGE_KIND).await?;
        rows.into_iter().map(|(_, v)| parse::<ChangeRecord>(v, "all_changes")).collect()
    }

    pub async fn query_by_entity(&self, entity_kind: &str, entity_id: &str) -> Result<Vec<ChangeRecord>, ComplianceError> {
        Ok(self
            .all_changes()
            .await?
            .into_iter()
            .filter(|c| c.entity_kind == entity_kind && c.entity_id == entity_id)
            .collect())
    }

    pub async fn query_by_user(&self, user_id: &str) -> Result<Vec<ChangeRecord>, ComplianceError> {
        Ok(self.all_changes().await?.into_iter().filter(|c| c.user_id == user_id).collect())
    }

    pub async fn query_by_operation(&self, operation: ChangeOperation) -> Result<Vec<ChangeRecord>, ComplianceError> {
        Ok(self.all_changes().await?.into_iter().filter(|c| c.operation == operation).collect())
    }

    pub async fn query_high_impact(&self, days: i64) -> Result<Vec<ChangeRecord>, ComplianceError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        Ok(self
            .all_changes()
            .await?
            .into_iter()
            .filter(|c| c.changed_at >= cutoff)
            .filter(|c| matches!(c.impact, compliance_types::ImpactLevel::High | compliance_types::ImpactLevel::Critical))
            .collect())
    }

    async fn put_change(&self, record: &ChangeRecord) -> Result<(), ComplianceError> {
        let value = serde_json::to_value(record)
            .map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-audit", "put_change", e.to_string()))?;
        self.store.put(CHANGE_KIND, &record.change_id, value).await
    }

    pub async fn create_snapshot(&self, input: SnapshotInput) -> Result<String, ComplianceError> {
        let key = (input.entity_kind.clone(), input.entity_id.clone());
        let version_number = {
            let mut counters = self.version_counters.lock();
            let next = counters.entry(key).or_insert(0);
            *next += 1;
            *next
        };
        let snapshot = EntitySnapshot {
            snapshot_id: format!("snap_{}", Uuid::new_v4()),
            entity_kind: input.entity_kind,
            entity_id: input.entity_id,
            version_number,
            state: input.state,
            created_by: input.created_by,
            created_at: Utc::now(),
            active: true,
        };
        let value = serde_json::to_value(&snapshot)
            .map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-audit", "create_snapshot", e.to_string()))?;
        self.store.put(SNAPSHOT_KIND, &snapshot.snapshot_id, value).await?;
        Ok(snapshot.snapshot_id)
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<EntitySnapshot, ComplianceError> {
        let value = self
            .store
            .get(SNAPSHOT_KIND, id)
            .await?
            .ok_or_else(|| ComplianceError::new(ErrorKind::NotFound, "compliance-audit", "get_snapshot", format!("no snapshot {id}")))?;
        parse::<EntitySnapshot>(value, "get_snapshot")
    }

    async fn entity_snapshots(&self, entity_kind: &str, entity_id: &str) -> Result<Vec<EntitySnapshot>, ComplianceError> {
        let rows = self.store.list(SNAPSHOT_KIND).await?;
        let mut snapshots: Vec<EntitySnapshot> = rows
            .into_iter()
            .map(|(_, v)| parse::<EntitySnapshot>(v, "entity_snapshots"))
            .collect::<Result<_, _>>()?;
        snapshots.retain(|s| s.entity_kind == entity_kind && s.entity_id == entity_id);
        snapshots.sort_by_key(|s| s.version_number);
        Ok(snapshots)
    }

    pub async fn get_entity_versions(&self, entity_kind: &str, entity_id: &str, limit: usize) -> Result<Vec<EntitySnapshot>, ComplianceError> {
        let mut snapshots = self.entity_snapshots(entity_kind, entity_id).await?;
        snapshots.reverse();
        snapshots.truncate(limit);
        Ok(snapshots)
    }

    /// Most recent snapshot with `created_at <= timestamp`, or `None`.
    pub async fn get_entity_at_point_in_time(&self, entity_kind: &str, entity_id: &str, timestamp: DateTime<Utc>) -> Result<Option<EntitySnapshot>, ComplianceError> {
        let snapshots = self.entity_snapshots(entity_kind, entity_id).await?;
        Ok(snapshots.into_iter().rev().find(|s| s.created_at <= timestamp))
    }

    pub async fn submit_rollback_request(&self, requester: &str, target_change_id: &str, reason: &str) -> Result<String, ComplianceError> {
        let target = self.get_change(target_change_id).await?;
        let dependents = self
            .query_by_entity(&target.entity_kind, &target.entity_id)
            .await?
            .into_iter()
            .filter(|c| c.change_id != target.change_id && c.changed_at > target.changed_at)
            .map(|c| c.change_id)
            .collect::<Vec<_>>();

        let rollback_id = format!("rb_{}", Uuid::new_v4());
        let request = RollbackRequest {
            rollback_id: rollback_id.clone(),
            requester: requester.to_string(),
            target_change_id: target_change_id.to_string(),
            reason: reason.to_string(),
            dependent_change_ids: dependents,
            requires_approval: matches!(target.impact, compliance_types::ImpactLevel::High | compliance_types::ImpactLevel::Critical),
            status: RollbackStatus::Pending,
            result: None,
        };
        self.put_rollback(&request).await?;
        Ok(rollback_id)
    }

    pub async fn get_rollback_request(&self, id: &str) -> Result<RollbackRequest, ComplianceError> {
        let value = self
            .store
            .get(ROLLBACK_KIND, id)
            .await?
            .ok_or_else(|| ComplianceError::new(ErrorKind::NotFound, "compliance-audit", "get_rollback_request", format!("no rollback {id}")))?;
        parse::<RollbackRequest>(value, "get_rollback_request")
    }

    async fn put_rollback(&self, request: &RollbackRequest) -> Result<(), ComplianceError> {
        let value = serde_json::to_value(request)
            .map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-audit", "put_rollback", e.to_string()))?;
        self.store.put(ROLLBACK_KIND, &request.rollback_id, value).await
    }

    async fn all_rollback_requests(&self) -> Result<Vec<RollbackRequest>, ComplianceError> {
        let rows = self.store.list(ROLLBACK_KIND).await?;
        rows.into_iter().map(|(_, v)| parse::<RollbackRequest>(v, "all_rollback_requests")).collect()
    }

    /// Dependents recorded at submission time minus those whose own rollback
    /// has since completed; a dependent is only "outstanding" while its
    /// change still stands.
    async fn outstanding_dependents(&self, request: &RollbackRequest) -> Result<Vec<String>, ComplianceError> {
        if request.dependent_change_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rolled_back: std::collections::HashSet<String> = self
            .all_rollback_requests()
            .await?
            .into_iter()
            .filter(|r| r.status == RollbackStatus::Completed)
            .map(|r| r.target_change_id)
            .collect();
        Ok(request.dependent_change_ids.iter().filter(|id| !rolled_back.contains(*id)).cloned().collect())
    }

    /// Validates feasibility (blocked by un-rolled-back dependents unless
    /// `override_dependents`), then emits a *compensating* change record
    /// rather than mutating the target in place.
    pub async fn execute_rollback(&self, id: &str, override_dependents: bool) -> Result<RollbackOutcome, ComplianceError> {
        let mut request = self.get_rollback_request(id).await?;
        let outstanding = self.outstanding_dependents(&request).await?;
        if !outstanding.is_empty() && !override_dependents {
            return Err(ComplianceError::new(
                ErrorKind::Conflict,
                "compliance-audit",
                "execute_rollback",
                format!("rollback of {} blocked by dependent changes", request.target_change_id),
            )
            .with_context("dependent_change_ids", outstanding.join(",")));
        }

        request.status = RollbackStatus::Executing;
        self.put_rollback(&request).await?;

        let target = self.get_change(&request.target_change_id).await?;
        let compensating_id = self
            .record_change(ChangeInput {
                user_id: request.requester.clone(),
                entity_kind: target.entity_kind.clone(),
                entity_id: target.entity_id.clone(),
                operation: ChangeOperation::Update,
                old_value: target.new_value.clone(),
                new_value: target.old_value.clone(),
                reason: format!("rollback of {}", target.change_id),
                requires_approval: false,
            })
            .await?;

        request.status = RollbackStatus::Completed;
        request.result = Some(compensating_id.clone());
        self.put_rollback(&request).await?;

        Ok(RollbackOutcome { restored_value: target.old_value, compensating_change_id: compensating_id })
    }

    pub async fn cancel_rollback(&self, id: &str, reason: &str) -> Result<(), ComplianceError> {
        let mut request = self.get_rollback_request(id).await?;
        request.status = RollbackStatus::Cancelled;
        request.result = Some(reason.to_string());
        self.put_rollback(&request).await
    }

    pub async fn generate_audit_report(&self, days: i64, entity_kind: Option<&str>) -> Result<Value, ComplianceError> {
        crate::reports::audit_report(&self.all_changes().await?, days, entity_kind)
    }

    pub async fn generate_compliance_certification(&self, days: i64) -> Result<Value, ComplianceError> {
        crate::reports::compliance_certification(&self.all_changes().await?, days)
    }

    pub async fn generate_soc2_report(&self, days: i64) -> Result<Value, ComplianceError> {
        crate::reports::soc2_report(&self.all_changes().await?, days)
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value, operation: &str) -> Result<T, ComplianceError> {
    serde_json::from_value(value).map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-audit", operation, e.to_string()))
}

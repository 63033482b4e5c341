//! Per-request audit trail.

use chrono::{DateTime, Utc};
use hmt_core::{AuditLogEntry, AuditStatus};
use hmt_store::DynStore;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Identity facts learned while the request progressed.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub webhook_key: Option<String>,
    pub webhook_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct AuditLogger {
    store: DynStore,
}

impl AuditLogger {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Append the entry for one request. Failures are logged and dropped.
    pub async fn record(
        &self,
        context: &AuditContext,
        status: AuditStatus,
        reason: Option<String>,
        payload: Value,
        response: Value,
        created_at: DateTime<Utc>,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            webhook_key: context.webhook_key.clone(),
            webhook_key_id: context.webhook_key_id,
            user_id: context.user_id,
            status,
            reason,
            payload,
            response,
            created_at,
        };
        if let Err(e) = self.store.insert_audit_entry(&entry).await {
            warn!(status = %entry.status, error = %e, "Failed to write audit entry");
        }
    }
}

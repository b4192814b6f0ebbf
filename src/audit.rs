use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::AuditLog;
use crate::store::LedgerStore;
use crate::types::{AccountId, AuditAction};

/// appends audit entries to the store.
///
/// Recording is fire-and-forget for the operation it accompanies: a failed write is
/// logged and reported as `None`, never as an error, so the primary mutation stands.
pub struct AuditLogger {
    store: Arc<dyn LedgerStore>,
    account: AccountId,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn LedgerStore>, account: AccountId) -> Self {
        Self { store, account }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        details: impl Into<String>,
        entity_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
    ) -> Option<AuditLog> {
        let entry = AuditLog {
            id: Uuid::new_v4(),
            action,
            timestamp,
            details: details.into(),
            entity_id,
        };

        match self.store.insert_audit_log(self.account, &entry).await {
            Ok(()) => {
                tracing::debug!(action = %action, entity_id = ?entity_id, "audit entry recorded");
                Some(entry)
            }
            Err(e) => {
                tracing::warn!(
                    action = %action,
                    entity_id = ?entity_id,
                    error = %e,
                    "failed to persist audit entry"
                );
                None
            }
        }
    }
}

/// audit entries ordered most recent first
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Vec<AuditLog>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// build from entries in any order
    pub fn from_entries(mut entries: Vec<AuditLog>) -> Self {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self { entries }
    }

    /// add a new entry; entries already present are never touched
    pub fn append(&mut self, entry: AuditLog) {
        let position = self
            .entries
            .iter()
            .position(|e| e.timestamp <= entry.timestamp)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    pub fn entries(&self) -> &[AuditLog] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::{FaultPlan, MemoryStore};
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap()
    }

    fn entry(minute: u32) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            action: AuditAction::Payment,
            timestamp: at(minute),
            details: format!("entry at {}", minute),
            entity_id: None,
        }
    }

    #[tokio::test]
    async fn test_record_persists_entry() {
        let store = Arc::new(MemoryStore::new());
        let account = Uuid::new_v4();
        let logger = AuditLogger::new(store.clone(), account);
        let loan_id = Uuid::new_v4();

        let entry = logger
            .record(AuditAction::Payment, "Received payment of R100.00", Some(loan_id), at(0))
            .await
            .unwrap();

        assert_eq!(entry.entity_id, Some(loan_id));
        let stored = store.fetch_audit_logs(account).await.unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_faults(FaultPlan {
            fail_audit_writes: true,
            ..Default::default()
        });
        let logger = AuditLogger::new(store.clone(), Uuid::new_v4());

        let result = logger
            .record(AuditAction::CreateBorrower, "Added borrower Zanele", None, at(0))
            .await;
        assert!(result.is_none());

        store.set_faults(FaultPlan {
            outage: Some(StoreError::PermissionDenied),
            ..Default::default()
        });
        assert!(logger
            .record(AuditAction::DeleteLoan, "Deleted loan", None, at(1))
            .await
            .is_none());
    }

    #[test]
    fn test_trail_is_most_recent_first() {
        let mut trail = AuditTrail::from_entries(vec![entry(1), entry(5), entry(3)]);
        trail.append(entry(4));
        trail.append(entry(9));

        let minutes: Vec<DateTime<Utc>> = trail.entries().iter().map(|e| e.timestamp).collect();
        assert_eq!(minutes, vec![at(9), at(5), at(4), at(3), at(1)]);
    }

    #[test]
    fn test_append_never_overwrites() {
        let mut trail = AuditTrail::new();
        let first = entry(2);
        let duplicate_time = AuditLog {
            id: Uuid::new_v4(),
            ..first.clone()
        };
        trail.append(first.clone());
        trail.append(duplicate_time.clone());

        assert_eq!(trail.len(), 2);
        assert_eq!(trail.entries()[0].id, duplicate_time.id);
        assert_eq!(trail.entries()[1], first);
    }
}

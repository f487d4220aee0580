use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;

use crate::record::{AccessDecision, AuditFilter};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store failed: {0}")]
    Store(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Log sink for access decisions. Append-only; records are never mutated
/// in place. All operations must be safe under concurrent callers.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn create(&self, record: AccessDecision) -> Result<(), AuditError>;

    /// Records matching all set predicates, newest first, honoring the
    /// filter's limit.
    async fn find(&self, filter: &AuditFilter) -> Result<Vec<AccessDecision>, AuditError>;

    /// Same predicate logic as `find` without materializing results.
    async fn count(&self, filter: &AuditFilter) -> Result<u64, AuditError>;

    /// Prune records older than `now - age`, returning how many were
    /// removed.
    async fn delete_older_than(&self, age: Duration) -> Result<u64, AuditError>;
}

/// Mutex-guarded in-memory store. Append-dominant with occasional bulk
/// reads and prunes, so a single mutex is sufficient at moderate scale.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AccessDecision>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AccessDecision>>, AuditError> {
        self.records
            .lock()
            .map_err(|_| AuditError::Store("audit record lock poisoned".into()))
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn create(&self, record: AccessDecision) -> Result<(), AuditError> {
        self.lock()?.push(record);
        Ok(())
    }

    async fn find(&self, filter: &AuditFilter) -> Result<Vec<AccessDecision>, AuditError> {
        let records = self.lock()?;
        let mut matched: Vec<AccessDecision> = records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn count(&self, filter: &AuditFilter) -> Result<u64, AuditError> {
        let records = self.lock()?;
        Ok(records.iter().filter(|record| filter.matches(record)).count() as u64)
    }

    async fn delete_older_than(&self, age: Duration) -> Result<u64, AuditError> {
        let cutoff = Utc::now() - age;
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|record| record.timestamp >= cutoff);
        let removed = (before - records.len()) as u64;
        if removed > 0 {
            tracing::debug!(removed, "pruned audit records");
        }
        Ok(removed)
    }
}

use std::sync::Arc;

use chrono::Utc;
use platform_authz::Actor;
use uuid::Uuid;

use crate::record::{AccessDecision, AuditFilter};
use crate::store::{AuditError, AuditStore};

/// Typed façade over the audit store producing the three canonical record
/// shapes: permission check, data operation, and generic security event.
///
/// Permission-check logging sits on the decision path and is not
/// fire-and-forget: the write completes (or fails, and the caller denies)
/// before the decision is acted on. Security events may be emitted
/// best-effort by callers that choose to ignore the result.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn log_permission_check(
        &self,
        actor: &Actor,
        module: &str,
        resource: &str,
        operation: &str,
        permission: &str,
        allowed: bool,
        description: &str,
    ) -> Result<(), AuditError> {
        let record = self.base_record(Some(actor), module, resource, operation, description);
        self.store
            .create(AccessDecision {
                permission: permission.to_string(),
                allowed,
                ..record
            })
            .await
    }

    /// Records a data operation that was executed (or refused) on behalf
    /// of the actor; the permission string is derived from the target.
    pub async fn log_database_operation(
        &self,
        actor: &Actor,
        module: &str,
        resource: &str,
        operation: &str,
        allowed: bool,
        description: &str,
    ) -> Result<(), AuditError> {
        let permission = format!("{module}:{resource}:{operation}");
        self.log_permission_check(actor, module, resource, operation, &permission, allowed, description)
            .await
    }

    /// Free-form security event, e.g. a denial before any actor identity
    /// could be resolved.
    pub async fn log_security_event(
        &self,
        actor: Option<&Actor>,
        module: &str,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(), AuditError> {
        let record = self.base_record(actor, module, "", "", description);
        self.store
            .create(AccessDecision {
                allowed: false,
                metadata,
                ..record
            })
            .await
    }

    /// Convenience passthrough for trail queries.
    pub async fn find(&self, filter: &AuditFilter) -> Result<Vec<AccessDecision>, AuditError> {
        self.store.find(filter).await
    }

    fn base_record(
        &self,
        actor: Option<&Actor>,
        module: &str,
        resource: &str,
        operation: &str,
        description: &str,
    ) -> AccessDecision {
        AccessDecision {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: actor.map(|a| a.user_id),
            org_id: actor.map(|a| a.org_id),
            module: module.to_string(),
            resource: resource.to_string(),
            operation: operation.to_string(),
            permission: String::new(),
            allowed: false,
            description: description.to_string(),
            metadata: serde_json::Value::Null,
        }
    }
}

use std::sync::Arc;

use platform_audit::AuditLogger;
use platform_authz::{AuthzError, PolicyEngine, Session};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, ExecResult, QueryResult, Statement, TransactionTrait,
};

use crate::classify::{AccessTarget, Operation, OperationClassifier, SqlClassifier};
use crate::error::AccessError;
use crate::module_map::ModuleMap;

/// Permission-aware decorator over a raw sea-orm connection.
///
/// Mirrors the raw surface (`execute`, `query_one`, `query_all`, `begin`)
/// so it drops in where the bare connection was used. Each statement is
/// gated: classify the target, resolve the owning module, require an
/// actor, ask the policy engine, write the audit record, and only then
/// forward to the inner connection. The session's already-checked flag
/// suppresses repeat checks when one logical action issues several
/// statements.
///
/// The `*_as` methods take an explicit `{resource, operation}` and are
/// the preferred entry points; the classifier is the heuristic fallback
/// for free-form SQL.
pub struct GuardedConnection<C> {
    inner: C,
    policy: Arc<PolicyEngine>,
    audit: AuditLogger,
    modules: Arc<ModuleMap>,
    classifier: Arc<dyn OperationClassifier>,
}

impl<C> GuardedConnection<C> {
    pub fn new(
        inner: C,
        policy: Arc<PolicyEngine>,
        audit: AuditLogger,
        modules: Arc<ModuleMap>,
    ) -> Self {
        Self {
            inner,
            policy,
            audit,
            modules,
            classifier: Arc::new(SqlClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OperationClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: ConnectionTrait> GuardedConnection<C> {
    pub async fn execute(
        &self,
        session: &Session,
        stmt: Statement,
    ) -> Result<ExecResult, AccessError> {
        let target = self.classifier.classify(&stmt.sql);
        self.execute_target(session, target, stmt).await
    }

    /// Execute with an explicitly supplied target, skipping SQL
    /// classification.
    pub async fn execute_as(
        &self,
        session: &Session,
        resource: &str,
        operation: Operation,
        stmt: Statement,
    ) -> Result<ExecResult, AccessError> {
        self.execute_target(session, AccessTarget::new(resource, operation), stmt)
            .await
    }

    pub async fn query_one(
        &self,
        session: &Session,
        stmt: Statement,
    ) -> Result<Option<QueryResult>, AccessError> {
        let target = self.classifier.classify(&stmt.sql);
        self.authorize(session, &target, &describe(&stmt)).await?;
        Ok(self.inner.query_one(stmt).await?)
    }

    pub async fn query_one_as(
        &self,
        session: &Session,
        resource: &str,
        operation: Operation,
        stmt: Statement,
    ) -> Result<Option<QueryResult>, AccessError> {
        let target = AccessTarget::new(resource, operation);
        self.authorize(session, &target, &describe(&stmt)).await?;
        Ok(self.inner.query_one(stmt).await?)
    }

    pub async fn query_all(
        &self,
        session: &Session,
        stmt: Statement,
    ) -> Result<Vec<QueryResult>, AccessError> {
        let target = self.classifier.classify(&stmt.sql);
        self.authorize(session, &target, &describe(&stmt)).await?;
        Ok(self.inner.query_all(stmt).await?)
    }

    pub async fn query_all_as(
        &self,
        session: &Session,
        resource: &str,
        operation: Operation,
        stmt: Statement,
    ) -> Result<Vec<QueryResult>, AccessError> {
        let target = AccessTarget::new(resource, operation);
        self.authorize(session, &target, &describe(&stmt)).await?;
        Ok(self.inner.query_all(stmt).await?)
    }

    async fn execute_target(
        &self,
        session: &Session,
        target: AccessTarget,
        stmt: Statement,
    ) -> Result<ExecResult, AccessError> {
        self.authorize(session, &target, &describe(&stmt)).await?;
        Ok(self.inner.execute(stmt).await?)
    }

    /// The gate. On success the session is marked checked so follow-up
    /// statements of the same logical action skip the check and produce
    /// no duplicate audit entries.
    async fn authorize(
        &self,
        session: &Session,
        target: &AccessTarget,
        description: &str,
    ) -> Result<(), AccessError> {
        session
            .ensure_active()
            .map_err(|_| AccessError::Cancelled)?;

        if session.already_checked() {
            return Ok(());
        }

        let module = self.modules.module_for(&target.resource);
        let Some(actor) = session.actor() else {
            // still leaves a trace, but grants nothing
            if let Err(err) = self
                .audit
                .log_security_event(
                    None,
                    module,
                    &format!("statement refused, no actor in session: {description}"),
                    serde_json::json!({ "resource": target.resource }),
                )
                .await
            {
                tracing::error!(%err, "failed to record security event");
            }
            return Err(AccessError::ActorMissing);
        };

        let object = format!("{module}:{}", target.resource);
        let operation = target.operation.as_str();
        let allowed = match self
            .policy
            .check_permission(session, actor, &object, operation)
            .await
        {
            Ok(allowed) => allowed,
            Err(AuthzError::Cancelled) => return Err(AccessError::Cancelled),
            Err(err) => {
                tracing::warn!(%err, object, operation, "permission check failed; denying");
                false
            }
        };

        let permission = self.modules.permission(target);
        // the audit write must land before the decision is acted on; a
        // failed write denies
        self.audit
            .log_permission_check(
                actor,
                module,
                &target.resource,
                operation,
                &permission,
                allowed,
                description,
            )
            .await
            .map_err(|err| {
                tracing::error!(%err, permission, "audit write failed; denying");
                AccessError::Denied
            })?;

        if allowed {
            session.mark_checked();
            Ok(())
        } else {
            Err(AccessError::Denied)
        }
    }
}

impl<C: TransactionTrait> GuardedConnection<C> {
    /// Begin a transaction. Beginning is unconditionally permitted; each
    /// statement inside it is still individually gated.
    pub async fn begin(
        &self,
        session: &Session,
    ) -> Result<GuardedConnection<DatabaseTransaction>, AccessError> {
        session
            .ensure_active()
            .map_err(|_| AccessError::Cancelled)?;
        let tx = self.inner.begin().await?;
        Ok(GuardedConnection {
            inner: tx,
            policy: Arc::clone(&self.policy),
            audit: self.audit.clone(),
            modules: Arc::clone(&self.modules),
            classifier: Arc::clone(&self.classifier),
        })
    }
}

impl GuardedConnection<DatabaseTransaction> {
    pub async fn commit(self) -> Result<(), AccessError> {
        self.inner.commit().await.map_err(Into::into)
    }

    pub async fn rollback(self) -> Result<(), AccessError> {
        self.inner.rollback().await.map_err(Into::into)
    }
}

/// Single-line statement summary for forensic replay.
fn describe(stmt: &Statement) -> String {
    let summary: String = stmt.sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if summary.chars().count() > 200 {
        let mut truncated: String = summary.chars().take(200).collect();
        truncated.push_str("...");
        truncated
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_audit::{AuditFilter, AuditStore, MemoryAuditStore};
    use platform_authz::{Actor, PolicyDocument};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use uuid::Uuid;

    fn policy() -> Arc<PolicyEngine> {
        let engine = PolicyEngine::new();
        engine
            .load_document(
                PolicyDocument::from_json(
                    r#"{ "roles": { "sales": ["crm:contacts:create", "crm:contacts:read"] } }"#,
                )
                .unwrap(),
            )
            .unwrap();
        Arc::new(engine)
    }

    fn modules() -> Arc<ModuleMap> {
        Arc::new(ModuleMap::with_entries([("contacts", "crm")]))
    }

    fn sales_session() -> Session {
        Session::new(Actor::new(Uuid::new_v4(), Uuid::new_v4()).with_roles(["sales"]))
    }

    fn guarded(
        db: DatabaseConnection,
    ) -> (GuardedConnection<DatabaseConnection>, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone());
        (
            GuardedConnection::new(db, policy(), logger, modules()),
            store,
        )
    }

    fn insert_contact() -> Statement {
        Statement::from_string(
            DatabaseBackend::Postgres,
            "INSERT INTO contacts (id, email) VALUES (1, 'ada@example.com')".to_owned(),
        )
    }

    #[tokio::test]
    async fn allowed_statement_reaches_storage_and_is_audited() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();
        let (conn, store) = guarded(db);
        let session = sales_session();

        let result = conn.execute(&session, insert_contact()).await.unwrap();
        assert_eq!(result.rows_affected(), 1);

        let records = store.find(&AuditFilter::new().allowed(true)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].permission, "crm:contacts:create");

        let log = conn.into_inner().into_transaction_log();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn denied_statement_never_reaches_storage() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (conn, store) = guarded(db);
        let session = sales_session();

        let err = conn
            .execute(
                &session,
                Statement::from_string(
                    DatabaseBackend::Postgres,
                    "DELETE FROM contacts WHERE id = 1".to_owned(),
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Denied));

        let records = store.find(&AuditFilter::new().allowed(false)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].permission, "crm:contacts:delete");

        assert!(conn.into_inner().into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn missing_actor_fails_closed_before_storage() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (conn, store) = guarded(db);
        let session = Session::anonymous();

        let err = conn.execute(&session, insert_contact()).await.unwrap_err();
        assert!(matches!(err, AccessError::ActorMissing));

        // a security event is left behind, and nothing hit the database
        let records = store.find(&AuditFilter::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].user_id.is_none());
        assert!(conn.into_inner().into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn checked_session_skips_duplicate_audit_entries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![
                MockExecResult {
                    last_insert_id: 1,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 2,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let (conn, store) = guarded(db);
        let session = sales_session();

        conn.execute(&session, insert_contact()).await.unwrap();
        conn.execute(&session, insert_contact()).await.unwrap();

        // one logical action, one audit record
        let records = store.find(&AuditFilter::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(conn.into_inner().into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn explicit_target_bypasses_classification() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (conn, store) = guarded(db);
        let session = sales_session();

        // the raw SQL is unclassifiable, but the caller names the target
        let err = conn
            .execute_as(
                &session,
                "contacts",
                Operation::Delete,
                Statement::from_string(
                    DatabaseBackend::Postgres,
                    "TRUNCATE contacts".to_owned(),
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Denied));

        let records = store.find(&AuditFilter::new()).await.unwrap();
        assert_eq!(records[0].permission, "crm:contacts:delete");
    }

    #[tokio::test]
    async fn cancelled_session_short_circuits() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (conn, store) = guarded(db);
        let session = sales_session();
        session.cancel_handle().cancel();

        let err = conn.execute(&session, insert_contact()).await.unwrap_err();
        assert!(matches!(err, AccessError::Cancelled));
        // no audit record, no statement
        assert!(store.find(&AuditFilter::new()).await.unwrap().is_empty());
        assert!(conn.into_inner().into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn unmapped_resource_is_governed_by_the_catch_all() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (conn, store) = guarded(db);
        let session = sales_session();

        let err = conn
            .execute(
                &session,
                Statement::from_string(
                    DatabaseBackend::Postgres,
                    "INSERT INTO foo (id) VALUES (1)".to_owned(),
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Denied));

        let records = store.find(&AuditFilter::new()).await.unwrap();
        assert_eq!(records[0].permission, "system:foo:create");
    }
}

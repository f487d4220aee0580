use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::document::PolicyDocument;
use crate::error::AuthzError;
use crate::session::{Actor, Session};

/// Narrow capability trait for an external authorization service.
///
/// When attached, it is consulted verbatim and its verdict is final; the
/// declarative document and registered validators act only as fallbacks
/// for engines without a backend.
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    async fn check_permission(
        &self,
        actor: &Actor,
        object: &str,
        action: &str,
    ) -> Result<bool, AuthzError>;
}

type PermissionValidator =
    Arc<dyn Fn(&Actor, &str, &str) -> Result<bool, AuthzError> + Send + Sync>;

/// Evaluates (subject, object, action) attempts.
///
/// Resolution order: attached backend, then the loaded policy document
/// (role membership, deny when no entry matches), then a validator
/// registered under the action name. With none of the three present the
/// check fails with [`AuthzError::NoPolicy`] — never a silent allow.
///
/// The document is an immutable snapshot swapped atomically on reload, so
/// concurrent checks see wholly the old or wholly the new document.
pub struct PolicyEngine {
    backend: Option<Arc<dyn AuthorizationBackend>>,
    document: RwLock<Option<Arc<PolicyDocument>>>,
    validators: RwLock<HashMap<String, PermissionValidator>>,
    permissive: bool,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    /// Fail-closed engine with no backend and no document.
    pub fn new() -> Self {
        Self {
            backend: None,
            document: RwLock::new(None),
            validators: RwLock::new(HashMap::new()),
            permissive: false,
        }
    }

    /// Engine that allows every check. Development and test wiring only;
    /// production configurations load a document or attach a backend.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::new()
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn AuthorizationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Swap in a new policy document. A validation failure leaves the
    /// previous document in effect.
    pub fn load_document(&self, document: PolicyDocument) -> Result<(), AuthzError> {
        document.validate()?;
        let mut slot = self.document.write().expect("policy document lock poisoned");
        *slot = Some(Arc::new(document));
        Ok(())
    }

    /// Load (or hot-reload) from a file or a directory of `*.json` files.
    pub fn load_path(&self, path: &Path) -> Result<(), AuthzError> {
        let document = PolicyDocument::load(path)?;
        self.load_document(document)
    }

    /// Register a bespoke validator for an action name. Re-registration
    /// overwrites the previous definition.
    pub fn register_validator<F>(&self, action: impl Into<String>, validator: F)
    where
        F: Fn(&Actor, &str, &str) -> Result<bool, AuthzError> + Send + Sync + 'static,
    {
        self.validators
            .write()
            .expect("validator lock poisoned")
            .insert(action.into(), Arc::new(validator));
    }

    fn snapshot(&self) -> Option<Arc<PolicyDocument>> {
        self.document
            .read()
            .expect("policy document lock poisoned")
            .clone()
    }

    fn validator(&self, action: &str) -> Option<PermissionValidator> {
        self.validators
            .read()
            .expect("validator lock poisoned")
            .get(action)
            .cloned()
    }

    /// Decide whether `actor` may perform `action` on `object`.
    ///
    /// The permission key evaluated against the document is
    /// `"{object}:{action}"`; on the data path that composes to the
    /// canonical `module:resource:operation` string.
    pub async fn check_permission(
        &self,
        session: &Session,
        actor: &Actor,
        object: &str,
        action: &str,
    ) -> Result<bool, AuthzError> {
        session.ensure_active()?;

        if self.permissive {
            return Ok(true);
        }

        if let Some(backend) = &self.backend {
            return backend.check_permission(actor, object, action).await;
        }

        if let Some(document) = self.snapshot() {
            let permission = format!("{object}:{action}");
            let allowed = document.allows(&actor.roles, &permission);
            if !allowed {
                tracing::debug!(user = %actor.user_id, %permission, "policy document denied");
            }
            return Ok(allowed);
        }

        if let Some(validator) = self.validator(action) {
            return validator(actor, object, action);
        }

        Err(AuthzError::NoPolicy(format!("{object}:{action}")))
    }
}

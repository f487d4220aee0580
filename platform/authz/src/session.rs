use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthzError;

/// Acting principal: a user scoped to an organization, carrying the role
/// names assigned to it within that organization.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(user_id: Uuid, org_id: Uuid) -> Self {
        Self {
            user_id,
            org_id,
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-operation execution context.
///
/// A session represents exactly one logical action issued by the host
/// request pipeline. It carries the actor identity, the explicit
/// "permission already checked" marker that suppresses duplicate checks
/// when one action fans out into multiple low-level statements, and a
/// cooperative cancellation flag. Sessions are never reused across
/// independent requests; build a fresh one per request.
#[derive(Debug, Default)]
pub struct Session {
    actor: Option<Actor>,
    checked: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

impl Session {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            checked: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A session without an actor. Every permission-gated path fails
    /// closed on it; useful only for operations that are exempt by
    /// contract (e.g. beginning a transaction).
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn require_actor(&self) -> Result<&Actor, AuthzError> {
        self.actor.as_ref().ok_or(AuthzError::ActorMissing)
    }

    /// True once a permission check has been satisfied for this logical
    /// action.
    pub fn already_checked(&self) -> bool {
        self.checked.load(Ordering::Acquire)
    }

    pub fn mark_checked(&self) {
        self.checked.store(true, Ordering::Release);
    }

    /// Handle for cancelling this session from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Short-circuit helper used by every entry point before any lock is
    /// taken or record written.
    pub fn ensure_active(&self) -> Result<(), AuthzError> {
        if self.is_cancelled() {
            Err(AuthzError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels the session it was taken from.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_has_no_actor() {
        let session = Session::anonymous();
        assert!(session.actor().is_none());
        assert!(matches!(
            session.require_actor(),
            Err(AuthzError::ActorMissing)
        ));
    }

    #[test]
    fn checked_flag_is_per_session() {
        let a = Session::new(Actor::new(Uuid::new_v4(), Uuid::new_v4()));
        let b = Session::new(Actor::new(Uuid::new_v4(), Uuid::new_v4()));
        a.mark_checked();
        assert!(a.already_checked());
        assert!(!b.already_checked());
    }

    #[test]
    fn cancel_handle_trips_the_session() {
        let session = Session::anonymous();
        assert!(session.ensure_active().is_ok());
        session.cancel_handle().cancel();
        assert!(matches!(
            session.ensure_active(),
            Err(AuthzError::Cancelled)
        ));
    }
}

//! Shared fixtures for the integration tests.

use std::sync::Arc;

use platform_authz::{Actor, PolicyDocument, PolicyEngine, Session};
use uuid::Uuid;

pub fn actor_with_roles(roles: &[&str]) -> Actor {
    Actor::new(Uuid::new_v4(), Uuid::new_v4()).with_roles(roles.iter().copied())
}

pub fn session_with_roles(roles: &[&str]) -> Session {
    Session::new(actor_with_roles(roles))
}

/// Policy engine loaded from an inline JSON document.
pub fn policy_from_json(json: &str) -> Arc<PolicyEngine> {
    let engine = PolicyEngine::new();
    engine
        .load_document(PolicyDocument::from_json(json).expect("fixture document parses"))
        .expect("fixture document loads");
    Arc::new(engine)
}

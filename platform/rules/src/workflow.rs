use std::collections::HashSet;
use std::sync::Arc;

use platform_authz::{PolicyEngine, Session};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::engine::RuleEngine;
use crate::error::RuleError;

/// Declarative finite state machine for document lifecycle
/// (draft -> published -> archived and the like).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StateMachineDef {
    pub initial: String,
    pub states: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
}

/// Named, guarded transition: allowed source states, one destination, an
/// optional validator (resolved through the rule engine) and an optional
/// required permission.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TransitionDef {
    pub name: String,
    pub from: Vec<String>,
    pub to: String,
    #[serde(default)]
    pub validator: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
}

impl StateMachineDef {
    /// Invariants: initial state is a member of the state set, every
    /// transition source and destination is a member, and transition
    /// names are unique within the machine.
    pub fn validate(&self) -> Result<(), RuleError> {
        let states: HashSet<&str> = self.states.iter().map(String::as_str).collect();
        if !states.contains(self.initial.as_str()) {
            return Err(RuleError::InvalidDocument(format!(
                "initial state `{}` is not in the state set",
                self.initial
            )));
        }
        let mut names = HashSet::new();
        for transition in &self.transitions {
            if !names.insert(transition.name.as_str()) {
                return Err(RuleError::InvalidDocument(format!(
                    "duplicate transition name `{}`",
                    transition.name
                )));
            }
            if !states.contains(transition.to.as_str()) {
                return Err(RuleError::InvalidDocument(format!(
                    "transition `{}` targets unknown state `{}`",
                    transition.name, transition.to
                )));
            }
            if let Some(unknown) = transition
                .from
                .iter()
                .find(|from| !states.contains(from.as_str()))
            {
                return Err(RuleError::InvalidDocument(format!(
                    "transition `{}` allows unknown source state `{unknown}`",
                    transition.name
                )));
            }
        }
        Ok(())
    }

    pub fn transition(&self, name: &str) -> Option<&TransitionDef> {
        self.transitions.iter().find(|t| t.name == name)
    }
}

/// One live machine instance bound to its definition.
///
/// Transition attempts are serialized by the state mutex, held across the
/// guard evaluation, so concurrent callers cannot produce a lost state
/// update.
pub struct Workflow {
    definition: Arc<StateMachineDef>,
    engine: Arc<RuleEngine>,
    policy: Option<Arc<PolicyEngine>>,
    state: Mutex<String>,
}

impl Workflow {
    /// Start a machine instance in the definition's initial state.
    pub fn new(definition: StateMachineDef, engine: Arc<RuleEngine>) -> Result<Self, RuleError> {
        definition.validate()?;
        let state = Mutex::new(definition.initial.clone());
        Ok(Self {
            definition: Arc::new(definition),
            engine,
            policy: None,
            state,
        })
    }

    /// Attach the policy engine used for transitions that declare a
    /// required permission. Without one, such transitions fail closed.
    pub fn with_policy(mut self, policy: Arc<PolicyEngine>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn definition(&self) -> &StateMachineDef {
        &self.definition
    }

    pub async fn current_state(&self) -> String {
        self.state.lock().await.clone()
    }

    /// Execute the named transition: verify the current state is an
    /// allowed source, run the transition's validator, check its required
    /// permission, then atomically move to the destination and return the
    /// new state.
    pub async fn transition<E: Serialize + Sync>(
        &self,
        session: &Session,
        name: &str,
        entity: &E,
    ) -> Result<String, RuleError> {
        session.ensure_active().map_err(|_| RuleError::Cancelled)?;

        let transition = self
            .definition
            .transition(name)
            .ok_or_else(|| RuleError::TransitionNotFound(name.to_string()))?;

        let mut current = self.state.lock().await;
        if !transition.from.iter().any(|from| from == &*current) {
            return Err(RuleError::IllegalTransition {
                transition: name.to_string(),
                from: current.clone(),
            });
        }

        if let Some(rule) = &transition.validator {
            self.engine.validate(session, rule, entity)?;
        }

        if let Some(permission) = &transition.permission {
            self.check_permission(session, name, permission).await?;
        }

        *current = transition.to.clone();
        Ok(current.clone())
    }

    async fn check_permission(
        &self,
        session: &Session,
        transition: &str,
        permission: &str,
    ) -> Result<(), RuleError> {
        let denied = || RuleError::TransitionDenied {
            transition: transition.to_string(),
        };

        // no attached policy engine or no actor means fail closed
        let Some(policy) = &self.policy else {
            tracing::warn!(transition, permission, "transition requires a permission but no policy engine is attached");
            return Err(denied());
        };
        let Some(actor) = session.actor() else {
            return Err(denied());
        };

        let (object, action) = permission
            .rsplit_once(':')
            .unwrap_or(("workflow", permission));
        match policy.check_permission(session, actor, object, action).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(denied()),
            Err(platform_authz::AuthzError::Cancelled) => Err(RuleError::Cancelled),
            Err(err) => {
                tracing::warn!(transition, permission, %err, "transition permission check failed");
                Err(denied())
            }
        }
    }
}

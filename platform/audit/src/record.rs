use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded access decision. Immutable once created.
///
/// `user_id`/`org_id` are absent only for security events raised before an
/// actor could be resolved (e.g. a denial for a session with no identity).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AccessDecision {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub org_id: Option<Uuid>,
    pub module: String,
    pub resource: String,
    pub operation: String,
    pub permission: String,
    pub allowed: bool,
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Conjunctive record filter: a record matches when every set predicate
/// holds. `limit` caps how many records `find` returns; `count` ignores it.
#[derive(Clone, Debug, Default)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub org_id: Option<Uuid>,
    pub module: Option<String>,
    pub resource: Option<String>,
    pub operation: Option<String>,
    pub allowed: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn org(mut self, org_id: Uuid) -> Self {
        self.org_id = Some(org_id);
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn allowed(mut self, allowed: bool) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &AccessDecision) -> bool {
        if let Some(user_id) = self.user_id {
            if record.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(org_id) = self.org_id {
            if record.org_id != Some(org_id) {
                return false;
            }
        }
        if let Some(module) = &self.module {
            if record.module != *module {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if record.resource != *resource {
                return false;
            }
        }
        if let Some(operation) = &self.operation {
            if record.operation != *operation {
                return false;
            }
        }
        if let Some(allowed) = self.allowed {
            if record.allowed != allowed {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        true
    }
}

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;

/// Declarative policy document.
///
/// `permissions` describes the protected surface: module -> resource ->
/// human-readable description. `roles` maps a role name to the permission
/// patterns it grants. Patterns are `module:resource:operation` with `*`
/// allowed per segment; a trailing `*` matches all remaining segments, so
/// `"crm:*"` grants every crm permission and `"*"` grants everything.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub permissions: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

impl PolicyDocument {
    /// Parse a single JSON document.
    pub fn from_json(contents: &str) -> Result<Self, AuthzError> {
        let doc: Self = serde_json::from_str(contents)
            .map_err(|err| AuthzError::InvalidDocument(err.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load one `.json` file, or merge every `*.json` file in a directory
    /// in filename order.
    pub fn load(path: &Path) -> Result<Self, AuthzError> {
        let mut merged = Self::default();
        let mut files = 0usize;
        for file in policy_files(path)? {
            let contents =
                std::fs::read_to_string(&file).map_err(|source| AuthzError::DocumentRead {
                    path: file.display().to_string(),
                    source,
                })?;
            merged.merge(Self::from_json(&contents)?);
            files += 1;
        }
        tracing::info!(
            files,
            modules = merged.permissions.len(),
            roles = merged.roles.len(),
            "loaded policy documents"
        );
        Ok(merged)
    }

    /// Later documents win on module and role name collisions.
    pub fn merge(&mut self, other: Self) {
        for (module, resources) in other.permissions {
            self.permissions
                .entry(module)
                .or_default()
                .extend(resources);
        }
        self.roles.extend(other.roles);
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        for (role, patterns) in &self.roles {
            for pattern in patterns {
                let segments: Vec<&str> = pattern.split(':').collect();
                if segments.is_empty()
                    || segments.len() > 3
                    || segments.iter().any(|s| s.is_empty())
                {
                    return Err(AuthzError::InvalidDocument(format!(
                        "role `{role}` has malformed permission pattern `{pattern}`"
                    )));
                }
            }
        }
        Ok(())
    }

    /// True when any of the given roles grants `permission`.
    pub fn allows(&self, roles: &[String], permission: &str) -> bool {
        roles.iter().any(|role| {
            self.roles
                .get(role)
                .map(|patterns| patterns.iter().any(|p| pattern_matches(p, permission)))
                .unwrap_or(false)
        })
    }
}

fn pattern_matches(pattern: &str, permission: &str) -> bool {
    if pattern == permission || pattern == "*" {
        return true;
    }
    let mut wanted = permission.split(':');
    let mut segments = pattern.split(':').peekable();
    while let Some(seg) = segments.next() {
        if seg == "*" && segments.peek().is_none() {
            // trailing wildcard swallows the rest
            return true;
        }
        match wanted.next() {
            Some(w) if seg == "*" || seg == w => continue,
            _ => return false,
        }
    }
    wanted.next().is_none()
}

fn policy_files(path: &Path) -> Result<Vec<std::path::PathBuf>, AuthzError> {
    if path.is_dir() {
        let mut files: Vec<_> = std::fs::read_dir(path)
            .map_err(|source| AuthzError::DocumentRead {
                path: path.display().to_string(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        files.sort();
        Ok(files)
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(AuthzError::InvalidDocument(format!(
            "policy path `{}` does not exist",
            path.display()
        )))
    }
}

use std::collections::HashMap;

use crate::classify::AccessTarget;

/// Static resource -> owning-module table.
///
/// Unmapped resources fall into the `"system"` catch-all module so every
/// resource is governed by some policy entry.
#[derive(Clone, Debug)]
pub struct ModuleMap {
    entries: HashMap<String, String>,
    fallback: String,
}

impl Default for ModuleMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleMap {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: "system".to_string(),
        }
    }

    pub fn with_entries<I, R, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, M)>,
        R: Into<String>,
        M: Into<String>,
    {
        let mut map = Self::new();
        for (resource, module) in entries {
            map.insert(resource, module);
        }
        map
    }

    pub fn insert(&mut self, resource: impl Into<String>, module: impl Into<String>) {
        self.entries.insert(resource.into(), module.into());
    }

    pub fn module_for(&self, resource: &str) -> &str {
        self.entries
            .get(resource)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Canonical `module:resource:operation` permission string for a
    /// classified target.
    pub fn permission(&self, target: &AccessTarget) -> String {
        format!(
            "{}:{}:{}",
            self.module_for(&target.resource),
            target.resource,
            target.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Operation;

    #[test]
    fn mapped_resource_composes_permission() {
        let map = ModuleMap::with_entries([("contacts", "crm")]);
        let target = AccessTarget::new("contacts", Operation::Create);
        assert_eq!(map.permission(&target), "crm:contacts:create");
    }

    #[test]
    fn unmapped_resource_falls_into_system() {
        let map = ModuleMap::with_entries([("contacts", "crm")]);
        assert_eq!(
            map.permission(&AccessTarget::new("foo", Operation::Read)),
            "system:foo:read"
        );
        assert_eq!(
            map.permission(&AccessTarget::new("foo", Operation::Create)),
            "system:foo:create"
        );
    }
}

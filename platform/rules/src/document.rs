use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::workflow::StateMachineDef;

/// One field-level rule inside a declarative rule set: extract `field`
/// from the entity and apply the named validator with optional params.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FieldRule {
    pub field: String,
    pub validator: String,
    #[serde(default)]
    pub params: Value,
    /// Overrides the validator's own failure message when set.
    #[serde(default)]
    pub message: Option<String>,
}

/// Rules owned by one module: named validation rule sets, workflow state
/// machines, and calculation formulas.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ModuleRules {
    #[serde(default)]
    pub validation: HashMap<String, Vec<FieldRule>>,
    #[serde(default, rename = "state_machine")]
    pub state_machines: HashMap<String, StateMachineDef>,
    #[serde(default)]
    pub calculations: HashMap<String, String>,
}

/// Declarative rule document, module-keyed. Same load/merge/snapshot
/// discipline as the policy document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub modules: HashMap<String, ModuleRules>,
}

impl RuleDocument {
    pub fn from_json(contents: &str) -> Result<Self, RuleError> {
        let doc: Self = serde_json::from_str(contents)
            .map_err(|err| RuleError::InvalidDocument(err.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load one `.json` file or merge every `*.json` file in a directory
    /// in filename order.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let mut merged = Self::default();
        let mut files = 0usize;
        for file in rule_files(path)? {
            let contents =
                std::fs::read_to_string(&file).map_err(|source| RuleError::DocumentRead {
                    path: file.display().to_string(),
                    source,
                })?;
            merged.merge(Self::from_json(&contents)?);
            files += 1;
        }
        tracing::info!(files, modules = merged.modules.len(), "loaded rule documents");
        Ok(merged)
    }

    pub fn merge(&mut self, other: Self) {
        for (name, rules) in other.modules {
            let entry = self.modules.entry(name).or_default();
            entry.validation.extend(rules.validation);
            entry.state_machines.extend(rules.state_machines);
            entry.calculations.extend(rules.calculations);
        }
    }

    /// State-machine invariants are enforced at load time so a malformed
    /// reload never replaces a working document.
    pub fn validate(&self) -> Result<(), RuleError> {
        for (module, rules) in &self.modules {
            for (name, machine) in &rules.state_machines {
                machine.validate().map_err(|err| {
                    RuleError::InvalidDocument(format!(
                        "state machine `{module}.{name}`: {err}"
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Resolve a rule set by `"module.rule"`, or by unqualified name
    /// searched across modules (first match in module-name order).
    pub fn find_rule(&self, rule: &str) -> Option<&Vec<FieldRule>> {
        if let Some((module, name)) = rule.split_once('.') {
            return self.modules.get(module)?.validation.get(name);
        }
        let mut names: Vec<&String> = self.modules.keys().collect();
        names.sort();
        names
            .into_iter()
            .find_map(|module| self.modules.get(module)?.validation.get(rule))
    }

    pub fn state_machine(&self, module: &str, name: &str) -> Option<&StateMachineDef> {
        self.modules.get(module)?.state_machines.get(name)
    }

    pub fn calculation(&self, module: &str, name: &str) -> Option<&str> {
        self.modules
            .get(module)?
            .calculations
            .get(name)
            .map(String::as_str)
    }
}

fn rule_files(path: &Path) -> Result<Vec<std::path::PathBuf>, RuleError> {
    if path.is_dir() {
        let mut files: Vec<_> = std::fs::read_dir(path)
            .map_err(|source| RuleError::DocumentRead {
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
        Err(RuleError::InvalidDocument(format!(
            "rule path `{}` does not exist",
            path.display()
        )))
    }
}

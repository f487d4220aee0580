use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use platform_authz::Session;
use serde::Serialize;
use serde_json::Value;

use crate::document::RuleDocument;
use crate::error::RuleError;
use crate::validators::{self, Validator};

/// Registry of named validators plus the declarative rule document.
///
/// `validate` resolves a rule name against, in order: a directly
/// registered validator applied to the whole entity, then a declarative
/// field-rule set from the document, then fails with `RuleNotFound` —
/// validation is never silently skipped.
///
/// Entities are introspected through their `serde` representation: the
/// entity is serialized once and field rules extract values by (dotted)
/// field name, so both owned structs and references work unchanged.
pub struct RuleEngine {
    validators: RwLock<HashMap<String, Validator>>,
    document: RwLock<Arc<RuleDocument>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            validators: RwLock::new(HashMap::new()),
            document: RwLock::new(Arc::new(RuleDocument::default())),
        }
    }

    pub fn with_document(document: RuleDocument) -> Result<Self, RuleError> {
        let engine = Self::new();
        engine.load_document(document)?;
        Ok(engine)
    }

    /// Swap in a new rule document; a validation failure leaves the
    /// previous document in effect.
    pub fn load_document(&self, document: RuleDocument) -> Result<(), RuleError> {
        document.validate()?;
        let mut slot = self.document.write().expect("rule document lock poisoned");
        *slot = Arc::new(document);
        Ok(())
    }

    /// Load (or hot-reload) from a file or a directory of `*.json` files.
    pub fn load_path(&self, path: &Path) -> Result<(), RuleError> {
        self.load_document(RuleDocument::load(path)?)
    }

    /// Register a whole-entity validator. Re-registration overwrites.
    /// Registered names also win over built-ins when referenced from a
    /// field rule.
    pub fn register_validator<F>(&self, name: impl Into<String>, validator: F)
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators
            .write()
            .expect("validator lock poisoned")
            .insert(name.into(), Arc::new(validator));
    }

    fn snapshot(&self) -> Arc<RuleDocument> {
        self.document
            .read()
            .expect("rule document lock poisoned")
            .clone()
    }

    fn registered(&self, name: &str) -> Option<Validator> {
        self.validators
            .read()
            .expect("validator lock poisoned")
            .get(name)
            .cloned()
    }

    /// Validate `entity` against the named rule. The first failing field
    /// rule aborts with a field-qualified error.
    pub fn validate<E: Serialize>(
        &self,
        session: &Session,
        rule: &str,
        entity: &E,
    ) -> Result<(), RuleError> {
        session.ensure_active().map_err(|_| RuleError::Cancelled)?;

        let value =
            serde_json::to_value(entity).map_err(|err| RuleError::EntityShape(err.to_string()))?;

        if let Some(validator) = self.registered(rule) {
            return validator(&value).map_err(|message| RuleError::Entity {
                rule: rule.to_string(),
                message,
            });
        }

        let document = self.snapshot();
        let Some(field_rules) = document.find_rule(rule) else {
            return Err(RuleError::RuleNotFound(rule.to_string()));
        };

        for field_rule in field_rules {
            let field_value = extract_field(&value, &field_rule.field);
            let validator = self
                .registered(&field_rule.validator)
                .or_else(|| validators::resolve(&field_rule.validator, &field_rule.params))
                .ok_or_else(|| RuleError::ValidatorNotFound(field_rule.validator.clone()))?;
            if let Err(message) = validator(&field_value) {
                return Err(RuleError::Validation {
                    rule: rule.to_string(),
                    field: field_rule.field.clone(),
                    message: field_rule.message.clone().unwrap_or(message),
                });
            }
        }
        Ok(())
    }

    /// Boolean form of [`validate`]: any rule failure — including an
    /// undefined rule — reduces to `false`. Cancellation still
    /// propagates.
    ///
    /// [`validate`]: RuleEngine::validate
    pub fn evaluate<E: Serialize>(
        &self,
        session: &Session,
        rule: &str,
        entity: &E,
    ) -> Result<bool, RuleError> {
        match self.validate(session, rule, entity) {
            Ok(()) => Ok(true),
            Err(RuleError::Cancelled) => Err(RuleError::Cancelled),
            Err(err) => {
                tracing::debug!(rule, %err, "rule evaluated to false");
                Ok(false)
            }
        }
    }

    /// Snapshot of a module's named state machine, if declared.
    pub fn state_machine(
        &self,
        module: &str,
        name: &str,
    ) -> Option<crate::workflow::StateMachineDef> {
        self.snapshot().state_machine(module, name).cloned()
    }

    /// A module's named calculation formula. The engine retains formulas
    /// verbatim; interpreting them belongs to the owning module.
    pub fn calculation(&self, module: &str, name: &str) -> Option<String> {
        self.snapshot().calculation(module, name).map(str::to_owned)
    }
}

/// Field lookup by name, descending through objects on `.`. A missing
/// field yields JSON null so `required`-style validators can report it.
fn extract_field(entity: &Value, field: &str) -> Value {
    let mut current = entity;
    for segment in field.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RuleDocument;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Contact {
        email: String,
        name: String,
        tags: Vec<String>,
    }

    fn contact() -> Contact {
        Contact {
            email: "ada@example.com".into(),
            name: "Ada".into(),
            tags: vec!["vip".into()],
        }
    }

    fn engine() -> RuleEngine {
        RuleEngine::with_document(
            RuleDocument::from_json(
                r#"{ "modules": { "crm": { "validation": {
                    "contact_create": [
                        { "field": "email", "validator": "email" },
                        { "field": "name", "validator": "min_length", "params": { "len": 2 } },
                        { "field": "tags", "validator": "min_items", "params": { "len": 1 } }
                    ]
                } } } }"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn declarative_rule_passes_and_fails_by_field() {
        let engine = engine();
        let session = Session::anonymous();
        engine
            .validate(&session, "crm.contact_create", &contact())
            .unwrap();

        let bad = Contact {
            name: "A".into(),
            ..contact()
        };
        let err = engine
            .validate(&session, "crm.contact_create", &bad)
            .unwrap_err();
        match err {
            RuleError::Validation { field, .. } => assert_eq!(field, "name"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn references_validate_like_values() {
        let engine = engine();
        let session = Session::anonymous();
        let owned = contact();
        let by_ref = &owned;
        engine
            .validate(&session, "crm.contact_create", by_ref)
            .unwrap();
    }

    #[test]
    fn registered_validator_wins_and_overwrites() {
        let engine = engine();
        let session = Session::anonymous();
        engine.register_validator("crm.contact_create", |_| Err("always fails".into()));
        assert!(matches!(
            engine.validate(&session, "crm.contact_create", &contact()),
            Err(RuleError::Entity { .. })
        ));

        engine.register_validator("crm.contact_create", |_| Ok(()));
        engine
            .validate(&session, "crm.contact_create", &contact())
            .unwrap();
    }

    #[test]
    fn unknown_rule_is_an_error_but_evaluates_false() {
        let engine = engine();
        let session = Session::anonymous();
        assert!(matches!(
            engine.validate(&session, "crm.nope", &contact()),
            Err(RuleError::RuleNotFound(_))
        ));
        assert!(!engine.evaluate(&session, "crm.nope", &contact()).unwrap());
        assert!(engine
            .evaluate(&session, "crm.contact_create", &contact())
            .unwrap());
    }

    #[test]
    fn unknown_field_validator_is_reported() {
        let engine = RuleEngine::with_document(
            RuleDocument::from_json(
                r#"{ "modules": { "crm": { "validation": {
                    "broken": [ { "field": "x", "validator": "no_such" } ]
                } } } }"#,
            )
            .unwrap(),
        )
        .unwrap();
        let session = Session::anonymous();
        assert!(matches!(
            engine.validate(&session, "crm.broken", &json!({"x": 1})),
            Err(RuleError::ValidatorNotFound(_))
        ));
    }

    #[test]
    fn missing_field_reads_as_null() {
        let engine = RuleEngine::with_document(
            RuleDocument::from_json(
                r#"{ "modules": { "crm": { "validation": {
                    "needs_owner": [ { "field": "owner.id", "validator": "required" } ]
                } } } }"#,
            )
            .unwrap(),
        )
        .unwrap();
        let session = Session::anonymous();
        engine
            .validate(&session, "crm.needs_owner", &json!({"owner": {"id": 7}}))
            .unwrap();
        assert!(engine
            .validate(&session, "crm.needs_owner", &json!({"name": "x"}))
            .is_err());
    }

    #[test]
    fn custom_message_replaces_validator_message() {
        let engine = RuleEngine::with_document(
            RuleDocument::from_json(
                r#"{ "modules": { "crm": { "validation": {
                    "named": [ { "field": "name", "validator": "non_empty",
                                 "message": "contact name is mandatory" } ]
                } } } }"#,
            )
            .unwrap(),
        )
        .unwrap();
        let session = Session::anonymous();
        let err = engine
            .validate(&session, "crm.named", &json!({"name": ""}))
            .unwrap_err();
        assert!(err.to_string().contains("contact name is mandatory"));
    }

    #[test]
    fn cancelled_session_propagates() {
        let engine = engine();
        let session = Session::anonymous();
        session.cancel_handle().cancel();
        assert!(matches!(
            engine.evaluate(&session, "crm.contact_create", &contact()),
            Err(RuleError::Cancelled)
        ));
    }
}

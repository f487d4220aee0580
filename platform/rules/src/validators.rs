//! Built-in field validators.
//!
//! A validator is a stateless function over a JSON value; parameterized
//! validators (length and range bounds) are built by small factories
//! returning a closure, so one implementation serves many fields with
//! different bounds.

use std::sync::Arc;

use serde_json::Value;

/// Named pure validation function. `Err` carries a human-readable reason;
/// the engine qualifies it with the rule and field names.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Non-null identifier or value.
pub fn required() -> Validator {
    Arc::new(|value| {
        if value.is_null() {
            Err("value is required".into())
        } else {
            Ok(())
        }
    })
}

/// Non-empty string (whitespace only counts as empty).
pub fn non_empty() -> Validator {
    Arc::new(|value| match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(()),
        Some(_) => Err("must not be empty".into()),
        None => Err("must be a non-empty string".into()),
    })
}

pub fn min_length(min: usize) -> Validator {
    Arc::new(move |value| match value.as_str() {
        Some(s) if s.chars().count() >= min => Ok(()),
        Some(s) => Err(format!(
            "length {} is below the minimum of {min}",
            s.chars().count()
        )),
        None => Err("must be a string".into()),
    })
}

pub fn max_length(max: usize) -> Validator {
    Arc::new(move |value| match value.as_str() {
        Some(s) if s.chars().count() <= max => Ok(()),
        Some(s) => Err(format!(
            "length {} exceeds the maximum of {max}",
            s.chars().count()
        )),
        None => Err("must be a string".into()),
    })
}

/// Inclusive numeric range.
pub fn range(min: f64, max: f64) -> Validator {
    Arc::new(move |value| match value.as_f64() {
        Some(n) if n >= min && n <= max => Ok(()),
        Some(n) => Err(format!("{n} is outside the range {min}..={max}")),
        None => Err("must be a number".into()),
    })
}

/// Minimum collection length.
pub fn min_items(min: usize) -> Validator {
    Arc::new(move |value| match value.as_array() {
        Some(items) if items.len() >= min => Ok(()),
        Some(items) => Err(format!(
            "{} item(s) given, at least {min} required",
            items.len()
        )),
        None => Err("must be a collection".into()),
    })
}

/// Email shape: exactly one `@`, non-empty local part, dotted domain.
pub fn email() -> Validator {
    Arc::new(|value| {
        let Some(s) = value.as_str() else {
            return Err("must be a string".into());
        };
        let mut parts = s.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None)
                if !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.') =>
            {
                Ok(())
            }
            _ => Err("is not a valid email address".into()),
        }
    })
}

/// Resolve a named built-in, reading bounds from the rule's `params`
/// (either a bare number or an object such as `{"len": 3}` /
/// `{"min": 0, "max": 100}`).
pub fn resolve(name: &str, params: &Value) -> Option<Validator> {
    match name {
        "required" => Some(required()),
        "non_empty" => Some(non_empty()),
        "min_length" => Some(min_length(param_usize(params, "len")?)),
        "max_length" => Some(max_length(param_usize(params, "len")?)),
        "range" => Some(range(
            param_f64(params, "min").unwrap_or(f64::MIN),
            param_f64(params, "max").unwrap_or(f64::MAX),
        )),
        "min_items" => Some(min_items(param_usize(params, "len")?)),
        "email" => Some(email()),
        _ => None,
    }
}

fn param_usize(params: &Value, key: &str) -> Option<usize> {
    match params {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::Object(map) => map.get(key).and_then(Value::as_u64).map(|n| n as usize),
        _ => None,
    }
}

fn param_f64(params: &Value, key: &str) -> Option<f64> {
    match params {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get(key).and_then(Value::as_f64),
        _ => None,
    }
}

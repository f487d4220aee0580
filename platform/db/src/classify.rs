use std::fmt;

/// Canonical data operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The protected target inferred (or supplied) for one statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessTarget {
    pub resource: String,
    pub operation: Operation,
}

impl AccessTarget {
    pub fn new(resource: impl Into<String>, operation: Operation) -> Self {
        Self {
            resource: resource.into(),
            operation,
        }
    }
}

/// Strategy for recovering `{resource, operation}` from a raw statement.
///
/// Classification from free-form SQL is necessarily heuristic; callers
/// that know the target should prefer the explicit `*_as` entry points on
/// the guarded connection and bypass classification entirely.
pub trait OperationClassifier: Send + Sync {
    fn classify(&self, sql: &str) -> AccessTarget;
}

/// Last-resort lexical classifier: the leading verb picks the operation
/// and the token after the associated keyword (INTO / FROM / the UPDATE
/// verb itself) names the resource. Unrecognized shapes fall back to
/// `{resource: "unknown", operation: read}` — a conservative default,
/// never a bypass.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlClassifier;

impl OperationClassifier for SqlClassifier {
    fn classify(&self, sql: &str) -> AccessTarget {
        let tokens: Vec<String> = sql
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();

        let target = match tokens.first().map(String::as_str) {
            Some("insert") => token_after(&tokens, "into").map(|r| (r, Operation::Create)),
            Some("select") => token_after(&tokens, "from").map(|r| (r, Operation::Read)),
            Some("update") => tokens.get(1).map(|r| (r.clone(), Operation::Update)),
            Some("delete") => token_after(&tokens, "from").map(|r| (r, Operation::Delete)),
            _ => None,
        };

        match target {
            Some((resource, operation)) => {
                AccessTarget::new(normalize_resource(&resource), operation)
            }
            None => AccessTarget::new("unknown", Operation::Read),
        }
    }
}

fn token_after(tokens: &[String], keyword: &str) -> Option<String> {
    let position = tokens.iter().position(|t| t == keyword)?;
    tokens.get(position + 1).cloned()
}

/// Strip quoting and punctuation, and reduce `schema.table` to `table`.
fn normalize_resource(token: &str) -> String {
    let bare = token.split('(').next().unwrap_or(token);
    let name = bare.rsplit('.').next().unwrap_or(bare);
    let name =
        name.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '(' | ')' | ';' | ','));
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name.to_string()
    }
}

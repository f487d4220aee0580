use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{0}` not found")]
    RuleNotFound(String),

    #[error("validator `{0}` not found")]
    ValidatorNotFound(String),

    #[error("rule `{rule}` failed on field `{field}`: {message}")]
    Validation {
        rule: String,
        field: String,
        message: String,
    },

    #[error("rule `{rule}` failed: {message}")]
    Entity { rule: String, message: String },

    #[error("entity is not introspectable: {0}")]
    EntityShape(String),

    #[error("transition `{0}` is not defined")]
    TransitionNotFound(String),

    #[error("illegal transition `{transition}` from state `{from}`")]
    IllegalTransition { transition: String, from: String },

    #[error("transition `{transition}` denied")]
    TransitionDenied { transition: String },

    #[error("failed to read rule file `{path}`")]
    DocumentRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rule document: {0}")]
    InvalidDocument(String),

    #[error("operation cancelled")]
    Cancelled,
}

use thiserror::Error;

/// Errors surfaced by the authorization layer.
///
/// Callers on the data path collapse every variant except [`Cancelled`]
/// into a generic denial; the specific cause is recorded in the audit
/// trail and server logs only, so policy structure never leaks to clients.
///
/// [`Cancelled`]: AuthzError::Cancelled
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("permission denied")]
    Denied,

    #[error("actor not found in session")]
    ActorMissing,

    #[error("no policy found for `{0}`")]
    NoPolicy(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to read policy file `{path}`")]
    DocumentRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy document: {0}")]
    InvalidDocument(String),

    #[error("authorization backend failed: {0}")]
    Backend(String),
}

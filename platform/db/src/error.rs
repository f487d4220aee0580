use thiserror::Error;

/// Errors surfaced by the guarded access layer.
///
/// Denials are deliberately generic: the internal cause (no matching
/// policy, malformed document, failed audit write) is available in the
/// audit trail and server logs only.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("permission denied")]
    Denied,

    #[error("actor not found in session")]
    ActorMissing,

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

//! Authorization core for the suite platform.
//!
//! Module services never talk to storage or execute a workflow transition
//! without going through [`PolicyEngine::check_permission`]. The engine is
//! fail-closed: when no backend, no policy document, and no registered
//! validator covers an action, the check errors instead of allowing.

mod document;
mod engine;
mod error;
mod session;

pub use document::PolicyDocument;
pub use engine::{AuthorizationBackend, PolicyEngine};
pub use error::AuthzError;
pub use session::{Actor, CancelHandle, Session};

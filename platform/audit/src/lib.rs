//! Append-only audit trail for access decisions.
//!
//! Every permission check on the data path produces exactly one
//! [`AccessDecision`]; records are immutable once written and removed only
//! by bulk age-based pruning. The in-memory store suits tests and small
//! deployments; production backs [`AuditStore`] with a durable store
//! without changing the [`AuditLogger`] contract.

mod logger;
mod record;
mod store;

pub use logger::AuditLogger;
pub use record::{AccessDecision, AuditFilter};
pub use store::{AuditError, AuditStore, MemoryAuditStore};

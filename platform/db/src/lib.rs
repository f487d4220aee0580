//! Permission-aware database access.
//!
//! [`GuardedConnection`] decorates a raw sea-orm connection: every
//! statement is classified into a protected `{resource, operation}`
//! target, resolved to its owning module, checked against the policy
//! engine, and audited — before the inner connection sees it. Denied
//! statements never reach storage.

mod classify;
mod error;
mod guard;
mod module_map;
mod settings;

pub use classify::{AccessTarget, Operation, OperationClassifier, SqlClassifier};
pub use error::AccessError;
pub use guard::GuardedConnection;
pub use module_map::ModuleMap;
pub use settings::{connect, DatabaseSettings, DbPool};

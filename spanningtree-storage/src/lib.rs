//! SQLite storage layer for Spanning Tree.
//!
//! Holds the node's local state:
//!
//! - `users`: local accounts with their role and region
//! - `meetings`: the replicated records, indexed on `last_modified`
//! - `nodes`: community members, local to this node
//! - `audit_log`: signed entries for local actions and accepted merges
//!
//! All writes that must land together go through
//! [`Database::with_transaction`]: the closure's work commits on `Ok` and
//! rolls back on `Err`.

mod audit;
mod database;
mod error;
mod meetings;
mod members;
mod users;

pub use audit::AuditRecord;
pub use database::{Database, Transaction};
pub use error::{StorageError, StorageResult};
pub use users::{NewUser, UserRecord};

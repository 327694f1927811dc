//! Core type definitions for Spanning Tree.
//!
//! This crate defines the plain types shared by every layer of the node:
//! - Identifiers for users and meetings
//! - Epoch-second timestamps used for last-write-wins
//! - Roles, identities and capability checks
//! - The replicated `Meeting` record and local community `Member`s
//! - The row-level access predicate and its SQL twin
//! - Canonical serialization used for signing
//!
//! Nothing here touches storage, keys or the network.

pub mod access;
pub mod canonical;
mod identity;
mod ids;
mod meeting;
mod member;
mod timestamp;

pub use access::{AclRecord, FilterParam, SqlFilter, TableAcl, allows, compile_filter};
pub use canonical::{to_canonical_bytes, value_to_canonical_bytes};
pub use identity::{Action, Identity, Role, can_perform};
pub use ids::{MeetingId, UserId};
pub use meeting::{Meeting, MeetingChanges, NewMeeting};
pub use member::{Member, NewMember};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

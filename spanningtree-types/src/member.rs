//! Community members, the rows of the `nodes` table.
//!
//! Members are local to a node and are not exchanged by sync.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// An activated community member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub city: String,
    pub state: String,
    /// The user who brought them in.
    pub invited_by: Option<UserId>,
    /// Community-contribution score.
    pub cc_score: i64,
}

/// Fields of a member about to be added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub city: String,
    pub state: String,
}

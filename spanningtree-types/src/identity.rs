//! Roles, identities and capability checks.

use crate::{Error, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role, ordered from lowest to highest privilege.
///
/// The derived ordering follows declaration order and is what
/// [`Role::has_minimum_role`] compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Connector,
    Shadower,
    Facilitator,
    Municipal,
    Statal,
    National,
    Dev,
}

impl Role {
    /// Every role, lowest first.
    pub const ALL: [Role; 7] = [
        Role::Connector,
        Role::Shadower,
        Role::Facilitator,
        Role::Municipal,
        Role::Statal,
        Role::National,
        Role::Dev,
    ];

    /// Returns true if this role is at least as privileged as `required`.
    #[must_use]
    pub fn has_minimum_role(self, required: Role) -> bool {
        self >= required
    }

    /// Lowercase name as stored in the users table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Connector => "connector",
            Role::Shadower => "shadower",
            Role::Facilitator => "facilitator",
            Role::Municipal => "municipal",
            Role::Statal => "statal",
            Role::National => "national",
            Role::Dev => "dev",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownRole(s.to_string()))
    }
}

/// The viewer of a record: who they are, what role they hold and,
/// for regional roles, which city or state they cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
    /// A city for municipal users, a state for statal users.
    pub region: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<UserId>, role: Role, region: Option<&str>) -> Self {
        Self {
            id: id.into(),
            role,
            region: region.map(str::to_string),
        }
    }
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Schedule or edit a meeting.
    ScheduleMeeting,
    /// Add users or community members.
    CreateUser,
    ViewAuditLog,
}

/// Returns true if `role` may perform `action`.
#[must_use]
pub fn can_perform(role: Role, action: Action) -> bool {
    match action {
        Action::ScheduleMeeting => role.has_minimum_role(Role::Facilitator),
        Action::CreateUser | Action::ViewAuditLog => role.has_minimum_role(Role::Municipal),
    }
}

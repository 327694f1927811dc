//! The replicated meeting record.

use crate::{MeetingId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A scheduled gathering. This is the only record kind exchanged by sync.
///
/// Fields are declared in lexicographic order so the derived serializer
/// already emits canonical key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub city: String,
    pub host_id: UserId,
    pub id: MeetingId,
    #[serde(default)]
    pub invited_by: Option<UserId>,
    /// Set by the owning node on every local mutation. `None` only ever
    /// arrives from a misbehaving peer and never wins a merge.
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    pub notes: String,
    pub state: String,
    pub title: String,
}

impl Meeting {
    /// Builds a freshly scheduled meeting hosted by `host_id`.
    pub fn schedule(host_id: UserId, details: NewMeeting) -> Self {
        Self {
            city: details.city,
            host_id,
            id: MeetingId::new(),
            invited_by: details.invited_by,
            last_modified: Some(Timestamp::now()),
            notes: details.notes,
            state: details.state,
            title: details.title,
        }
    }

    /// Stamps a local edit, keeping `last_modified` strictly increasing.
    pub fn touch(&mut self) {
        self.last_modified = Some(Timestamp::next_after(self.last_modified));
    }

    /// Applies `changes` and stamps the edit. Returns false, leaving the
    /// record untouched, when nothing would change.
    pub fn apply(&mut self, changes: MeetingChanges) -> bool {
        let mut changed = false;
        for (field, value) in [
            (&mut self.title, changes.title),
            (&mut self.notes, changes.notes),
            (&mut self.city, changes.city),
            (&mut self.state, changes.state),
        ] {
            if let Some(value) = value.filter(|v| *v != *field) {
                *field = value;
                changed = true;
            }
        }
        if changed {
            self.touch();
        }
        changed
    }
}

/// Caller-supplied fields of a meeting about to be scheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMeeting {
    pub title: String,
    pub notes: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub invited_by: Option<UserId>,
}

/// A local edit to an existing meeting; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingChanges {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

//! Selects the meetings to send to one peer.

use crate::error::SyncResult;
use spanningtree_storage::Database;
use spanningtree_types::{Identity, Meeting, Timestamp, allows};
use tracing::debug;

/// Margin subtracted from the export start to form the next checkpoint,
/// so records stamped during the export are sent again next time.
const CHECKPOINT_MARGIN_SECS: i64 = 1;

/// Records selected for a recipient plus the checkpoint to store once
/// they have been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub records: Vec<Meeting>,
    pub checkpoint: Timestamp,
}

#[derive(Debug, Clone)]
pub struct RecordExporter {
    db: Database,
}

impl RecordExporter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Meetings modified strictly after `since`; all timestamped meetings
    /// when `since` is `None`.
    pub fn gather_changed(&self, since: Option<Timestamp>) -> SyncResult<Vec<Meeting>> {
        Ok(self.db.meetings_changed_since(since)?)
    }

    /// Keeps only the records `recipient` is entitled to see.
    pub fn filter_for(records: Vec<Meeting>, recipient: &Identity) -> Vec<Meeting> {
        records
            .into_iter()
            .filter(|record| allows(recipient, record))
            .collect()
    }

    /// Gathers changes since `since` and filters them for `recipient`.
    pub fn export_for(&self, since: Option<Timestamp>, recipient: &Identity) -> SyncResult<Export> {
        let started = Timestamp::now();
        let changed = self.gather_changed(since)?;
        let candidates = changed.len();
        let records = Self::filter_for(changed, recipient);
        debug!(
            recipient = %recipient.id,
            role = %recipient.role,
            candidates,
            selected = records.len(),
            "exported records"
        );
        Ok(Export {
            records,
            checkpoint: started.saturating_sub_secs(CHECKPOINT_MARGIN_SECS),
        })
    }
}

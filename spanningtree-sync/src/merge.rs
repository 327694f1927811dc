//! Last-write-wins merge of incoming meetings.

use crate::audit::AuditSigner;
use crate::error::SyncResult;
use crate::protocol::SyncSummary;
use spanningtree_storage::Database;
use spanningtree_types::{Meeting, UserId};
use tracing::debug;

/// What to do with one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Insert,
    Update,
    Skip,
}

/// Decides the fate of `incoming` given the local copy, if any.
///
/// The incoming record wins only with a strictly greater `last_modified`.
/// Ties skip, as does a missing timestamp on either side.
pub fn resolve(local: Option<&Meeting>, incoming: &Meeting) -> MergeDecision {
    let Some(local) = local else {
        return MergeDecision::Insert;
    };
    match (local.last_modified, incoming.last_modified) {
        (Some(have), Some(got)) if got > have => MergeDecision::Update,
        _ => MergeDecision::Skip,
    }
}

/// Applies batches of meetings to the database.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    db: Database,
    audit: AuditSigner,
}

impl MergeEngine {
    pub fn new(db: Database, audit: AuditSigner) -> Self {
        Self { db, audit }
    }

    /// Merges `records` in one transaction and records a signed audit
    /// entry for the batch in the same transaction.
    ///
    /// Any storage error rolls the whole batch back.
    pub fn merge(&self, records: &[Meeting], origin: Option<UserId>) -> SyncResult<SyncSummary> {
        let audit = self.audit.sign("merge", "meetings", origin, None)?;
        let summary = self.db.with_transaction(|tx| {
            let mut summary = SyncSummary::default();
            for incoming in records {
                let local = tx.meeting(&incoming.id)?;
                let decision = resolve(local.as_ref(), incoming);
                debug!(id = %incoming.id, ?decision, "merge decision");
                match decision {
                    MergeDecision::Insert => {
                        tx.insert_meeting(incoming)?;
                        summary.inserted += 1;
                    }
                    MergeDecision::Update => {
                        tx.replace_meeting(incoming)?;
                        summary.updated += 1;
                    }
                    MergeDecision::Skip => summary.skipped += 1,
                }
            }
            tx.insert_audit(&audit)?;
            Ok(summary)
        })?;
        Ok(summary)
    }
}

//! The node's sync service.
//!
//! [`SyncService`] is built once at startup from the local identity, the
//! node key, the database, the peer directory and a transport. Every sync
//! operation goes through it; there is no global state.

use crate::audit::{AuditSigner, verify_audit_record};
use crate::config::SyncConfig;
use crate::envelope::EnvelopeBuilder;
use crate::error::{SyncError, SyncResult};
use crate::exporter::{Export, RecordExporter};
use crate::merge::MergeEngine;
use crate::peers::{Peer, PeerDirectory};
use crate::protocol::{SyncPayload, SyncSummary};
use crate::receiver::{SyncReceiver, build_router};
use crate::transport::PeerTransport;
use axum::Router;
use spanningtree_crypto::{SigningKeypair, VerifyKey};
use spanningtree_storage::{AuditRecord, Database, NewUser, StorageError, UserRecord};
use spanningtree_types::{
    Action, Identity, Meeting, MeetingChanges, MeetingId, Member, NewMeeting, NewMember, Timestamp,
    allows, can_perform,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// An audit row together with whether its signature checks out against
/// this node's key.
#[derive(Debug, Clone)]
pub struct AuditView {
    pub record: AuditRecord,
    pub verified: bool,
}

/// Result of syncing with one peer.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The peer accepted the envelope.
    Synced {
        email: String,
        sent: usize,
        summary: Option<SyncSummary>,
    },
    /// An exchange with this peer was already in flight.
    Busy { email: String },
    /// The exchange failed; the checkpoint was left unchanged.
    Failed { email: String, error: SyncError },
}

impl SyncOutcome {
    pub fn email(&self) -> &str {
        match self {
            SyncOutcome::Synced { email, .. }
            | SyncOutcome::Busy { email }
            | SyncOutcome::Failed { email, .. } => email,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. })
    }
}

struct Inner {
    identity: Identity,
    db: Database,
    peers: Arc<RwLock<PeerDirectory>>,
    transport: Arc<dyn PeerTransport>,
    config: SyncConfig,
    exporter: RecordExporter,
    builder: EnvelopeBuilder,
    audit: AuditSigner,
    receiver: Arc<SyncReceiver>,
    in_flight: Mutex<HashSet<String>>,
}

/// Cheap-to-clone handle to the sync service.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<Inner>,
}

impl SyncService {
    /// Wires the service together. `identity` is the local user that
    /// envelopes are sent as.
    pub fn new(
        identity: Identity,
        keypair: SigningKeypair,
        db: Database,
        peers: PeerDirectory,
        transport: Arc<dyn PeerTransport>,
        config: SyncConfig,
    ) -> Self {
        let keypair = Arc::new(keypair);
        let peers = Arc::new(RwLock::new(peers));
        let audit = AuditSigner::new(keypair.clone());
        let merge = MergeEngine::new(db.clone(), audit.clone());
        let receiver = Arc::new(SyncReceiver::new(keypair.clone(), peers.clone(), merge));
        Self {
            inner: Arc::new(Inner {
                identity,
                exporter: RecordExporter::new(db.clone()),
                builder: EnvelopeBuilder::new(keypair),
                db,
                peers,
                transport,
                config,
                audit,
                receiver,
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn verify_key(&self) -> VerifyKey {
        self.inner.builder.verify_key()
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Local mutations ──────────────────────────────────────────

    /// Schedules a meeting hosted by `host`, if their role allows it.
    ///
    /// The meeting and its signed audit entry are written together.
    pub fn schedule_meeting(&self, host: &Identity, details: NewMeeting) -> SyncResult<Meeting> {
        require(host, Action::ScheduleMeeting)?;
        let meeting = Meeting::schedule(host.id, details);
        let audit =
            self.inner
                .audit
                .sign("create", "meetings", Some(host.id), Some(meeting.id.to_string()))?;
        self.inner.db.with_transaction(|tx| {
            tx.insert_meeting(&meeting)?;
            tx.insert_audit(&audit)
        })?;
        info!(id = %meeting.id, host = %host.id, title = %meeting.title, "scheduled meeting");
        Ok(meeting)
    }

    /// Edits a meeting `editor` may see. The edit is stamped with
    /// `max(now, previous + 1)` so it wins over every earlier version.
    ///
    /// An edit that changes nothing is not written or audited.
    pub fn update_meeting(
        &self,
        editor: &Identity,
        id: &MeetingId,
        changes: MeetingChanges,
    ) -> SyncResult<Meeting> {
        require(editor, Action::ScheduleMeeting)?;
        let audit = self
            .inner
            .audit
            .sign("update", "meetings", Some(editor.id), Some(id.to_string()))?;
        let meeting = self.inner.db.with_transaction(|tx| {
            let Some(mut meeting) = tx.meeting(id)? else {
                return Err(StorageError::NotFound(format!("meeting {id}")));
            };
            if !allows(editor, &meeting) {
                return Ok(Err(SyncError::PermissionDenied(format!(
                    "meeting {id} is not visible to user {}",
                    editor.id
                ))));
            }
            if meeting.apply(changes) {
                tx.replace_meeting(&meeting)?;
                tx.insert_audit(&audit)?;
            }
            Ok(Ok(meeting))
        })??;
        info!(%id, editor = %editor.id, "updated meeting");
        Ok(meeting)
    }

    /// Creates a local user on behalf of `actor`.
    pub fn add_user(&self, actor: &Identity, user: NewUser) -> SyncResult<UserRecord> {
        require(actor, Action::CreateUser)?;
        let audit = self
            .inner
            .audit
            .sign("create", "users", Some(actor.id), Some(user.email.clone()))?;
        let record = self.inner.db.with_transaction(|tx| {
            let record = tx.insert_user(&user)?;
            tx.insert_audit(&audit)?;
            Ok(record)
        })?;
        info!(email = %record.email, role = %record.role, by = %actor.id, "added user");
        Ok(record)
    }

    /// Adds a community member invited by `inviter`.
    pub fn add_member(&self, inviter: &Identity, member: NewMember) -> SyncResult<Member> {
        require(inviter, Action::CreateUser)?;
        let audit = self
            .inner
            .audit
            .sign("create", "nodes", Some(inviter.id), Some(member.email.clone()))?;
        let record = self.inner.db.with_transaction(|tx| {
            let record = tx.insert_member(&member, Some(inviter.id))?;
            tx.insert_audit(&audit)?;
            Ok(record)
        })?;
        info!(email = %record.email, by = %inviter.id, "added member");
        Ok(record)
    }

    /// Audit entries, newest first, each checked against this node's key.
    pub fn audit_log(
        &self,
        viewer: &Identity,
        limit: usize,
        offset: usize,
    ) -> SyncResult<Vec<AuditView>> {
        require(viewer, Action::ViewAuditLog)?;
        let key = self.verify_key();
        let entries = self.inner.db.load_audit_log(limit, offset)?;
        Ok(entries
            .into_iter()
            .map(|record| {
                let verified = verify_audit_record(&record, &key).is_ok();
                if !verified {
                    warn!(action = %record.action, entity = %record.entity, "audit entry failed verification");
                }
                AuditView { record, verified }
            })
            .collect())
    }

    /// Members the user with `email` may see.
    pub fn members_visible_to(&self, email: &str) -> SyncResult<Vec<Member>> {
        let user = self
            .inner
            .db
            .user_by_email(email)?
            .ok_or_else(|| SyncError::UnknownRecipient(email.to_string()))?;
        Ok(self.inner.db.members_visible_to(&user.identity())?)
    }

    /// Meetings the user with `email` may see.
    pub fn meetings_visible_to(&self, email: &str) -> SyncResult<Vec<Meeting>> {
        let user = self
            .inner
            .db
            .user_by_email(email)?
            .ok_or_else(|| SyncError::UnknownRecipient(email.to_string()))?;
        Ok(self.inner.db.meetings_visible_to(&user.identity())?)
    }

    // ── Peers ────────────────────────────────────────────────────

    /// Registers (or re-pins) a peer and saves the directory.
    pub async fn add_peer(&self, peer: Peer) -> SyncResult<()> {
        let mut peers = self.inner.peers.write().await;
        peers.add(peer);
        peers.save()
    }

    pub async fn peer(&self, email: &str) -> Option<Peer> {
        self.inner.peers.read().await.get(email).cloned()
    }

    pub async fn list_peers(&self) -> Vec<Peer> {
        self.inner.peers.read().await.list().into_iter().cloned().collect()
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Selects what `email` has not seen yet and may see.
    ///
    /// The recipient's identity comes from the local users table.
    pub async fn export_for_peer(&self, email: &str) -> SyncResult<Export> {
        let peer = self
            .peer(email)
            .await
            .ok_or_else(|| SyncError::PeerNotFound(email.to_string()))?;
        let db = self.inner.db.clone();
        let exporter = self.inner.exporter.clone();
        let email = email.to_string();
        tokio::task::spawn_blocking(move || {
            let recipient = db
                .user_by_email(&email)?
                .ok_or(SyncError::UnknownRecipient(email))?
                .identity();
            exporter.export_for(peer.last_synced, &recipient)
        })
        .await
        .map_err(|e| SyncError::TaskFailed(e.to_string()))?
    }

    /// Exports, signs and seals the next envelope for `email`.
    pub async fn build_envelope_for(&self, email: &str) -> SyncResult<(Peer, Vec<u8>, Export)> {
        let peer = self
            .peer(email)
            .await
            .ok_or_else(|| SyncError::PeerNotFound(email.to_string()))?;
        let export = self.export_for_peer(email).await?;
        let payload = SyncPayload {
            records: export.records.clone(),
            sender_id: self.inner.identity.id,
            timestamp: Timestamp::now(),
        };
        let bundle = self.inner.builder.build(payload)?;
        let envelope = self.inner.builder.seal(&bundle, &peer.public_key)?;
        Ok((peer, envelope, export))
    }

    /// Runs one exchange with `email`. On success the peer's checkpoint
    /// advances; on failure it is left as it was.
    pub async fn sync_with(&self, email: &str) -> SyncOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.inner.in_flight, email) else {
            return SyncOutcome::Busy {
                email: email.to_string(),
            };
        };
        match self.exchange(email).await {
            Ok((sent, summary)) => SyncOutcome::Synced {
                email: email.to_string(),
                sent,
                summary,
            },
            Err(error) => {
                warn!(peer = %email, %error, "sync failed");
                SyncOutcome::Failed {
                    email: email.to_string(),
                    error,
                }
            }
        }
    }

    async fn exchange(&self, email: &str) -> SyncResult<(usize, Option<SyncSummary>)> {
        let (peer, envelope, export) = self.build_envelope_for(email).await?;
        let sent = export.records.len();
        let summary = self.inner.transport.send(&peer, envelope).await?;

        let mut peers = self.inner.peers.write().await;
        // The peer may have been re-pinned while the envelope was in flight.
        if peers.get(email).is_some_and(|p| p.public_key == peer.public_key) {
            peers.update_last_synced(email, export.checkpoint)?;
            peers.save()?;
            info!(peer = %email, sent, checkpoint = %export.checkpoint, "synced with peer");
        } else {
            warn!(peer = %email, "peer key changed during sync; checkpoint not advanced");
        }
        Ok((sent, summary))
    }

    /// Syncs with every known peer, at most `max_concurrent_peers` at a
    /// time. Outcomes are ordered by email.
    pub async fn sync_all(&self) -> Vec<SyncOutcome> {
        let emails: Vec<String> = self.list_peers().await.into_iter().map(|p| p.email).collect();
        let permits = Arc::new(Semaphore::new(self.inner.config.max_concurrent_peers.max(1)));
        let mut tasks = JoinSet::new();
        for email in emails {
            let service = self.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return SyncOutcome::Failed {
                        email,
                        error: SyncError::TaskFailed("worker pool closed".to_string()),
                    };
                };
                service.sync_with(&email).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "sync task failed"),
            }
        }
        outcomes.sort_by(|a, b| a.email().cmp(b.email()));
        outcomes
    }

    // ── Inbound ──────────────────────────────────────────────────

    pub async fn receive(&self, body: &[u8]) -> SyncResult<SyncSummary> {
        self.inner.receiver.receive(body).await
    }

    /// HTTP router serving `POST /sync`.
    pub fn router(&self) -> Router {
        build_router(self.inner.receiver.clone(), self.inner.config.max_envelope_bytes)
    }
}

fn require(actor: &Identity, action: Action) -> SyncResult<()> {
    if can_perform(actor.role, action) {
        Ok(())
    } else {
        Err(SyncError::PermissionDenied(format!(
            "role {} cannot {action:?}",
            actor.role
        )))
    }
}

/// Marks a peer as busy for as long as it is held.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    email: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, email: &str) -> Option<Self> {
        let mut busy = set.lock().ok()?;
        if !busy.insert(email.to_string()) {
            return None;
        }
        Some(Self {
            set,
            email: email.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.set.lock() {
            busy.remove(&self.email);
        }
    }
}

//! Server side of a sync exchange.
//!
//! Each request moves through
//!
//! ```text
//! Received → Decrypting → { Rejected | Verifying } → { Rejected | Merging } → Acknowledged
//! ```
//!
//! Nothing is written to storage before `Merging`, and the merge itself is
//! a single transaction.

use crate::envelope::verify_bundle;
use crate::error::{SyncError, SyncResult};
use crate::merge::MergeEngine;
use crate::peers::PeerDirectory;
use crate::protocol::{SealedEnvelope, SyncResponse, SyncSummary};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use spanningtree_crypto::{SigningKeypair, open};
use spanningtree_types::Meeting;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Steps of handling one inbound envelope, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    Received,
    Decrypting,
    Verifying,
    Merging,
    Acknowledged,
    Rejected,
}

/// Decrypts, verifies and merges inbound envelopes.
#[derive(Debug, Clone)]
pub struct SyncReceiver {
    keypair: Arc<SigningKeypair>,
    peers: Arc<RwLock<PeerDirectory>>,
    merge: MergeEngine,
}

impl SyncReceiver {
    pub fn new(
        keypair: Arc<SigningKeypair>,
        peers: Arc<RwLock<PeerDirectory>>,
        merge: MergeEngine,
    ) -> Self {
        Self {
            keypair,
            peers,
            merge,
        }
    }

    /// Handles one envelope body.
    ///
    /// Untrusted-input failures come back as [`SyncError::is_rejection`]
    /// errors and leave storage untouched.
    pub async fn receive(&self, body: &[u8]) -> SyncResult<SyncSummary> {
        debug!(state = ?ReceiveState::Received, bytes = body.len());
        let result = self.process(body).await;
        match &result {
            Ok(summary) => debug!(state = ?ReceiveState::Acknowledged, ?summary),
            Err(e) if e.is_rejection() => {
                warn!(state = ?ReceiveState::Rejected, error = %e, "rejected envelope")
            }
            Err(e) => warn!(error = %e, "failed to merge envelope"),
        }
        result
    }

    async fn process(&self, body: &[u8]) -> SyncResult<SyncSummary> {
        debug!(state = ?ReceiveState::Decrypting);
        let frame = SealedEnvelope::decode(body)?;
        let peer = self
            .peers
            .read()
            .await
            .find_by_public_key(&frame.sender)
            .cloned()
            .ok_or_else(|| SyncError::UnknownSender(frame.sender.to_hex()))?;
        let plaintext = open(&frame.sealed, &peer.public_key, &self.keypair)
            .map_err(|e| SyncError::Decryption(e.to_string()))?;

        debug!(state = ?ReceiveState::Verifying, peer = %peer.email);
        let bundle: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| SyncError::InvalidSignature(format!("malformed bundle: {e}")))?;
        let payload = verify_bundle(&bundle, &peer.public_key)?;

        debug!(state = ?ReceiveState::Merging, records = payload.records.len());
        let (records, undecodable) = decode_records(payload.records);
        let engine = self.merge.clone();
        let sender_id = payload.sender_id;
        let mut summary = tokio::task::spawn_blocking(move || engine.merge(&records, Some(sender_id)))
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))??;
        summary.skipped += undecodable;

        info!(
            peer = %peer.email,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "merged sync envelope"
        );
        Ok(summary)
    }
}

/// Decodes each record on its own; ones that fail are counted, not fatal.
fn decode_records(raw: Vec<Value>) -> (Vec<Meeting>, usize) {
    let mut records = Vec::with_capacity(raw.len());
    let mut undecodable = 0;
    for value in raw {
        match serde_json::from_value::<Meeting>(value) {
            Ok(meeting) => records.push(meeting),
            Err(e) => {
                warn!(error = %e, "skipping undecodable record");
                undecodable += 1;
            }
        }
    }
    (records, undecodable)
}

/// HTTP status for a failed receive.
pub fn status_for(err: &SyncError) -> StatusCode {
    if err.is_rejection() {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn sync_handler(
    State(receiver): State<Arc<SyncReceiver>>,
    body: Bytes,
) -> (StatusCode, Json<SyncResponse>) {
    match receiver.receive(&body).await {
        Ok(summary) => (StatusCode::OK, Json(SyncResponse::success(summary))),
        Err(e) => (status_for(&e), Json(SyncResponse::error(e.to_string()))),
    }
}

/// Build the `/sync` router. Bodies above `max_envelope_bytes` are refused
/// before the handler runs.
pub fn build_router(receiver: Arc<SyncReceiver>, max_envelope_bytes: usize) -> Router {
    Router::new()
        .route("/sync", post(sync_handler))
        .layer(DefaultBodyLimit::max(max_envelope_bytes))
        .with_state(receiver)
}

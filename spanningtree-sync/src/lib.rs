//! Secure peer-to-peer meeting sync for Spanning Tree.
//!
//! # Architecture
//!
//! One sync exchange pushes the meetings a peer is entitled to see from
//! this node to that peer:
//!
//! 1. **Export**: the [`PeerDirectory`] supplies the peer's checkpoint, the
//!    [`RecordExporter`] runs a range query on `last_modified` and filters
//!    the result with the *recipient's* identity
//! 2. **Envelope**: the [`EnvelopeBuilder`] signs the canonical payload and
//!    seals the signed bundle to the peer's pinned key
//! 3. **Transport**: a [`PeerTransport`] posts the frame to `{address}/sync`
//! 4. **Receive**: the [`SyncReceiver`] on the peer looks up the sender's
//!    pinned key, opens the box, verifies the signature and hands the
//!    records to the [`MergeEngine`]
//! 5. **Merge**: last-write-wins per record inside one transaction; the
//!    returned [`SyncSummary`] travels back in the response
//!
//! On success the sender advances the peer's checkpoint. The
//! [`SyncService`] owns all of the above and drives multi-peer sync with a
//! bounded worker pool.

mod audit;
mod config;
mod envelope;
mod error;
mod exporter;
mod merge;
mod peers;
pub mod protocol;
mod receiver;
mod service;
pub mod transport;

pub use audit::{AuditEntry, AuditSigner, verify_audit_record};
pub use config::{
    DEFAULT_MAX_CONCURRENT_PEERS, DEFAULT_MAX_ENVELOPE_BYTES, DEFAULT_REQUEST_TIMEOUT, SyncConfig,
};
pub use envelope::{EnvelopeBuilder, VerifiedPayload, verify_bundle};
pub use error::{SyncError, SyncResult};
pub use exporter::{Export, RecordExporter};
pub use merge::{MergeDecision, MergeEngine, resolve};
pub use peers::{Peer, PeerDirectory};
pub use protocol::{
    PROTOCOL_VERSION, SealedEnvelope, SignedBundle, SyncPayload, SyncResponse, SyncSummary,
};
pub use receiver::{ReceiveState, SyncReceiver, build_router, status_for};
pub use service::{AuditView, SyncOutcome, SyncService};
pub use transport::{HttpTransport, PeerTransport};

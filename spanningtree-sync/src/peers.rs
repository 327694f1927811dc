//! Durable registry of known peers.
//!
//! Stored as a pretty-printed JSON object keyed by email:
//!
//! ```json
//! { "b@example.org": { "email": "b@example.org", "publicKey": "…",
//!                      "address": "http://b:8000", "lastSynced": 1700000000 } }
//! ```
//!
//! A peer's public key is pinned when it is added; the receiver only
//! accepts envelopes from keys found here.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use spanningtree_crypto::VerifyKey;
use spanningtree_types::Timestamp;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A remote node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub email: String,
    pub public_key: VerifyKey,
    /// Base URL; envelopes go to `{address}/sync`.
    pub address: String,
    /// Checkpoint of the last successful sync.
    #[serde(default)]
    pub last_synced: Option<Timestamp>,
}

impl Peer {
    pub fn new(email: impl Into<String>, public_key: VerifyKey, address: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            public_key,
            address: address.into(),
            last_synced: None,
        }
    }

    pub fn sync_url(&self) -> String {
        format!("{}/sync", self.address.trim_end_matches('/'))
    }
}

/// Peers keyed by email, backed by one JSON file.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    path: PathBuf,
    peers: BTreeMap<String, Peer>,
}

impl PeerDirectory {
    /// Loads the directory at `path`. A missing file yields an empty
    /// directory; an unreadable or corrupt file is an error.
    pub fn load(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let peers = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "loaded peer directory");
        Ok(Self { path, peers })
    }

    /// Writes the directory atomically: a temp file in the same directory
    /// is fully written and synced, then renamed over the target.
    pub fn save(&self) -> SyncResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.peers)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registers a peer, replacing any previous entry for the same email.
    pub fn add(&mut self, peer: Peer) -> Option<Peer> {
        info!(email = %peer.email, public_key = %peer.public_key, "registered peer");
        self.peers.insert(peer.email.clone(), peer)
    }

    pub fn get(&self, email: &str) -> Option<&Peer> {
        self.peers.get(email)
    }

    /// All peers, ordered by email.
    pub fn list(&self) -> Vec<&Peer> {
        self.peers.values().collect()
    }

    pub fn find_by_public_key(&self, key: &VerifyKey) -> Option<&Peer> {
        self.peers.values().find(|p| &p.public_key == key)
    }

    pub fn update_last_synced(&mut self, email: &str, when: Timestamp) -> SyncResult<()> {
        let peer = self
            .peers
            .get_mut(email)
            .ok_or_else(|| SyncError::PeerNotFound(email.to_string()))?;
        peer.last_synced = Some(when);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

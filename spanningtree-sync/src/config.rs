use std::time::Duration;

/// Default timeout for one outbound `POST /sync`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of peers synced at once by `sync_all`.
pub const DEFAULT_MAX_CONCURRENT_PEERS: usize = 4;

/// Default upper bound on an inbound envelope body.
pub const DEFAULT_MAX_ENVELOPE_BYTES: usize = 8 * 1024 * 1024;

/// Tunables for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Timeout for each outbound request.
    pub request_timeout: Duration,
    /// Worker pool size for multi-peer sync.
    pub max_concurrent_peers: usize,
    /// Largest accepted `POST /sync` body.
    pub max_envelope_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_peers: DEFAULT_MAX_CONCURRENT_PEERS,
            max_envelope_bytes: DEFAULT_MAX_ENVELOPE_BYTES,
        }
    }
}

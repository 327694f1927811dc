//! Transport layer abstraction.
//!
//! A transport delivers one sealed envelope to one peer. The engine never
//! retries; a failed send is reported to the caller as is.

use crate::error::{SyncError, SyncResult};
use crate::peers::Peer;
use crate::protocol::{SyncResponse, SyncSummary};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

/// Delivers envelope bytes to a peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Sends `envelope` to `peer` exactly once.
    ///
    /// Returns the peer's merge summary when its response carries one.
    async fn send(&self, peer: &Peer, envelope: Vec<u8>) -> SyncResult<Option<SyncSummary>>;
}

/// `POST {address}/sync` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send(&self, peer: &Peer, envelope: Vec<u8>) -> SyncResult<Option<SyncSummary>> {
        let url = peer.sync_url();
        debug!(%url, bytes = envelope.len(), "sending envelope");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Timeout
                } else {
                    SyncError::Network(format!("{url}: {e}"))
                }
            })?;

        // Only 200 means the peer merged the envelope.
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SyncResponse>(&body)
                .map(|r| r.message)
                .unwrap_or(body);
            warn!(peer = %peer.email, status = status.as_u16(), %message, "peer rejected envelope");
            return Err(SyncError::PeerRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout
            } else {
                SyncError::Network(format!("{url}: {e}"))
            }
        })?;
        Ok(serde_json::from_slice::<SyncResponse>(&body)
            .ok()
            .and_then(|r| r.summary))
    }
}

/// In-process transports for testing.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records every envelope it is given and answers with a fixed summary.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Holds every send for `delay` before answering.
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        /// Fails every send with a network error.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// `(peer email, envelope)` pairs in send order.
        pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl PeerTransport for RecordingTransport {
        async fn send(&self, peer: &Peer, envelope: Vec<u8>) -> SyncResult<Option<SyncSummary>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(SyncError::Network(format!("{} unreachable", peer.address)));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((peer.email.clone(), envelope));
            }
            Ok(None)
        }
    }
}

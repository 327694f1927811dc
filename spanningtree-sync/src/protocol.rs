//! Sync protocol messages and the envelope wire frame.
//!
//! One sync exchange is a single HTTP request:
//! 1. The sender builds a [`SyncPayload`] of meetings the recipient may see
//! 2. The payload is canonically serialized and signed into a [`SignedBundle`]
//! 3. The bundle is sealed to the recipient and framed as a [`SealedEnvelope`]
//! 4. The recipient answers with a [`SyncResponse`] carrying a [`SyncSummary`]
//!
//! JSON keys are snake_case on the wire.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use spanningtree_crypto::{PUBLIC_KEY_SIZE, SEALED_OVERHEAD, Signature, VerifyKey};
use spanningtree_types::{Meeting, Timestamp, UserId};

/// Frame format version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Bytes of frame header before the sealed box.
pub const FRAME_HEADER_SIZE: usize = 1 + PUBLIC_KEY_SIZE;

/// The signed content of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub records: Vec<Meeting>,
    pub sender_id: UserId,
    pub timestamp: Timestamp,
}

/// A payload plus the sender's signature over its canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBundle {
    pub data: SyncPayload,
    pub public_key: VerifyKey,
    pub signature: Signature,
}

/// Per-merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped
    }
}

/// JSON body of every `/sync` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SyncSummary>,
}

impl SyncResponse {
    pub fn success(summary: SyncSummary) -> Self {
        Self {
            status: "success".to_string(),
            message: format!(
                "merged {} records ({} inserted, {} updated, {} skipped)",
                summary.total(),
                summary.inserted,
                summary.updated,
                summary.skipped
            ),
            summary: Some(summary),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            summary: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// The bytes posted to `/sync`:
///
/// ```text
/// version (1) || sender verify key (32) || nonce (24) || box
/// ```
///
/// The clear-text sender key only selects which pinned peer key to try;
/// the box itself authenticates the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub sender: VerifyKey,
    pub sealed: Vec<u8>,
}

impl SealedEnvelope {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + self.sealed.len());
        out.push(PROTOCOL_VERSION);
        out.extend_from_slice(&self.sender.to_bytes());
        out.extend_from_slice(&self.sealed);
        out
    }

    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        if bytes.len() < FRAME_HEADER_SIZE + SEALED_OVERHEAD {
            return Err(SyncError::Decryption(format!(
                "envelope too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != PROTOCOL_VERSION {
            return Err(SyncError::Decryption(format!(
                "unsupported envelope version {}",
                bytes[0]
            )));
        }
        let sender = VerifyKey::from_slice(&bytes[1..FRAME_HEADER_SIZE])
            .map_err(|e| SyncError::Decryption(format!("bad sender key: {e}")))?;
        Ok(Self {
            sender,
            sealed: bytes[FRAME_HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanningtree_crypto::SigningKeypair;

    #[test]
    fn frame_roundtrip() {
        let kp = SigningKeypair::generate();
        let frame = SealedEnvelope {
            sender: kp.verify_key(),
            sealed: vec![7u8; SEALED_OVERHEAD + 3],
        };
        let bytes = frame.encode();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(SealedEnvelope::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn frame_rejects_other_versions() {
        let kp = SigningKeypair::generate();
        let mut bytes = SealedEnvelope {
            sender: kp.verify_key(),
            sealed: vec![0u8; SEALED_OVERHEAD],
        }
        .encode();
        bytes[0] = 2;
        assert!(matches!(
            SealedEnvelope::decode(&bytes),
            Err(SyncError::Decryption(_))
        ));
    }

    #[test]
    fn frame_rejects_truncation() {
        assert!(SealedEnvelope::decode(&[PROTOCOL_VERSION; 10]).is_err());
    }

    #[test]
    fn error_response_omits_summary() {
        let json = serde_json::to_value(SyncResponse::error("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "message": "nope"}));
    }
}

//! Building and checking sync envelopes.
//!
//! Outbound: payload → canonical bytes → signature → [`SignedBundle`] →
//! sealed box → [`SealedEnvelope`] frame. Signing always happens before
//! sealing.
//!
//! Inbound, [`verify_bundle`] works on the JSON value the peer sent rather
//! than on a re-typed struct, so the bytes checked are exactly the bytes
//! derived from what arrived.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{SealedEnvelope, SignedBundle, SyncPayload};
use serde::Deserialize;
use serde_json::Value;
use spanningtree_crypto::{KeyStore, Signature, SigningKeypair, VerifyKey, seal};
use spanningtree_types::{Timestamp, UserId, to_canonical_bytes, value_to_canonical_bytes};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

/// Signs and seals payloads with the local node key.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    keypair: Arc<SigningKeypair>,
}

impl EnvelopeBuilder {
    pub fn new(keypair: Arc<SigningKeypair>) -> Self {
        Self { keypair }
    }

    /// Loads the node key from `dir`. Fails with [`SyncError::KeyLoad`]
    /// when the key files are missing or invalid.
    pub fn from_key_dir(dir: impl AsRef<Path>) -> SyncResult<Self> {
        let keypair = KeyStore::new(dir.as_ref()).load().map_err(|e| {
            error!(dir = %dir.as_ref().display(), error = %e, "cannot load signing key");
            SyncError::KeyLoad(e.to_string())
        })?;
        Ok(Self::new(Arc::new(keypair)))
    }

    pub fn verify_key(&self) -> VerifyKey {
        self.keypair.verify_key()
    }

    /// Signs the canonical encoding of `payload`.
    pub fn build(&self, payload: SyncPayload) -> SyncResult<SignedBundle> {
        let bytes = to_canonical_bytes(&payload)?;
        let signature = self.keypair.sign(&bytes);
        Ok(SignedBundle {
            data: payload,
            public_key: self.keypair.verify_key(),
            signature,
        })
    }

    /// Seals a signed bundle to `recipient` and frames it for the wire.
    pub fn seal(&self, bundle: &SignedBundle, recipient: &VerifyKey) -> SyncResult<Vec<u8>> {
        let plaintext = serde_json::to_vec(bundle)?;
        let sealed = seal(&plaintext, recipient, &self.keypair)?;
        debug!(
            recipient = %recipient,
            records = bundle.data.records.len(),
            bytes = sealed.len(),
            "sealed envelope"
        );
        Ok(SealedEnvelope {
            sender: self.keypair.verify_key(),
            sealed,
        }
        .encode())
    }
}

/// A payload whose signature checked out. Records are still raw JSON;
/// each one is decoded separately.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayload {
    pub records: Vec<Value>,
    pub sender_id: UserId,
    pub timestamp: Timestamp,
}

#[derive(Deserialize)]
struct RawPayload {
    records: Vec<Value>,
    sender_id: UserId,
    timestamp: Timestamp,
}

fn invalid(msg: impl Into<String>) -> SyncError {
    SyncError::InvalidSignature(msg.into())
}

/// Checks a received bundle against the sender's pinned key.
///
/// Every failure, including missing or malformed fields, is reported as
/// [`SyncError::InvalidSignature`].
pub fn verify_bundle(bundle: &Value, pinned: &VerifyKey) -> SyncResult<VerifiedPayload> {
    let fields = bundle
        .as_object()
        .ok_or_else(|| invalid("bundle is not a JSON object"))?;
    let data = fields.get("data").ok_or_else(|| invalid("missing data"))?;
    let public_key = fields
        .get("public_key")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing public_key"))?;
    let signature = fields
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing signature"))?;

    let claimed = VerifyKey::from_hex(public_key).map_err(|e| invalid(e.to_string()))?;
    if &claimed != pinned {
        return Err(invalid("public key does not match pinned peer key"));
    }
    let signature = Signature::from_hex(signature).map_err(|e| invalid(e.to_string()))?;

    let canonical = value_to_canonical_bytes(data).map_err(|e| invalid(e.to_string()))?;
    pinned.verify(&canonical, &signature)?;

    let raw: RawPayload = serde_json::from_value(data.clone())
        .map_err(|e| invalid(format!("malformed payload: {e}")))?;
    Ok(VerifiedPayload {
        records: raw.records,
        sender_id: raw.sender_id,
        timestamp: raw.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> SyncPayload {
        SyncPayload {
            records: Vec::new(),
            sender_id: UserId::new(1),
            timestamp: Timestamp::from_secs(100),
        }
    }

    #[test]
    fn built_bundle_verifies() {
        let builder = EnvelopeBuilder::new(Arc::new(SigningKeypair::generate()));
        let bundle = builder.build(payload()).unwrap();
        let value = serde_json::to_value(&bundle).unwrap();
        let verified = verify_bundle(&value, &builder.verify_key()).unwrap();
        assert_eq!(verified.sender_id, UserId::new(1));
        assert!(verified.records.is_empty());
    }

    #[test]
    fn key_order_of_received_json_does_not_matter() {
        let builder = EnvelopeBuilder::new(Arc::new(SigningKeypair::generate()));
        let bundle = builder.build(payload()).unwrap();
        let reordered = json!({
            "signature": bundle.signature.to_hex(),
            "public_key": bundle.public_key.to_hex(),
            "data": {"timestamp": 100, "sender_id": 1, "records": []},
        });
        assert!(verify_bundle(&reordered, &builder.verify_key()).is_ok());
    }

    #[test]
    fn substituted_key_is_rejected() {
        let builder = EnvelopeBuilder::new(Arc::new(SigningKeypair::generate()));
        let other = SigningKeypair::generate();
        let bundle = builder.build(payload()).unwrap();
        let value = serde_json::to_value(&bundle).unwrap();
        assert!(matches!(
            verify_bundle(&value, &other.verify_key()),
            Err(SyncError::InvalidSignature(_))
        ));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let kp = SigningKeypair::generate();
        for bundle in [json!([]), json!({"data": {}}), json!({"data": {}, "public_key": kp.verify_key().to_hex()})] {
            assert!(matches!(
                verify_bundle(&bundle, &kp.verify_key()),
                Err(SyncError::InvalidSignature(_))
            ));
        }
    }
}

//! Signed audit entries.

use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use spanningtree_crypto::{Signature, SigningKeypair, VerifyKey};
use spanningtree_storage::AuditRecord;
use spanningtree_types::{Timestamp, UserId, to_canonical_bytes};
use std::sync::Arc;

/// The signed part of an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub action: String,
    pub entity: String,
    pub performed_by: Option<UserId>,
    pub record_id: Option<String>,
    pub timestamp: Timestamp,
}

/// Signs audit entries with the node key.
#[derive(Debug, Clone)]
pub struct AuditSigner {
    keypair: Arc<SigningKeypair>,
}

impl AuditSigner {
    pub fn new(keypair: Arc<SigningKeypair>) -> Self {
        Self { keypair }
    }

    /// Signs an entry stamped now and returns the row to store.
    pub fn sign(
        &self,
        action: &str,
        entity: &str,
        performed_by: Option<UserId>,
        record_id: Option<String>,
    ) -> SyncResult<AuditRecord> {
        let entry = AuditEntry {
            action: action.to_string(),
            entity: entity.to_string(),
            performed_by,
            record_id,
            timestamp: Timestamp::now(),
        };
        let payload = to_canonical_bytes(&entry)?;
        let signature = self.keypair.sign(&payload);
        Ok(AuditRecord {
            action: entry.action,
            performed_by: entry.performed_by,
            entity: entry.entity,
            record_id: entry.record_id,
            timestamp: entry.timestamp,
            signature: signature.to_hex(),
            payload: String::from_utf8(payload)
                .map_err(|e| SyncError::Crypto(format!("audit payload is not UTF-8: {e}")))?,
        })
    }
}

/// Checks a stored audit row against the key that signed it.
pub fn verify_audit_record(record: &AuditRecord, key: &VerifyKey) -> SyncResult<()> {
    let signature = Signature::from_hex(&record.signature)?;
    key.verify(record.payload.as_bytes(), &signature)?;
    Ok(())
}

//! Signed audit log rows.
//!
//! Signing happens above this layer; storage only persists what it is
//! given, including the exact payload bytes that were signed.

use crate::database::{Database, Transaction};
use crate::error::{StorageError, StorageResult};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use spanningtree_types::{Timestamp, UserId};

/// A row of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: String,
    pub performed_by: Option<UserId>,
    pub entity: String,
    pub record_id: Option<String>,
    pub timestamp: Timestamp,
    /// Hex signature over `payload`.
    pub signature: String,
    /// Canonical JSON that was signed.
    pub payload: String,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        action: row.get(0)?,
        performed_by: row.get::<_, Option<i64>>(1)?.map(UserId::new),
        entity: row.get(2)?,
        record_id: row.get(3)?,
        timestamp: Timestamp::from_secs(row.get(4)?),
        signature: row.get(5)?,
        payload: row.get(6)?,
    })
}

fn insert(conn: &Connection, record: &AuditRecord) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO audit_log (action, performed_by, entity, record_id, timestamp, signature, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.action,
            record.performed_by.map(|u| u.get()),
            record.entity,
            record.record_id,
            record.timestamp.as_secs(),
            record.signature,
            record.payload,
        ],
    )?;
    Ok(())
}

impl Database {
    pub fn insert_audit(&self, record: &AuditRecord) -> StorageResult<()> {
        insert(&*self.lock()?, record)
    }

    /// Loads audit entries, newest first.
    pub fn load_audit_log(&self, limit: usize, offset: usize) -> StorageResult<Vec<AuditRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|_| StorageError::InvalidData(format!("audit limit {limit}")))?;
        let offset = i64::try_from(offset)
            .map_err(|_| StorageError::InvalidData(format!("audit offset {offset}")))?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT action, performed_by, entity, record_id, timestamp, signature, payload
             FROM audit_log ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let entries = stmt
            .query_map(params![limit, offset], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

impl Transaction<'_> {
    pub fn insert_audit(&self, record: &AuditRecord) -> StorageResult<()> {
        insert(self.conn(), record)
    }
}

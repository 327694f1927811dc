//! Local user accounts.

use crate::database::{Database, Transaction};
use crate::error::{StorageError, StorageResult};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use spanningtree_types::{Identity, Role, Timestamp, UserId};

/// A row of the users table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    /// Hex verify key of the user's node, when known.
    pub public_key: Option<String>,
    pub role: Role,
    pub region: Option<String>,
}

impl UserRecord {
    /// The identity used for access checks.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            role: self.role,
            region: self.region.clone(),
        }
    }
}

/// Fields of a user about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub role: Role,
    pub region: Option<String>,
    pub public_key: Option<String>,
}

const COLUMNS: &str = "id, email, public_key, role, region";

fn from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(3)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(UserRecord {
        id: UserId::new(row.get(0)?),
        email: row.get(1)?,
        public_key: row.get(2)?,
        role,
        region: row.get(4)?,
    })
}

fn insert(conn: &Connection, user: &NewUser) -> StorageResult<UserRecord> {
    conn.execute(
        "INSERT INTO users (email, public_key, role, region, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.email,
            user.public_key,
            user.role.as_str(),
            user.region,
            Timestamp::now().as_secs(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StorageError::AlreadyExists(format!("user {}", user.email))
        }
        other => other.into(),
    })?;
    Ok(UserRecord {
        id: UserId::new(conn.last_insert_rowid()),
        email: user.email.clone(),
        public_key: user.public_key.clone(),
        role: user.role,
        region: user.region.clone(),
    })
}

impl Database {
    /// Creates a user and returns the stored row.
    pub fn insert_user(&self, user: &NewUser) -> StorageResult<UserRecord> {
        insert(&*self.lock()?, user)
    }

    pub fn user(&self, id: UserId) -> StorageResult<Option<UserRecord>> {
        let user = self
            .lock()?
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                params![id.get()],
                from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let user = self
            .lock()?
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> StorageResult<Vec<UserRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))?;
        let users = stmt
            .query_map([], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

impl Transaction<'_> {
    pub fn insert_user(&self, user: &NewUser) -> StorageResult<UserRecord> {
        insert(self.conn(), user)
    }
}

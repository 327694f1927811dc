use crate::error::{StorageError, StorageResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE NOT NULL,
        public_key TEXT,
        role TEXT NOT NULL CHECK(role IN ('connector', 'shadower', 'facilitator',
                                         'municipal', 'statal', 'national', 'dev')),
        region TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS meetings (
        id TEXT PRIMARY KEY,
        host_id INTEGER NOT NULL,
        invited_by INTEGER,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        title TEXT NOT NULL,
        notes TEXT NOT NULL,
        last_modified INTEGER
    );

    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        invited_by INTEGER,
        cc_score INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL,
        performed_by INTEGER,
        entity TEXT NOT NULL,
        record_id TEXT,
        timestamp INTEGER NOT NULL,
        signature TEXT NOT NULL,
        payload TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
    CREATE INDEX IF NOT EXISTS idx_meetings_last_modified ON meetings(last_modified);
    CREATE INDEX IF NOT EXISTS idx_meetings_city_state ON meetings(city, state);
    CREATE INDEX IF NOT EXISTS idx_meetings_host ON meetings(host_id);
    CREATE INDEX IF NOT EXISTS idx_nodes_city_state ON nodes(city, state);
    CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log(entity);
";

/// Handle to the node's SQLite database.
///
/// Cloning is cheap; all clones share one connection, so writers are
/// serialized by its mutex.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Runs `f` inside one transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back otherwise. Other writers
    /// are blocked until the transaction finishes.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut conn = self.lock()?;
        let tx = Transaction {
            inner: conn.transaction()?,
        };
        match f(&tx) {
            Ok(value) => {
                tx.inner.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.inner.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// An open transaction handed to [`Database::with_transaction`] closures.
pub struct Transaction<'conn> {
    inner: rusqlite::Transaction<'conn>,
}

impl Transaction<'_> {
    pub(crate) fn conn(&self) -> &Connection {
        &self.inner
    }
}

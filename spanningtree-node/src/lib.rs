//! Configuration and bootstrap for a Spanning Tree node.
//!
//! A node keeps everything under one data directory:
//!
//! ```text
//! <data_dir>/keys/id_ed25519       node signing seed (0600)
//! <data_dir>/keys/id_ed25519.pub   node verify key
//! <data_dir>/spanning_tree.db      SQLite store
//! <data_dir>/peers.json            peer directory
//! ```

use serde::{Deserialize, Serialize};
use spanningtree_crypto::{CryptoError, KeyStore, VerifyKey};
use spanningtree_storage::{Database, NewUser, StorageError, UserRecord};
use spanningtree_sync::{HttpTransport, PeerDirectory, SyncConfig, SyncError, SyncService};
use spanningtree_types::Role;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    InvalidSetting { path: PathBuf, message: String },

    #[error("failed to encode config: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("config has no local user email; run `spanningtree init` first")]
    MissingEmail,

    #[error("no local user {0}; run `spanningtree init` first")]
    NoLocalUser(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contents of the node's TOML config file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Email of the local user this node acts as.
    pub email: Option<String>,
    pub data_dir: PathBuf,
    /// Address `serve` binds to.
    pub listen: String,
    pub sync: SyncSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            email: None,
            data_dir: PathBuf::from("spanningtree-data"),
            listen: "0.0.0.0:8000".to_string(),
            sync: SyncSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub request_timeout_secs: u64,
    pub max_concurrent_peers: usize,
    pub max_envelope_bytes: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            max_concurrent_peers: defaults.max_concurrent_peers,
            max_envelope_bytes: defaults.max_envelope_bytes,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(s: &SyncSettings) -> Self {
        SyncConfig {
            request_timeout: Duration::from_secs(s.request_timeout_secs),
            max_concurrent_peers: s.max_concurrent_peers,
            max_envelope_bytes: s.max_envelope_bytes,
        }
    }
}

impl NodeConfig {
    /// Reads the config at `path`; a missing file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> NodeResult<Self> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map_err(|source| NodeError::Config {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        config.validate().map_err(|message| NodeError::InvalidSetting {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Rejects settings the sync service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.sync.request_timeout_secs == 0 {
            return Err("sync.request_timeout_secs must be at least 1".to_string());
        }
        if self.sync.max_concurrent_peers == 0 {
            return Err("sync.max_concurrent_peers must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> NodeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn key_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("spanning_tree.db")
    }

    pub fn peers_path(&self) -> PathBuf {
        self.data_dir.join("peers.json")
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::from(&self.sync)
    }
}

/// What `init` set up.
#[derive(Debug, Clone)]
pub struct InitReport {
    pub user: UserRecord,
    pub verify_key: VerifyKey,
    pub generated_key: bool,
}

/// Creates the node key (if absent), the database and the local user.
///
/// Running it again is harmless: an existing key and user are kept.
pub fn init_node(config: &NodeConfig, role: Role, region: Option<String>) -> NodeResult<InitReport> {
    let email = config.email.clone().ok_or(NodeError::MissingEmail)?;
    let keys = KeyStore::new(config.key_dir());
    let generated_key = !keys.exists();
    let keypair = keys.load_or_generate()?;
    let verify_key = keypair.verify_key();

    let db = Database::open(config.database_path())?;
    let user = match db.user_by_email(&email)? {
        Some(user) => user,
        None => db.insert_user(&NewUser {
            email,
            role,
            region,
            public_key: Some(verify_key.to_hex()),
        })?,
    };
    info!(email = %user.email, role = %user.role, %verify_key, "node initialized");
    Ok(InitReport {
        user,
        verify_key,
        generated_key,
    })
}

/// Opens the database without loading keys, for local-only commands.
pub fn open_database(config: &NodeConfig) -> NodeResult<Database> {
    Ok(Database::open(config.database_path())?)
}

/// Builds the sync service from an initialized data directory.
pub fn open_service(config: &NodeConfig) -> NodeResult<SyncService> {
    let email = config.email.as_deref().ok_or(NodeError::MissingEmail)?;
    let keypair = KeyStore::new(config.key_dir()).load()?;
    let db = open_database(config)?;
    let user = db
        .user_by_email(email)?
        .ok_or_else(|| NodeError::NoLocalUser(email.to_string()))?;
    let peers = PeerDirectory::load(config.peers_path())?;
    let sync_config = config.sync_config();
    let transport = Arc::new(HttpTransport::new(sync_config.request_timeout)?);
    Ok(SyncService::new(
        user.identity(),
        keypair,
        db,
        peers,
        transport,
        sync_config,
    ))
}

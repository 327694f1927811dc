//! On-disk storage of a node's identity keypair.
//!
//! Two raw files live in the key directory: the 32-byte seed in
//! [`PRIVATE_KEY_FILE`] (owner read/write only) and the 32-byte verify key
//! in [`PUBLIC_KEY_FILE`].

use crate::error::{CryptoError, CryptoResult};
use crate::signing::{PUBLIC_KEY_SIZE, SEED_SIZE, SigningKeypair, VerifyKey};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

pub const PRIVATE_KEY_FILE: &str = "id_ed25519";
pub const PUBLIC_KEY_FILE: &str = "id_ed25519.pub";

/// Reads and writes the identity keypair in a directory.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    /// Returns true if the private key file is present.
    pub fn exists(&self) -> bool {
        self.private_key_path().exists()
    }

    /// Generates a keypair and writes both files.
    ///
    /// Refuses to overwrite an existing private key.
    pub fn generate_and_store(&self) -> CryptoResult<SigningKeypair> {
        let private_path = self.private_key_path();
        if private_path.exists() {
            return Err(CryptoError::KeyExists(private_path));
        }
        fs::create_dir_all(&self.dir)?;

        let keypair = SigningKeypair::generate();
        write_private(&private_path, keypair.seed().as_slice()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                CryptoError::KeyExists(private_path.clone())
            } else {
                CryptoError::Io(e)
            }
        })?;
        fs::write(self.public_key_path(), keypair.verify_key().to_bytes())?;

        info!(
            dir = %self.dir.display(),
            public_key = %keypair.verify_key(),
            "generated node identity"
        );
        Ok(keypair)
    }

    /// Loads the keypair, checking sizes and that the stored public key
    /// matches the one derived from the seed.
    pub fn load(&self) -> CryptoResult<SigningKeypair> {
        let private_path = self.private_key_path();
        let seed = Zeroizing::new(read_key_file(&private_path)?);
        let keypair = SigningKeypair::from_seed_slice(&seed).map_err(|_| CryptoError::KeyLoad {
            path: private_path.clone(),
            reason: format!("expected {SEED_SIZE} bytes, found {}", seed.len()),
        })?;

        let public_path = self.public_key_path();
        let stored = read_key_file(&public_path)?;
        if stored.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::KeyLoad {
                path: public_path,
                reason: format!("expected {PUBLIC_KEY_SIZE} bytes, found {}", stored.len()),
            });
        }
        if stored.as_slice() != keypair.verify_key().to_bytes().as_slice() {
            return Err(CryptoError::KeyLoad {
                path: public_path,
                reason: "public key does not match private key".to_string(),
            });
        }

        debug!(public_key = %keypair.verify_key(), "loaded node identity");
        Ok(keypair)
    }

    /// Loads the stored verify key without touching the seed.
    pub fn load_verify_key(&self) -> CryptoResult<VerifyKey> {
        let path = self.public_key_path();
        let bytes = read_key_file(&path)?;
        VerifyKey::from_slice(&bytes).map_err(|e| CryptoError::KeyLoad {
            path,
            reason: e.to_string(),
        })
    }

    /// Loads the keypair, generating one if no private key exists yet.
    pub fn load_or_generate(&self) -> CryptoResult<SigningKeypair> {
        if self.exists() {
            self.load()
        } else {
            self.generate_and_store()
        }
    }
}

fn read_key_file(path: &Path) -> CryptoResult<Vec<u8>> {
    fs::read(path).map_err(|e| CryptoError::KeyLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

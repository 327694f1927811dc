use spanningtree_crypto::{CryptoError, KeyStore, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
use std::fs;
use tempfile::TempDir;

// ── Generation ──────────────────────────────────────────────────

#[test]
fn generate_writes_both_files() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    let kp = store.generate_and_store().unwrap();

    assert_eq!(fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap().len(), 32);
    assert_eq!(
        fs::read(dir.path().join(PUBLIC_KEY_FILE)).unwrap(),
        kp.verify_key().to_bytes()
    );
}

#[cfg(unix)]
#[test]
fn private_key_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    store.generate_and_store().unwrap();
    let mode = fs::metadata(store.private_key_path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn generate_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    let first = store.generate_and_store().unwrap();
    let err = store.generate_and_store().unwrap_err();
    assert!(matches!(err, CryptoError::KeyExists(_)));
    assert_eq!(store.load().unwrap().verify_key(), first.verify_key());
}

#[test]
fn generate_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path().join("nested").join("keys"));
    store.generate_and_store().unwrap();
    assert!(store.exists());
}

// ── Loading ─────────────────────────────────────────────────────

#[test]
fn load_roundtrips_identity() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    let kp = store.generate_and_store().unwrap();
    assert_eq!(store.load().unwrap().verify_key(), kp.verify_key());
    assert_eq!(store.load_verify_key().unwrap(), kp.verify_key());
}

#[test]
fn load_missing_file_is_key_load_error() {
    let dir = TempDir::new().unwrap();
    let err = KeyStore::new(dir.path()).load().unwrap_err();
    assert!(matches!(err, CryptoError::KeyLoad { .. }));
}

#[test]
fn load_truncated_seed_fails() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    store.generate_and_store().unwrap();
    fs::write(store.private_key_path(), [1u8; 16]).unwrap();
    assert!(matches!(store.load(), Err(CryptoError::KeyLoad { .. })));
}

#[test]
fn load_mismatched_public_key_fails() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    store.generate_and_store().unwrap();
    fs::write(store.public_key_path(), [9u8; 32]).unwrap();
    let err = store.load().unwrap_err();
    assert!(format!("{err}").contains("does not match"));
}

#[test]
fn load_or_generate_is_stable() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::new(dir.path());
    let first = store.load_or_generate().unwrap();
    let second = store.load_or_generate().unwrap();
    assert_eq!(first.verify_key(), second.verify_key());
}

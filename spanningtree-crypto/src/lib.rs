//! Cryptography for Spanning Tree nodes.
//!
//! Each node owns one long-term Ed25519 keypair:
//!
//! 1. Signing: payloads are signed with the Ed25519 key and verified
//!    against the sender's published verify key.
//! 2. Sealing: the same keys are converted to X25519 and used for a
//!    NaCl-style authenticated box between sender and recipient.
//!
//! Key material lives in two raw files (`id_ed25519`, `id_ed25519.pub`)
//! managed by [`KeyStore`].

mod error;
mod keystore;
mod sealed;
mod signing;

pub use error::{CryptoError, CryptoResult};
pub use keystore::{KeyStore, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
pub use sealed::{NONCE_SIZE, SEALED_OVERHEAD, TAG_SIZE, open, seal};
pub use signing::{
    PUBLIC_KEY_SIZE, SEED_SIZE, SIGNATURE_SIZE, Signature, SigningKeypair, VerifyKey,
};

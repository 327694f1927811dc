//! Authenticated public-key encryption between two nodes.
//!
//! Both parties use their Ed25519 identity keys, converted to X25519, with
//! the XSalsa20-Poly1305 box construction. Output layout:
//!
//! ```text
//! nonce (24) || ciphertext || tag (16)
//! ```
//!
//! A successful [`open`] proves the message came from the holder of the
//! sender's secret key and was addressed to the recipient.

use crate::error::{CryptoError, CryptoResult};
use crate::signing::{SigningKeypair, VerifyKey};
use crypto_box::SalsaBox;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::{Aead, AeadCore};
use rand::rngs::OsRng;

/// Size of the random nonce prefix.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 tag.
pub const TAG_SIZE: usize = 16;

/// Bytes a sealed message adds over its plaintext.
pub const SEALED_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Encrypts `plaintext` from `sender` to `recipient` with a fresh nonce.
pub fn seal(
    plaintext: &[u8],
    recipient: &VerifyKey,
    sender: &SigningKeypair,
) -> CryptoResult<Vec<u8>> {
    let salsa = SalsaBox::new(&recipient.box_public(), &sender.box_secret());
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = salsa
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a message produced by [`seal`].
///
/// Fails if the data is truncated, was tampered with, or was not sealed by
/// `sender` for `recipient`.
pub fn open(sealed: &[u8], sender: &VerifyKey, recipient: &SigningKeypair) -> CryptoResult<Vec<u8>> {
    if sealed.len() < SEALED_OVERHEAD {
        return Err(CryptoError::Decryption(format!(
            "sealed message too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let salsa = SalsaBox::new(&sender.box_public(), &recipient.box_secret());
    salsa
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))
}

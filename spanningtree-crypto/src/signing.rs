//! Ed25519 signing and verification, plus conversion to X25519 box keys.

use crate::error::{CryptoError, CryptoResult};
use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey as DalekSigningKey,
    VerifyingKey as DalekVerifyingKey,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

/// Size of the private seed in bytes.
pub const SEED_SIZE: usize = 32;

/// Size of a verify key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// A node's long-term Ed25519 keypair.
///
/// The seed is zeroized when the keypair is dropped.
pub struct SigningKeypair(DalekSigningKey);

impl SigningKeypair {
    /// Generates a new random keypair.
    pub fn generate() -> Self {
        Self(DalekSigningKey::generate(&mut OsRng))
    }

    /// Creates a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        Self(DalekSigningKey::from_bytes(seed))
    }

    /// Creates a keypair from a seed of unchecked length.
    pub fn from_seed_slice(seed: &[u8]) -> CryptoResult<Self> {
        let seed: &[u8; SEED_SIZE] =
            seed.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: SEED_SIZE,
                actual: seed.len(),
            })?;
        Ok(Self::from_seed(seed))
    }

    /// Returns the raw seed.
    pub fn seed(&self) -> Zeroizing<[u8; SEED_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Returns the public verify key.
    pub fn verify_key(&self) -> VerifyKey {
        VerifyKey(self.0.verifying_key())
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    /// X25519 secret derived from the Ed25519 seed (SHA-512 scalar half).
    pub(crate) fn box_secret(&self) -> crypto_box::SecretKey {
        let scalar = Zeroizing::new(self.0.to_scalar_bytes());
        crypto_box::SecretKey::from(*scalar)
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("verify_key", &self.verify_key())
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

/// An Ed25519 public key. Serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifyKey(DalekVerifyingKey);

impl VerifyKey {
    /// Creates a verify key from raw bytes, rejecting points that do not
    /// decompress.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> CryptoResult<Self> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Creates a verify key from a slice of unchecked length.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: &[u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Self::from_bytes(bytes)
    }

    /// Parses a hex-encoded verify key.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    /// Verifies `signature` over `message`. Uses strict verification, so
    /// small-order keys and non-canonical signatures are rejected.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        self.0
            .verify_strict(message, &signature.0)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    /// X25519 public key on the birationally equivalent Montgomery curve.
    pub(crate) fn box_public(&self) -> crypto_box::PublicKey {
        crypto_box::PublicKey::from(self.0.to_montgomery().to_bytes())
    }
}

impl fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyKey({})", self.to_hex())
    }
}

impl fmt::Display for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for VerifyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VerifyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte Ed25519 signature. Serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(DalekSignature);

impl Signature {
    pub fn from_bytes(bytes: &[u8; SIGNATURE_SIZE]) -> Self {
        Self(DalekSignature::from_bytes(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        DalekSignature::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidSignature(format!(
                "expected {SIGNATURE_SIZE} bytes, got {}",
                bytes.len()
            )))
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CryptoError::InvalidSignature(format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

//! Property-based tests for signing and sealing.
//!
//! These tests check properties that must always hold:
//! - Signatures verify with the signer's key and nothing else
//! - Any single-bit change to a message, signature or key breaks verification
//! - Sealed messages open only for the intended sender/recipient pair
//! - Tampering with a sealed message is detected

use proptest::prelude::*;
use spanningtree_crypto::{
    SEALED_OVERHEAD, Signature, SigningKeypair, VerifyKey, open, seal,
};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn seed_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

fn message_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

// =============================================================================
// SIGNATURES
// =============================================================================

proptest! {
    #[test]
    fn signature_verifies_with_signer_key(seed in seed_strategy(), msg in message_strategy()) {
        let kp = SigningKeypair::from_seed(&seed);
        let sig = kp.sign(&msg);
        prop_assert!(kp.verify_key().verify(&msg, &sig).is_ok());
    }

    #[test]
    fn signing_is_deterministic(seed in seed_strategy(), msg in message_strategy()) {
        let kp = SigningKeypair::from_seed(&seed);
        prop_assert_eq!(kp.sign(&msg), kp.sign(&msg));
    }

    #[test]
    fn flipped_message_bit_fails(
        seed in seed_strategy(),
        msg in prop::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let kp = SigningKeypair::from_seed(&seed);
        let sig = kp.sign(&msg);
        let mut tampered = msg.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;
        prop_assert!(kp.verify_key().verify(&tampered, &sig).is_err());
    }

    #[test]
    fn flipped_key_bit_fails(
        seed in seed_strategy(),
        msg in message_strategy(),
        byte in 0usize..32,
        bit in 0u8..8,
    ) {
        let kp = SigningKeypair::from_seed(&seed);
        let sig = kp.sign(&msg);
        let mut key = kp.verify_key().to_bytes();
        key[byte] ^= 1 << bit;
        // A flipped key either no longer decodes or no longer verifies.
        if let Ok(tampered) = VerifyKey::from_bytes(&key) {
            prop_assert!(tampered.verify(&msg, &sig).is_err());
        }
    }

    #[test]
    fn flipped_signature_bit_fails(
        seed in seed_strategy(),
        msg in message_strategy(),
        index in 0usize..64,
        bit in 0u8..8,
    ) {
        let kp = SigningKeypair::from_seed(&seed);
        let mut bytes = kp.sign(&msg).to_bytes();
        bytes[index] ^= 1 << bit;
        let sig = Signature::from_bytes(&bytes);
        prop_assert!(kp.verify_key().verify(&msg, &sig).is_err());
    }

    #[test]
    fn verify_key_hex_roundtrip(seed in seed_strategy()) {
        let vk = SigningKeypair::from_seed(&seed).verify_key();
        prop_assert_eq!(VerifyKey::from_hex(&vk.to_hex()).unwrap(), vk);
    }
}

// =============================================================================
// SEALING
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sealed_length_is_plaintext_plus_overhead(msg in message_strategy()) {
        let a = SigningKeypair::generate();
        let b = SigningKeypair::generate();
        let sealed = seal(&msg, &b.verify_key(), &a).unwrap();
        prop_assert_eq!(sealed.len(), msg.len() + SEALED_OVERHEAD);
        prop_assert_eq!(open(&sealed, &a.verify_key(), &b).unwrap(), msg);
    }

    #[test]
    fn tampered_sealed_message_fails(
        msg in prop::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
    ) {
        let a = SigningKeypair::generate();
        let b = SigningKeypair::generate();
        let mut sealed = seal(&msg, &b.verify_key(), &a).unwrap();
        let i = index.index(sealed.len());
        sealed[i] ^= 0x01;
        prop_assert!(open(&sealed, &a.verify_key(), &b).is_err());
    }
}

#[test]
fn wrong_recipient_cannot_open() {
    let a = SigningKeypair::generate();
    let b = SigningKeypair::generate();
    let eve = SigningKeypair::generate();
    let sealed = seal(b"secret", &b.verify_key(), &a).unwrap();
    assert!(open(&sealed, &a.verify_key(), &eve).is_err());
}

#[test]
fn wrong_claimed_sender_cannot_open() {
    let a = SigningKeypair::generate();
    let b = SigningKeypair::generate();
    let eve = SigningKeypair::generate();
    let sealed = seal(b"secret", &b.verify_key(), &a).unwrap();
    assert!(open(&sealed, &eve.verify_key(), &b).is_err());
}

#[test]
fn self_addressed_box_opens() {
    let a = SigningKeypair::generate();
    let sealed = seal(b"note to self", &a.verify_key(), &a).unwrap();
    assert_eq!(open(&sealed, &a.verify_key(), &a).unwrap(), b"note to self");
}

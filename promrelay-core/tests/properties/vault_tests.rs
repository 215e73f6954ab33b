//! Property tests for the credential vault

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;
use promrelay_core::{Vault, VaultError};

proptest! {
    /// Property: decrypt(encrypt(s)) == s for every string
    #[test]
    fn round_trip_any_string(plaintext in any::<String>()) {
        let vault = Vault::with_fallback_key();
        let stored = vault.encrypt(&plaintext).unwrap();
        prop_assert_eq!(vault.decrypt(&stored).unwrap(), plaintext);
    }

    /// Property: round trip holds for any 32-byte key
    #[test]
    fn round_trip_any_key(key in proptest::collection::vec(any::<u8>(), 32), plaintext in ".{0,64}") {
        let vault = Vault::from_key_bytes(&key).unwrap();
        let stored = vault.encrypt(&plaintext).unwrap();
        prop_assert_eq!(vault.decrypt(&stored).unwrap(), plaintext);
    }

    /// Property: ciphertext is IV plus exactly one byte per plaintext byte
    #[test]
    fn ciphertext_length(plaintext in any::<String>()) {
        let vault = Vault::with_fallback_key();
        let raw = STANDARD.decode(vault.encrypt(&plaintext).unwrap()).unwrap();
        prop_assert_eq!(raw.len(), 16 + plaintext.len());
    }

    /// Property: payloads shorter than one block are rejected
    #[test]
    fn short_payload_rejected(payload in proptest::collection::vec(any::<u8>(), 0..16)) {
        let vault = Vault::with_fallback_key();
        let result = vault.decrypt(&STANDARD.encode(&payload));
        let is_short = matches!(result, Err(VaultError::ShortCiphertext { len }) if len == payload.len());
        prop_assert!(is_short);
    }

    /// Property: keys of any other length are refused
    #[test]
    fn wrong_key_length_rejected(len in (0usize..128).prop_filter("not 32", |l| *l != 32)) {
        let is_invalid = matches!(
            Vault::from_key_bytes(&vec![0u8; len]),
            Err(VaultError::InvalidKeyLength { len: got }) if got == len
        );
        prop_assert!(is_invalid);
    }
}

#[test]
fn encryptions_of_same_text_differ() {
    let vault = Vault::with_fallback_key();
    let samples: Vec<_> = (0..32).map(|_| vault.encrypt("same").unwrap()).collect();
    for (i, a) in samples.iter().enumerate() {
        for b in &samples[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

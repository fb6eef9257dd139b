//! Access key derivation using HKDF
//!
//! An access key lets the delivery server route a sealed-sender message to a
//! recipient without learning who sent it. The key is either derived from the
//! recipient's profile key or, for unrestricted recipients, drawn at random.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::AccessKeyError;

/// Length of an access key in bytes.
pub const ACCESS_KEY_LEN: usize = 16;

/// Length of a well-formed profile key in bytes.
pub const PROFILE_KEY_LEN: usize = 32;

/// Label used for access key derivation
const ACCESS_KEY_LABEL: &[u8] = b"shroudUnidentifiedAccessV1";

/// A 16-byte sealed-sender access key.
///
/// Never persisted: recomputed on demand from a profile key or fresh
/// randomness. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    key: [u8; ACCESS_KEY_LEN],
}

impl AccessKey {
    /// Build an access key from caller-provided random bytes.
    ///
    /// Caller MUST provide cryptographically secure random bytes in
    /// production and MUST NOT reuse them across requests.
    pub fn from_random(random_bytes: [u8; ACCESS_KEY_LEN]) -> Self {
        Self { key: random_bytes }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; ACCESS_KEY_LEN] {
        &self.key
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessKey(..)")
    }
}

impl Drop for AccessKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Derive the access key for a recipient from their profile key.
///
/// # Security
///
/// - Deterministic: the same profile key always yields the same access key
/// - One-way: the access key reveals nothing usable about the profile key
///
/// # Errors
///
/// - `AccessKeyError::InvalidKeyMaterial` if `profile_key` is not exactly
///   [`PROFILE_KEY_LEN`] bytes
pub fn derive_access_key(profile_key: &[u8]) -> Result<AccessKey, AccessKeyError> {
    if profile_key.len() != PROFILE_KEY_LEN {
        return Err(AccessKeyError::InvalidKeyMaterial {
            expected: PROFILE_KEY_LEN,
            actual: profile_key.len(),
        });
    }

    let hkdf = Hkdf::<Sha256>::new(None, profile_key);

    let mut key = [0u8; ACCESS_KEY_LEN];
    let Ok(()) = hkdf.expand(ACCESS_KEY_LABEL, &mut key) else {
        unreachable!("16 bytes is a valid HKDF-SHA256 output length");
    };

    Ok(AccessKey { key })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn test_profile_key() -> [u8; PROFILE_KEY_LEN] {
        let mut key = [0u8; PROFILE_KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn derive_is_deterministic() {
        let key1 = derive_access_key(&test_profile_key()).unwrap();
        let key2 = derive_access_key(&test_profile_key()).unwrap();

        assert_eq!(key1, key2, "same profile key must produce same access key");
    }

    #[test]
    fn derive_matches_known_vector() {
        // HKDF-SHA256(ikm = 32 zero bytes, salt = none, info = label), L = 16
        let key = derive_access_key(&[0u8; PROFILE_KEY_LEN]).unwrap();
        assert_eq!(hex::encode(key.as_bytes()), "703418c903626a9893ceeced3748ea65");
    }

    #[test]
    fn different_profile_keys_produce_different_access_keys() {
        let mut other = test_profile_key();
        other[0] ^= 0xFF;

        let key_a = derive_access_key(&test_profile_key()).unwrap();
        let key_b = derive_access_key(&other).unwrap();

        assert_ne!(key_a, key_b);
    }

    #[test]
    fn short_profile_key_rejected() {
        let result = derive_access_key(&[0u8; 16]);
        assert_eq!(result, Err(AccessKeyError::InvalidKeyMaterial { expected: 32, actual: 16 }));
    }

    #[test]
    fn empty_profile_key_rejected() {
        let result = derive_access_key(&[]);
        assert!(matches!(result, Err(AccessKeyError::InvalidKeyMaterial { actual: 0, .. })));
    }

    #[test]
    fn long_profile_key_rejected() {
        let result = derive_access_key(&[0xAB; 33]);
        assert!(matches!(result, Err(AccessKeyError::InvalidKeyMaterial { actual: 33, .. })));
    }

    #[test]
    fn random_key_keeps_supplied_bytes() {
        let key = AccessKey::from_random([7u8; ACCESS_KEY_LEN]);
        assert_eq!(key.as_bytes(), &[7u8; ACCESS_KEY_LEN]);
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = AccessKey::from_random([0xAB; ACCESS_KEY_LEN]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("171"));
        assert!(!rendered.to_lowercase().contains("ab"));
    }

    proptest! {
        #[test]
        fn prop_only_profile_key_length_matters(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let result = derive_access_key(&bytes);
            prop_assert_eq!(result.is_ok(), bytes.len() == PROFILE_KEY_LEN);
        }

        #[test]
        fn prop_derivation_deterministic(key in any::<[u8; 32]>()) {
            prop_assert_eq!(derive_access_key(&key).unwrap(), derive_access_key(&key).unwrap());
        }
    }
}

//! Compiled-in roots of trust, one per deployment.

use std::fmt;

use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::TrustRootError;

/// Production trust root (Ed25519 public key).
const PRODUCTION_TRUST_ROOT: [u8; 32] = [
    0x3e, 0x11, 0x98, 0x46, 0x78, 0x49, 0x77, 0x95, 0x93, 0x95, 0x37, 0x3b, 0x29, 0xa1, 0x76, 0x0c,
    0xd2, 0xfa, 0x97, 0xc5, 0x61, 0x63, 0x10, 0x01, 0xd3, 0x0e, 0x52, 0xe7, 0x13, 0x65, 0xcf, 0xc3,
];

/// Staging trust root (Ed25519 public key).
const STAGING_TRUST_ROOT: [u8; 32] = [
    0x3f, 0x37, 0x47, 0xf2, 0x32, 0x05, 0xe9, 0xdd, 0x74, 0xeb, 0x92, 0x37, 0x54, 0xdf, 0xc9, 0xca,
    0x23, 0x62, 0x63, 0x77, 0x40, 0x42, 0x6c, 0xdf, 0x4b, 0x08, 0x40, 0x45, 0x43, 0xfe, 0x42, 0xdc,
];

/// Deployment environment. Each has its own trust root and certificate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Deployment {
    /// Production servers
    #[default]
    Production,
    /// Staging servers
    Staging,
}

impl Deployment {
    /// Stable lowercase name, used in storage keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed public key that anchors every sender certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustRoot {
    key: VerifyingKey,
}

impl TrustRoot {
    /// Trust root compiled in for `deployment`.
    ///
    /// # Errors
    ///
    /// - `TrustRootError::InvalidKey` if the embedded bytes are not a public
    ///   key. This is a build defect, not a runtime condition.
    pub fn for_deployment(deployment: Deployment) -> Result<Self, TrustRootError> {
        match deployment {
            Deployment::Production => Self::from_bytes(&PRODUCTION_TRUST_ROOT),
            Deployment::Staging => Self::from_bytes(&STAGING_TRUST_ROOT),
        }
    }

    /// Trust root from raw Ed25519 public key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrustRootError> {
        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TrustRootError::InvalidLength { expected: 32, actual: bytes.len() })?;
        let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| TrustRootError::InvalidKey)?;

        Ok(Self { key })
    }

    /// Public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub(crate) fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.key.verify_strict(message, signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_roots_parse() {
        assert!(TrustRoot::for_deployment(Deployment::Production).is_ok());
        assert!(TrustRoot::for_deployment(Deployment::Staging).is_ok());
    }

    #[test]
    fn deployments_have_distinct_roots() {
        let production = TrustRoot::for_deployment(Deployment::Production).unwrap();
        let staging = TrustRoot::for_deployment(Deployment::Staging).unwrap();
        assert_ne!(production, staging);
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(
            TrustRoot::from_bytes(&[0u8; 31]),
            Err(TrustRootError::InvalidLength { expected: 32, actual: 31 })
        );
    }

    #[test]
    fn from_bytes_roundtrips_embedded_key() {
        let root = TrustRoot::for_deployment(Deployment::Production).unwrap();
        assert_eq!(root.to_bytes(), PRODUCTION_TRUST_ROOT);
    }

    #[test]
    fn deployment_names_are_stable() {
        assert_eq!(Deployment::Production.to_string(), "production");
        assert_eq!(Deployment::Staging.as_str(), "staging");
        assert_eq!(Deployment::default(), Deployment::Production);
    }
}

//! Error types for access keys, certificates, and the trust root.

use thiserror::Error;

/// Errors from access key derivation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessKeyError {
    /// Profile key is not well-formed key material
    #[error("invalid key material: expected {expected} byte profile key, got {actual}")]
    InvalidKeyMaterial {
        /// Required profile key length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
}

/// Errors from parsing or validating a sender certificate.
///
/// All variants are recoverable: the caller treats the certificate as absent
/// and may fetch a fresh one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// Bytes do not decode into the certificate structure
    #[error("malformed certificate: {reason}")]
    Malformed {
        /// What failed to decode
        reason: String,
    },

    /// A link of the signature chain did not verify
    #[error("invalid signature on {link} certificate")]
    InvalidSignature {
        /// Which certificate in the chain failed ("server" or "sender")
        link: &'static str,
    },

    /// Server certificate was issued under a revoked key id
    #[error("server certificate key id {key_id} is revoked")]
    RevokedServerKey {
        /// Revoked key id
        key_id: u32,
    },

    /// Certificate does not outlive the validation horizon
    #[error(
        "certificate expires at {expires_ms}ms, not after validation time {validation_time_ms}ms"
    )]
    Expired {
        /// Expiry embedded in the certificate (ms since Unix epoch)
        expires_ms: u64,
        /// Validation horizon supplied by the caller (ms since Unix epoch)
        validation_time_ms: u64,
    },
}

impl CertificateError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed { reason: reason.into() }
    }
}

/// The compiled-in trust root cannot be used.
///
/// Unlike [`CertificateError`] this is a configuration failure: no certificate
/// could ever be trusted, so the process must not continue with sealed sender.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustRootError {
    /// Key bytes have the wrong length
    #[error("trust root must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Key bytes are not a valid Ed25519 public key
    #[error("trust root is not a valid Ed25519 public key")]
    InvalidKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_message_names_both_times() {
        let err = CertificateError::Expired { expires_ms: 10, validation_time_ms: 20 };
        let message = err.to_string();
        assert!(message.contains("10ms"));
        assert!(message.contains("20ms"));
    }

    #[test]
    fn invalid_key_material_reports_lengths() {
        let err = AccessKeyError::InvalidKeyMaterial { expected: 32, actual: 7 };
        assert_eq!(err.to_string(), "invalid key material: expected 32 byte profile key, got 7");
    }
}

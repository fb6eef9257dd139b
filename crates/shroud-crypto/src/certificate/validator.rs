//! Sender certificate validation
//!
//! Checks performed, in order:
//! - Server key id is not revoked
//! - Server certificate signature (trust root over server certificate bytes)
//! - Sender certificate signature (server key over sender certificate bytes)
//! - Expiry strictly after the validation time
//!
//! It does NOT check that the certificate names the local account; the
//! server only issues certificates for the authenticated caller.

use super::{SenderCertificate, TrustRoot};
use crate::error::CertificateError;

/// Validates sender certificates against a [`TrustRoot`].
#[derive(Debug, Clone)]
pub struct CertificateValidator {
    trust_root: TrustRoot,
    revoked_key_ids: Vec<u32>,
}

impl CertificateValidator {
    /// Validator with no revoked server keys.
    pub fn new(trust_root: TrustRoot) -> Self {
        Self { trust_root, revoked_key_ids: Vec::new() }
    }

    /// Reject server certificates issued under any of `key_ids`.
    #[must_use]
    pub fn with_revoked_key_ids(mut self, key_ids: impl IntoIterator<Item = u32>) -> Self {
        self.revoked_key_ids.extend(key_ids);
        self
    }

    /// Trust root this validator checks against.
    pub fn trust_root(&self) -> &TrustRoot {
        &self.trust_root
    }

    /// Validate `certificate` as of `validation_time_ms`.
    ///
    /// Callers that are about to send should pass a horizon in the future
    /// (e.g. now + 1 hour) so that a certificate close to expiry is rejected
    /// before the send begins.
    ///
    /// # Errors
    ///
    /// - `CertificateError::RevokedServerKey` if the signer's key id is revoked
    /// - `CertificateError::InvalidSignature` if either chain link fails
    /// - `CertificateError::Expired` if `expires_ms <= validation_time_ms`
    pub fn validate(
        &self,
        certificate: &SenderCertificate,
        validation_time_ms: u64,
    ) -> Result<(), CertificateError> {
        let signer = certificate.signer();

        if self.revoked_key_ids.contains(&signer.key_id()) {
            return Err(CertificateError::RevokedServerKey { key_id: signer.key_id() });
        }

        if !self.trust_root.verify(signer.signed_bytes(), signer.signature()) {
            return Err(CertificateError::InvalidSignature { link: "server" });
        }

        if signer.key().verify_strict(certificate.signed_bytes(), certificate.signature()).is_err()
        {
            return Err(CertificateError::InvalidSignature { link: "sender" });
        }

        if certificate.expires_ms() <= validation_time_ms {
            return Err(CertificateError::Expired {
                expires_ms: certificate.expires_ms(),
                validation_time_ms,
            });
        }

        Ok(())
    }

    /// Boolean form of [`validate`](Self::validate).
    pub fn is_valid(&self, certificate: &SenderCertificate, validation_time_ms: u64) -> bool {
        self.validate(certificate, validation_time_ms).is_ok()
    }
}

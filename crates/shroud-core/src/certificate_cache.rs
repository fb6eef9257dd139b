//! Single-slot sender certificate cache.
//!
//! # State Machine
//!
//! ```text
//! ┌───────┐  persisted blob validates at now+margin   ┌───────┐
//! │ Empty │──────────────────────────────────────────>│ Valid │
//! └───────┘  or fetched blob validates (persisted)    └───────┘
//!     ↑                                                   │
//!     │          validation at now+margin fails           │
//!     └───────────────────────────────────────────────────┘
//! ```
//!
//! Each deployment has its own slot. There is no background refresh: the
//! slot is repopulated on demand or when the registration state changes.

use shroud_crypto::{CertificateValidator, Deployment, SenderCertificate};
use tracing::{debug, info, warn};

use crate::{
    error::UdError,
    storage::{Storage, StoredValue},
};

/// Collection holding the certificate slots and the unrestricted flag.
pub const UD_STATE_COLLECTION: &str = "ud.state";

/// Storage key of the certificate slot for `deployment`.
pub fn certificate_slot_key(deployment: Deployment) -> &'static str {
    match deployment {
        Deployment::Production => "sender_certificate.production",
        Deployment::Staging => "sender_certificate.staging",
    }
}

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing validated in memory
    Empty,
    /// A validated certificate is mirrored in memory
    Valid {
        /// Expiry of the mirrored certificate (ms since Unix epoch)
        expires_ms: u64,
    },
}

/// Persisted certificate slot with an in-memory mirror.
///
/// # Invariants
///
/// - The mirror only ever holds a certificate that passed validation
/// - The persisted slot is only ever written with bytes that passed validation
/// - Everything returned has been validated at `now + expiry_margin`
pub struct CertificateCache<S: Storage> {
    storage: S,
    deployment: Deployment,
    validator: CertificateValidator,
    expiry_margin_ms: u64,
    mirror: Option<SenderCertificate>,
}

impl<S: Storage> CertificateCache<S> {
    /// Cache for `deployment`, validating with `validator`.
    pub fn new(
        storage: S,
        deployment: Deployment,
        validator: CertificateValidator,
        expiry_margin_ms: u64,
    ) -> Self {
        Self { storage, deployment, validator, expiry_margin_ms, mirror: None }
    }

    /// Current state of the in-memory mirror.
    pub fn state(&self) -> CacheState {
        match &self.mirror {
            Some(cert) => CacheState::Valid { expires_ms: cert.expires_ms() },
            None => CacheState::Empty,
        }
    }

    /// True if `certificate` passes validation at `now_ms + margin`.
    pub fn is_valid_certificate(&self, certificate: &SenderCertificate, now_ms: u64) -> bool {
        self.validator.is_valid(certificate, self.horizon(now_ms))
    }

    /// Valid cached certificate, loading the persisted slot if needed.
    ///
    /// Never touches the network. A certificate that no longer validates is
    /// dropped from memory and from the slot.
    pub fn current(&mut self, now_ms: u64) -> Option<SenderCertificate> {
        if let Some(cert) = &self.mirror {
            if self.is_valid_certificate(cert, now_ms) {
                return Some(cert.clone());
            }

            info!(
                deployment = %self.deployment,
                expires_ms = cert.expires_ms(),
                "Cached sender certificate inside expiry margin, discarding"
            );
            self.clear();
            return None;
        }

        let cert = self.load_persisted(now_ms)?;
        self.mirror = Some(cert.clone());
        Some(cert)
    }

    /// Validate `bytes` and, if valid, persist them and mirror the result.
    ///
    /// Nothing is written when validation fails.
    ///
    /// # Errors
    ///
    /// - `UdError::CertificateInvalid` if parsing or validation fails
    /// - `UdError::Storage` if the slot cannot be written
    pub fn store(&mut self, bytes: &[u8], now_ms: u64) -> Result<SenderCertificate, UdError> {
        let cert = SenderCertificate::deserialize(bytes)?;
        self.validator.validate(&cert, self.horizon(now_ms))?;

        self.storage.set(
            UD_STATE_COLLECTION,
            certificate_slot_key(self.deployment),
            StoredValue::Bytes(cert.serialized().to_vec()),
        )?;

        debug!(
            deployment = %self.deployment,
            expires_ms = cert.expires_ms(),
            "Stored sender certificate"
        );
        self.mirror = Some(cert.clone());
        Ok(cert)
    }

    /// Forget the certificate in memory and in the slot.
    pub fn clear(&mut self) {
        self.mirror = None;
        let key = certificate_slot_key(self.deployment);
        if let Err(e) = self.storage.remove(UD_STATE_COLLECTION, key) {
            warn!(deployment = %self.deployment, error = %e, "Failed to clear certificate slot");
        }
    }

    fn load_persisted(&mut self, now_ms: u64) -> Option<SenderCertificate> {
        let slot = certificate_slot_key(self.deployment);

        let bytes = match self.storage.get(UD_STATE_COLLECTION, slot) {
            Ok(Some(StoredValue::Bytes(bytes))) => bytes,
            Ok(None) => return None,
            Ok(Some(other)) => {
                warn!(deployment = %self.deployment, ?other, "Certificate slot has wrong type");
                self.clear();
                return None;
            },
            Err(e) => {
                warn!(deployment = %self.deployment, error = %e, "Failed to read certificate slot");
                return None;
            },
        };

        let validated = SenderCertificate::deserialize(&bytes)
            .and_then(|cert| self.validator.validate(&cert, self.horizon(now_ms)).map(|()| cert));

        match validated {
            Ok(cert) => {
                debug!(deployment = %self.deployment, "Loaded persisted sender certificate");
                Some(cert)
            },
            Err(e) => {
                info!(
                    deployment = %self.deployment,
                    error = %e,
                    "Persisted sender certificate rejected"
                );
                self.clear();
                None
            },
        }
    }

    fn horizon(&self, now_ms: u64) -> u64 {
        now_ms.saturating_add(self.expiry_margin_ms)
    }
}

//! Error types for the unidentified-delivery core.
//!
//! Recoverable conditions (bad certificate, fetch failure, storage hiccup)
//! are distinct from the one fatal condition: a trust root that cannot be
//! parsed, which means no certificate could ever be trusted.

use shroud_crypto::{CertificateError, TrustRootError};
use thiserror::Error;

use crate::{account::FetchError, storage::StorageError};

/// Errors surfaced by [`UdManager`](crate::UdManager) and
/// [`UdHandle`](crate::UdHandle).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UdError {
    /// Server returned a certificate that failed parsing or validation
    #[error("sender certificate invalid: {0}")]
    CertificateInvalid(#[from] CertificateError),

    /// Certificate fetch failed
    #[error("certificate fetch failed: {0}")]
    Transport(#[from] FetchError),

    /// Persistent storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Compiled-in trust root is unusable
    #[error("trust root misconfigured: {0}")]
    ConfigurationFatal(TrustRootError),

    /// The service actor is no longer running
    #[error("unidentified delivery service stopped")]
    ServiceStopped,
}

impl UdError {
    /// Returns true if retrying later may succeed.
    ///
    /// A fresh fetch can replace a bad certificate and storage may recover.
    /// A broken trust root or a stopped service never recovers.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CertificateInvalid(_) | Self::Transport(_) | Self::Storage(_))
    }
}

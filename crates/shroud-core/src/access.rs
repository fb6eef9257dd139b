//! Access material handed to the send pipeline.
//!
//! Everything here is request-scoped: created per call, never cached, never
//! persisted.

use shroud_crypto::{AccessKey, SenderCertificate};

use crate::access_mode::AccessMode;

/// Access key for one party, with how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdAccess {
    /// Key presented to the server
    pub access_key: AccessKey,
    /// Mode that selected the key
    pub mode: AccessMode,
    /// True if the key is fresh randomness rather than a profile-key
    /// derivation
    pub is_random_key: bool,
}

/// Access key paired with the certificate to present alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdSendingAccess {
    /// Access material
    pub access: UdAccess,
    /// Validated sender certificate
    pub sender_certificate: SenderCertificate,
}

/// Everything needed to send one sealed-sender message.
///
/// `target` addresses the recipient; `sender` addresses the local account
/// (sync transcripts to linked devices travel with it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessBundle {
    /// Access to the recipient
    pub target: UdSendingAccess,
    /// Access to the local account
    pub sender: UdSendingAccess,
}

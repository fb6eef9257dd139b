//! Collaborators owned by the rest of the application.
//!
//! The access-control core consumes these through traits so that the account
//! database, the profile manager, and the network layer stay outside it.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex},
};

use thiserror::Error;

/// Stable identity of a message recipient (account id or phone number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(String);

impl RecipientId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of the local account.
pub trait LocalIdentity: Send + Sync + 'static {
    /// Local recipient id. `None` before registration.
    fn local_recipient_id(&self) -> Option<RecipientId>;
}

/// Profile keys of known recipients, including the local account.
pub trait ProfileKeyLookup: Send + Sync + 'static {
    /// Profile key bytes for `recipient`. `None` if unknown.
    fn profile_key(&self, recipient: &RecipientId) -> Option<Vec<u8>>;
}

/// Errors from the certificate fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with a failure status
    #[error("server rejected certificate request with status {status}")]
    Rejected {
        /// Response status code
        status: u16,
    },
}

/// Fetches a fresh sender certificate from the server.
///
/// Authentication is implicit (the fetcher owns account credentials).
/// Timeouts are the fetcher's responsibility.
pub trait CertificateFetcher: Send + Sync + 'static {
    /// Raw certificate bytes as returned by the server.
    fn fetch_sender_certificate(
        &self,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Pushes account attributes to the server.
pub trait AccountAttributesSync: Send + Sync + 'static {
    /// Request an attribute upload. Fire-and-forget.
    fn request_sync(&self);
}

/// In-memory account directory for tests and tools.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryAccount {
    inner: Arc<Mutex<InMemoryAccountInner>>,
}

#[derive(Default)]
struct InMemoryAccountInner {
    local: Option<RecipientId>,
    profile_keys: HashMap<RecipientId, Vec<u8>>,
}

impl InMemoryAccount {
    /// Empty directory with no local account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `local` as the local account.
    #[allow(clippy::expect_used)]
    pub fn set_local_recipient(&self, local: Option<RecipientId>) {
        self.inner.lock().expect("Mutex poisoned").local = local;
    }

    /// Record `key` as the profile key of `recipient`.
    #[allow(clippy::expect_used)]
    pub fn set_profile_key(&self, recipient: RecipientId, key: Vec<u8>) {
        self.inner.lock().expect("Mutex poisoned").profile_keys.insert(recipient, key);
    }

    /// Forget the profile key of `recipient`.
    #[allow(clippy::expect_used)]
    pub fn clear_profile_key(&self, recipient: &RecipientId) {
        self.inner.lock().expect("Mutex poisoned").profile_keys.remove(recipient);
    }
}

impl LocalIdentity for InMemoryAccount {
    #[allow(clippy::expect_used)]
    fn local_recipient_id(&self) -> Option<RecipientId> {
        self.inner.lock().expect("Mutex poisoned").local.clone()
    }
}

impl ProfileKeyLookup for InMemoryAccount {
    #[allow(clippy::expect_used)]
    fn profile_key(&self, recipient: &RecipientId) -> Option<Vec<u8>> {
        self.inner.lock().expect("Mutex poisoned").profile_keys.get(recipient).cloned()
    }
}

//! Events fed into the manager and actions it asks the caller to execute.

/// Events delivered to [`UdManager::handle_event`](crate::UdManager::handle_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdEvent {
    /// Account registration state changed
    RegistrationStateChanged {
        /// Whether the account is now registered
        registered: bool,
    },
}

/// Side effects the manager cannot perform itself.
///
/// The caller (or [`UdService`](crate::UdService)) executes these:
/// - `RefreshCertificate`: call `ensure_sender_certificate` with a fetcher
/// - `SyncAccountAttributes`: notify the account-attribute collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdAction {
    /// Make sure a valid sender certificate is cached
    RefreshCertificate,
    /// Push account attributes so the server sees the current capability flags
    SyncAccountAttributes,
}

//! Single-owner service around [`UdManager`].
//!
//! The manager mutates shared state (certificate slot, flags), so exactly one
//! task owns it. Callers talk to that task through a cloneable [`UdHandle`];
//! commands queue on a bounded channel and are processed one at a time.
//!
//! Certificate fetches never run inside the command loop. On a cache miss the
//! service spawns the fetch as its own task, which posts the raw bytes back as
//! a command; validation and the write still happen on the owning task.
//! Callers that need a certificate wait on that fetch, everyone else keeps
//! being served from the cache.
//!
//! ```text
//! UdHandle ──┐
//! UdHandle ──┼── mpsc ──> UdService::run ──> UdManager
//! UdHandle ──┘   ↑              │
//!                │              ├── spawn ──> CertificateFetcher
//!                │              │                  │
//!                └──────────────┼── CertificateFetched
//!                               └── AccountAttributesSync
//! ```

use std::sync::Arc;

use shroud_crypto::SenderCertificate;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    access::{AccessBundle, UdAccess},
    access_mode::AccessMode,
    account::{
        AccountAttributesSync, CertificateFetcher, FetchError, LocalIdentity, ProfileKeyLookup,
        RecipientId,
    },
    env::Environment,
    error::UdError,
    event::{UdAction, UdEvent},
    manager::UdManager,
    storage::Storage,
};

type CertificateReply = oneshot::Sender<Result<SenderCertificate, UdError>>;

enum Command {
    IsEnabled {
        reply: oneshot::Sender<bool>,
    },
    AccessMode {
        recipient: RecipientId,
        reply: oneshot::Sender<AccessMode>,
    },
    SetAccessMode {
        recipient: RecipientId,
        mode: AccessMode,
        reply: oneshot::Sender<Result<(), UdError>>,
    },
    UdAccess {
        recipient: RecipientId,
        reply: oneshot::Sender<Option<UdAccess>>,
    },
    SendingAccess {
        recipient: RecipientId,
        reply: oneshot::Sender<Option<AccessBundle>>,
    },
    EnsureSenderCertificate {
        reply: CertificateReply,
    },
    CertificateFetched {
        result: Result<Vec<u8>, FetchError>,
    },
    ShouldAllowUnrestricted {
        reply: oneshot::Sender<bool>,
    },
    SetShouldAllowUnrestricted {
        allow: bool,
        reply: oneshot::Sender<Result<(), UdError>>,
    },
    Event {
        event: UdEvent,
        reply: oneshot::Sender<()>,
    },
}

/// Task owning a [`UdManager`] and its side-effect collaborators.
///
/// # Invariants
///
/// - At most one certificate fetch is in flight
/// - Every caller waiting on a certificate is answered by the fetch that was in
///   flight when it asked (or by the cache)
pub struct UdService<E, S, A, F, Y>
where
    E: Environment,
    S: Storage,
    A: LocalIdentity + ProfileKeyLookup,
    F: CertificateFetcher,
    Y: AccountAttributesSync,
{
    manager: UdManager<E, S, A>,
    fetcher: Arc<F>,
    attributes: Y,
    commands: mpsc::Receiver<Command>,
    /// Weak so that the service still stops once every handle is dropped
    fetch_results: mpsc::WeakSender<Command>,
    fetch_in_flight: bool,
    certificate_waiters: Vec<CertificateReply>,
}

impl<E, S, A, F, Y> UdService<E, S, A, F, Y>
where
    E: Environment,
    S: Storage,
    A: LocalIdentity + ProfileKeyLookup,
    F: CertificateFetcher,
    Y: AccountAttributesSync,
{
    /// Spawn the service on the current Tokio runtime.
    ///
    /// The service stops once every [`UdHandle`] is dropped. A fetch still in
    /// flight at that point finishes on its own and its result is discarded.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(manager: UdManager<E, S, A>, fetcher: F, attributes: Y) -> UdHandle {
        let depth = manager.config().command_queue_depth.max(1);
        let (tx, rx) = mpsc::channel(depth);

        let service = Self {
            manager,
            fetcher: Arc::new(fetcher),
            attributes,
            commands: rx,
            fetch_results: tx.downgrade(),
            fetch_in_flight: false,
            certificate_waiters: Vec::new(),
        };
        tokio::spawn(service.run());

        UdHandle { commands: tx }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle_command(command);
        }
        debug!("All UD handles dropped, service stopping");
    }

    // A dropped reply receiver means the caller gave up; nothing to do.
    fn handle_command(&mut self, command: Command) {
        match command {
            Command::IsEnabled { reply } => {
                let _ = reply.send(self.manager.is_enabled());
            },
            Command::AccessMode { recipient, reply } => {
                let _ = reply.send(self.manager.access_mode(&recipient));
            },
            Command::SetAccessMode { recipient, mode, reply } => {
                let _ = reply.send(self.manager.set_access_mode(mode, &recipient));
            },
            Command::UdAccess { recipient, reply } => {
                let _ = reply.send(self.manager.ud_access(&recipient));
            },
            Command::SendingAccess { recipient, reply } => {
                let _ = reply.send(self.manager.sending_access(&recipient));
            },
            Command::EnsureSenderCertificate { reply } => {
                if let Some(cert) = self.manager.cached_sender_certificate() {
                    let _ = reply.send(Ok(cert));
                    return;
                }
                self.certificate_waiters.push(reply);
                self.start_fetch();
            },
            Command::CertificateFetched { result } => self.finish_fetch(result),
            Command::ShouldAllowUnrestricted { reply } => {
                let _ = reply.send(self.manager.should_allow_unrestricted_access_local());
            },
            Command::SetShouldAllowUnrestricted { allow, reply } => {
                let result = self
                    .manager
                    .set_should_allow_unrestricted_access_local(allow)
                    .map(|actions| self.execute(actions));
                let _ = reply.send(result);
            },
            Command::Event { event, reply } => {
                let actions = self.manager.handle_event(event);
                self.execute(actions);
                let _ = reply.send(());
            },
        }
    }

    fn execute(&mut self, actions: Vec<UdAction>) {
        for action in actions {
            match action {
                UdAction::RefreshCertificate => {
                    if self.manager.cached_sender_certificate().is_none() {
                        self.start_fetch();
                    }
                },
                UdAction::SyncAccountAttributes => self.attributes.request_sync(),
            }
        }
    }

    fn start_fetch(&mut self) {
        if self.fetch_in_flight {
            debug!("Sender certificate fetch already in flight");
            return;
        }
        self.fetch_in_flight = true;

        let fetcher = Arc::clone(&self.fetcher);
        let results = self.fetch_results.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_sender_certificate().await;

            let Some(commands) = results.upgrade() else {
                debug!("UD service stopped before certificate fetch completed");
                return;
            };
            let _ = commands.send(Command::CertificateFetched { result }).await;
        });
    }

    fn finish_fetch(&mut self, result: Result<Vec<u8>, FetchError>) {
        self.fetch_in_flight = false;

        let outcome = result
            .map_err(UdError::from)
            .and_then(|bytes| self.manager.store_sender_certificate(&bytes));

        if let Err(e) = &outcome {
            warn!(error = %e, transient = e.is_transient(), "Certificate refresh failed");
        }

        for waiter in self.certificate_waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Cloneable handle to a running [`UdService`].
///
/// Every method fails with [`UdError::ServiceStopped`] once the service task
/// has ended.
#[derive(Clone)]
pub struct UdHandle {
    commands: mpsc::Sender<Command>,
}

impl UdHandle {
    /// See [`UdManager::is_enabled`].
    pub async fn is_enabled(&self) -> Result<bool, UdError> {
        self.request(|reply| Command::IsEnabled { reply }).await
    }

    /// See [`UdManager::access_mode`].
    pub async fn access_mode(&self, recipient: RecipientId) -> Result<AccessMode, UdError> {
        self.request(|reply| Command::AccessMode { recipient, reply }).await
    }

    /// See [`UdManager::set_access_mode`].
    pub async fn set_access_mode(
        &self,
        mode: AccessMode,
        recipient: RecipientId,
    ) -> Result<(), UdError> {
        self.request(|reply| Command::SetAccessMode { recipient, mode, reply }).await?
    }

    /// See [`UdManager::ud_access`].
    pub async fn ud_access(&self, recipient: RecipientId) -> Result<Option<UdAccess>, UdError> {
        self.request(|reply| Command::UdAccess { recipient, reply }).await
    }

    /// See [`UdManager::sending_access`].
    pub async fn sending_access(
        &self,
        recipient: RecipientId,
    ) -> Result<Option<AccessBundle>, UdError> {
        self.request(|reply| Command::SendingAccess { recipient, reply }).await
    }

    /// See [`UdManager::ensure_sender_certificate`].
    pub async fn ensure_sender_certificate(&self) -> Result<SenderCertificate, UdError> {
        self.request(|reply| Command::EnsureSenderCertificate { reply }).await?
    }

    /// See [`UdManager::should_allow_unrestricted_access_local`].
    pub async fn should_allow_unrestricted_access_local(&self) -> Result<bool, UdError> {
        self.request(|reply| Command::ShouldAllowUnrestricted { reply }).await
    }

    /// Persist the flag and push account attributes.
    ///
    /// Resolves after the attribute sync has been requested.
    pub async fn set_should_allow_unrestricted_access_local(
        &self,
        allow: bool,
    ) -> Result<(), UdError> {
        self.request(|reply| Command::SetShouldAllowUnrestricted { allow, reply }).await?
    }

    /// Report a registration change.
    ///
    /// Resolves after the resulting actions ran. A failed certificate refresh
    /// is logged by the service, not returned.
    pub async fn registration_state_changed(&self, registered: bool) -> Result<(), UdError> {
        let event = UdEvent::RegistrationStateChanged { registered };
        self.request(|reply| Command::Event { event, reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, UdError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| UdError::ServiceStopped)?;
        response.await.map_err(|_| UdError::ServiceStopped)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use shroud_crypto::testing::CertificateIssuer;

    use super::*;
    use crate::{
        account::{FetchError, InMemoryAccount},
        config::UdConfig,
        env::test_utils::MockEnv,
        storage::MemoryStorage,
    };

    const START_MS: u64 = 1_700_000_000_000;
    const DAY_MS: u64 = 86_400_000;

    #[derive(Clone)]
    struct CountingFetcher {
        certificate: Option<Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    impl CertificateFetcher for CountingFetcher {
        fn fetch_sender_certificate(
            &self,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.certificate.clone().ok_or(FetchError::Rejected { status: 503 });
            async move {
                tokio::task::yield_now().await;
                response
            }
        }
    }

    #[derive(Clone, Default)]
    struct CountingSync {
        calls: Arc<AtomicUsize>,
    }

    impl AccountAttributesSync for CountingSync {
        fn request_sync(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        handle: UdHandle,
        fetches: Arc<AtomicUsize>,
        syncs: Arc<AtomicUsize>,
    }

    fn spawn(server_up: bool) -> Harness {
        let issuer = CertificateIssuer::new(5);
        let account = InMemoryAccount::new();
        account.set_local_recipient(Some("me".into()));
        account.set_profile_key("me".into(), vec![0x01; 32]);
        account.set_profile_key("bob".into(), vec![0x02; 32]);

        let manager = UdManager::with_trust_root(
            MockEnv::new(START_MS, 1),
            MemoryStorage::new(),
            account,
            UdConfig::default(),
            issuer.trust_root(),
        );
        let fetcher = CountingFetcher {
            certificate: server_up.then(|| issuer.issue("me", 1, START_MS + DAY_MS)),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let sync = CountingSync::default();

        let fetches = fetcher.calls.clone();
        let syncs = sync.calls.clone();
        let handle = UdService::spawn(manager, fetcher, sync);

        Harness { handle, fetches, syncs }
    }

    #[tokio::test]
    async fn registration_refreshes_certificate() {
        let h = spawn(true);
        h.handle.set_access_mode(AccessMode::Enabled, "bob".into()).await.unwrap();
        assert!(h.handle.sending_access("bob".into()).await.unwrap().is_none());

        h.handle.registration_state_changed(true).await.unwrap();
        // Joins the fetch started by the registration instead of issuing another
        h.handle.ensure_sender_certificate().await.unwrap();

        assert_eq!(h.fetches.load(Ordering::SeqCst), 1);
        assert!(h.handle.sending_access("bob".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_refresh_is_not_an_error() {
        let h = spawn(false);

        h.handle.registration_state_changed(true).await.unwrap();

        assert!(matches!(
            h.handle.ensure_sender_certificate().await,
            Err(UdError::Transport(FetchError::Rejected { status: 503 }))
        ));
        assert!(h.fetches.load(Ordering::SeqCst) >= 1);
        assert!(h.handle.sending_access("bob".into()).await.unwrap().is_none());
    }

    struct HangingFetcher;

    impl CertificateFetcher for HangingFetcher {
        fn fetch_sender_certificate(
            &self,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            std::future::pending()
        }
    }

    fn spawn_hanging() -> UdHandle {
        let issuer = CertificateIssuer::new(5);
        let account = InMemoryAccount::new();
        account.set_local_recipient(Some("me".into()));
        account.set_profile_key("bob".into(), vec![0x02; 32]);

        let manager = UdManager::with_trust_root(
            MockEnv::new(START_MS, 1),
            MemoryStorage::new(),
            account,
            UdConfig::default(),
            issuer.trust_root(),
        );
        UdService::spawn(manager, HangingFetcher, CountingSync::default())
    }

    #[tokio::test]
    async fn hung_fetch_does_not_block_queries() {
        let handle = spawn_hanging();
        handle.set_access_mode(AccessMode::Enabled, "bob".into()).await.unwrap();

        let answered = tokio::time::timeout(Duration::from_secs(2), async {
            handle.registration_state_changed(true).await.unwrap();
            let enabled = handle.is_enabled().await.unwrap();
            let access = handle.sending_access("bob".into()).await.unwrap();
            (enabled, access)
        })
        .await
        .unwrap();

        assert_eq!(answered, (false, None));
    }

    #[tokio::test]
    async fn waiting_for_certificate_does_not_block_others() {
        let handle = spawn_hanging();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.ensure_sender_certificate().await })
        };
        tokio::task::yield_now().await;

        let query = handle.sending_access("bob".into());
        let access = tokio::time::timeout(Duration::from_secs(2), query).await.unwrap();

        assert_eq!(access, Ok(None));
        assert!(!waiter.is_finished());
        waiter.abort();
    }

    #[tokio::test]
    async fn unregistering_does_nothing() {
        let h = spawn(true);

        h.handle.registration_state_changed(false).await.unwrap();

        assert_eq!(h.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(h.syncs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unrestricted_flag_requests_attribute_sync() {
        let h = spawn(true);

        h.handle.set_should_allow_unrestricted_access_local(true).await.unwrap();

        assert!(h.handle.should_allow_unrestricted_access_local().await.unwrap());
        assert_eq!(h.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_refreshes_fetch_once() {
        let h = spawn(true);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = h.handle.clone();
                tokio::spawn(async move { handle.ensure_sender_certificate().await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(h.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handle_reports_modes() {
        let h = spawn(true);

        assert!(!h.handle.is_enabled().await.unwrap());
        h.handle.set_access_mode(AccessMode::Unrestricted, "me".into()).await.unwrap();

        assert!(h.handle.is_enabled().await.unwrap());
        assert_eq!(h.handle.access_mode("me".into()).await.unwrap(), AccessMode::Unrestricted);
        assert!(h.handle.ud_access("me".into()).await.unwrap().unwrap().is_random_key);
    }

    #[tokio::test]
    async fn stopped_service_reports_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = UdHandle { commands: tx };

        assert_eq!(handle.is_enabled().await, Err(UdError::ServiceStopped));
        assert_eq!(handle.ensure_sender_certificate().await, Err(UdError::ServiceStopped));
    }
}

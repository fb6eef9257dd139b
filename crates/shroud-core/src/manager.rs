//! Unidentified-delivery manager.
//!
//! Facade over the access-mode store, access-key derivation, and the
//! certificate cache. Answers whether sealed sender is enabled locally and
//! what access material to use for a given recipient.
//!
//! # Architecture
//!
//! Synchronous methods take their inputs from injected collaborators and the
//! [`Environment`]; the only suspension point is
//! [`ensure_sender_certificate`](UdManager::ensure_sender_certificate).
//! Side effects the manager cannot perform itself are returned as
//! [`UdAction`]s for the caller to execute.
//!
//! All mutation goes through `&mut self`, so a single owner is enforced by the
//! borrow checker. Use [`UdService`](crate::UdService) when several tasks must
//! call in.

use shroud_crypto::{
    ACCESS_KEY_LEN, AccessKey, CertificateValidator, SenderCertificate, TrustRoot,
    derive_access_key,
};
use tracing::{debug, info, warn};

use crate::{
    access::{AccessBundle, UdAccess, UdSendingAccess},
    access_mode::{AccessMode, AccessModeStore},
    account::{CertificateFetcher, LocalIdentity, ProfileKeyLookup, RecipientId},
    certificate_cache::{CacheState, CertificateCache, UD_STATE_COLLECTION},
    config::UdConfig,
    env::Environment,
    error::UdError,
    event::{UdAction, UdEvent},
    storage::{Storage, StoredValue},
};

/// Storage key of the local unrestricted-access flag.
pub const UNRESTRICTED_ACCESS_KEY: &str = "unrestricted_access_local";

/// Sealed-sender access facade.
///
/// # Type Parameters
///
/// - `E`: Environment (wall clock, RNG)
/// - `S`: Storage for access modes, certificate slot, and flags
/// - `A`: Account directory (local identity and profile keys)
pub struct UdManager<E, S, A>
where
    E: Environment,
    S: Storage,
    A: LocalIdentity + ProfileKeyLookup,
{
    env: E,
    storage: S,
    account: A,
    config: UdConfig,
    modes: AccessModeStore<S>,
    certificates: CertificateCache<S>,
}

impl<E, S, A> UdManager<E, S, A>
where
    E: Environment,
    S: Storage,
    A: LocalIdentity + ProfileKeyLookup,
{
    /// Create a manager trusting the compiled-in root for
    /// `config.deployment`.
    ///
    /// # Errors
    ///
    /// - `UdError::ConfigurationFatal` if the embedded trust root does not
    ///   parse. Sealed sender cannot work at all in that case.
    pub fn new(env: E, storage: S, account: A, config: UdConfig) -> Result<Self, UdError> {
        let trust_root =
            TrustRoot::for_deployment(config.deployment).map_err(UdError::ConfigurationFatal)?;
        Ok(Self::with_trust_root(env, storage, account, config, trust_root))
    }

    /// Create a manager trusting `trust_root`.
    pub fn with_trust_root(
        env: E,
        storage: S,
        account: A,
        config: UdConfig,
        trust_root: TrustRoot,
    ) -> Self {
        let validator = CertificateValidator::new(trust_root)
            .with_revoked_key_ids(config.revoked_server_key_ids.iter().copied());
        let certificates = CertificateCache::new(
            storage.clone(),
            config.deployment,
            validator,
            config.expiry_margin_ms(),
        );

        Self {
            modes: AccessModeStore::new(storage.clone()),
            certificates,
            env,
            storage,
            account,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &UdConfig {
        &self.config
    }

    /// State of the in-memory certificate mirror.
    pub fn certificate_state(&self) -> CacheState {
        self.certificates.state()
    }

    /// True iff the local account's own mode permits sealed sender.
    ///
    /// False before registration.
    pub fn is_enabled(&self) -> bool {
        let Some(local) = self.account.local_recipient_id() else {
            return false;
        };
        self.access_mode(&local).allows_sealed_sender()
    }

    /// Access mode of `recipient`. Storage failures read as `Unknown`.
    pub fn access_mode(&self, recipient: &RecipientId) -> AccessMode {
        self.modes.get(recipient).unwrap_or_else(|e| {
            warn!(%recipient, error = %e, "Failed to read access mode, treating as unknown");
            AccessMode::Unknown
        })
    }

    /// Persist `mode` for `recipient`.
    pub fn set_access_mode(
        &mut self,
        mode: AccessMode,
        recipient: &RecipientId,
    ) -> Result<(), UdError> {
        self.modes.set(recipient, mode)?;

        if self.account.local_recipient_id().as_ref() == Some(recipient) {
            info!(%mode, "Local UD access mode changed");
        } else {
            debug!(%recipient, %mode, "UD access mode changed");
        }

        Ok(())
    }

    /// Access key for `recipient`, if sealed sender can reach them.
    ///
    /// Unrestricted recipients get a fresh random key on every call.
    pub fn ud_access(&self, recipient: &RecipientId) -> Option<UdAccess> {
        let mode = self.access_mode(recipient);

        match mode {
            AccessMode::Unrestricted => {
                Some(UdAccess { access_key: self.random_access_key(), mode, is_random_key: true })
            },
            AccessMode::Enabled => {
                let access_key = self.derived_access_key(recipient)?;
                Some(UdAccess { access_key, mode, is_random_key: false })
            },
            AccessMode::Unknown | AccessMode::Disabled => None,
        }
    }

    /// Validated cached certificate. Never fetches.
    pub fn cached_sender_certificate(&mut self) -> Option<SenderCertificate> {
        let now_ms = self.env.wall_clock_millis();
        self.certificates.current(now_ms)
    }

    /// Access bundle for sending to `recipient`.
    ///
    /// `None` unless the recipient accepts sealed sender, a key can be produced
    /// for them, a certificate is already cached, and a key can be produced
    /// for the local account. `None` means "send identified", not an error.
    pub fn sending_access(&mut self, recipient: &RecipientId) -> Option<AccessBundle> {
        let Some(target) = self.ud_access(recipient) else {
            debug!(%recipient, "No UD access for recipient");
            return None;
        };

        let Some(sender_certificate) = self.cached_sender_certificate() else {
            debug!(%recipient, "No valid sender certificate cached");
            return None;
        };

        let Some(sender) = self.local_ud_access() else {
            debug!("No UD access key for local account");
            return None;
        };

        Some(AccessBundle {
            target: UdSendingAccess {
                access: target,
                sender_certificate: sender_certificate.clone(),
            },
            sender: UdSendingAccess { access: sender, sender_certificate },
        })
    }

    /// Valid sender certificate, fetching one if nothing valid is cached.
    ///
    /// # Errors
    ///
    /// - `UdError::Transport` if the fetch fails
    /// - `UdError::CertificateInvalid` if the server returns a certificate that
    ///   does not validate at now + margin; nothing is persisted
    /// - `UdError::Storage` if the validated certificate cannot be persisted
    pub async fn ensure_sender_certificate<F: CertificateFetcher>(
        &mut self,
        fetcher: &F,
    ) -> Result<SenderCertificate, UdError> {
        if let Some(cert) = self.cached_sender_certificate() {
            debug!(expires_ms = cert.expires_ms(), "Using cached sender certificate");
            return Ok(cert);
        }

        info!(deployment = %self.config.deployment, "Fetching sender certificate");
        let bytes = fetcher.fetch_sender_certificate().await.inspect_err(|e| {
            warn!(error = %e, "Sender certificate fetch failed");
        })?;

        self.store_sender_certificate(&bytes)
    }

    /// Validate fetched certificate bytes at now + margin and cache them.
    ///
    /// The write half of [`ensure_sender_certificate`](Self::ensure_sender_certificate),
    /// for callers that run the fetch elsewhere.
    ///
    /// # Errors
    ///
    /// - `UdError::CertificateInvalid` if the bytes do not validate; nothing is
    ///   persisted
    /// - `UdError::Storage` if the validated certificate cannot be persisted
    pub fn store_sender_certificate(&mut self, bytes: &[u8]) -> Result<SenderCertificate, UdError> {
        let now_ms = self.env.wall_clock_millis();
        let cert = self.certificates.store(bytes, now_ms).inspect_err(|e| {
            warn!(error = %e, "Server returned unusable sender certificate");
        })?;

        info!(expires_ms = cert.expires_ms(), "Sender certificate refreshed");
        Ok(cert)
    }

    /// Whether the local account accepts sealed sender from anyone.
    ///
    /// When set, the local account's own outgoing access key is random.
    pub fn should_allow_unrestricted_access_local(&self) -> bool {
        match self.storage.get(UD_STATE_COLLECTION, UNRESTRICTED_ACCESS_KEY) {
            Ok(Some(StoredValue::Bool(allow))) => allow,
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read unrestricted access flag");
                false
            },
        }
    }

    /// Persist the unrestricted-access flag.
    ///
    /// Returns `SyncAccountAttributes` so that the server-visible flag follows.
    pub fn set_should_allow_unrestricted_access_local(
        &mut self,
        allow: bool,
    ) -> Result<Vec<UdAction>, UdError> {
        self.storage.set(UD_STATE_COLLECTION, UNRESTRICTED_ACCESS_KEY, StoredValue::Bool(allow))?;
        info!(allow, "Unrestricted access flag changed");

        Ok(vec![UdAction::SyncAccountAttributes])
    }

    /// Process an event, returning actions for the caller to execute.
    pub fn handle_event(&mut self, event: UdEvent) -> Vec<UdAction> {
        match event {
            UdEvent::RegistrationStateChanged { registered: true } => {
                info!("Registered, refreshing sender certificate");
                vec![UdAction::RefreshCertificate]
            },
            UdEvent::RegistrationStateChanged { registered: false } => {
                debug!("Registration lost");
                Vec::new()
            },
        }
    }

    fn local_ud_access(&self) -> Option<UdAccess> {
        if self.should_allow_unrestricted_access_local() {
            return Some(UdAccess {
                access_key: self.random_access_key(),
                mode: AccessMode::Unrestricted,
                is_random_key: true,
            });
        }

        let local = self.account.local_recipient_id()?;
        let access_key = self.derived_access_key(&local)?;
        Some(UdAccess { access_key, mode: AccessMode::Enabled, is_random_key: false })
    }

    fn derived_access_key(&self, recipient: &RecipientId) -> Option<AccessKey> {
        let profile_key = self.account.profile_key(recipient)?;

        derive_access_key(&profile_key)
            .inspect_err(|e| warn!(%recipient, error = %e, "Malformed profile key"))
            .ok()
    }

    fn random_access_key(&self) -> AccessKey {
        let mut random = [0u8; ACCESS_KEY_LEN];
        self.env.random_bytes(&mut random);
        AccessKey::from_random(random)
    }
}

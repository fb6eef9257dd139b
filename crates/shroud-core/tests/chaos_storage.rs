//! Chaos tests for `UdManager` over failing storage
//!
//! Wraps the backing store in `ChaoticStorage` and checks that storage
//! failures only ever degrade to "no sealed-sender access":
//! - No operation panics
//! - A bundle is only produced for a recipient whose persisted mode allows it
//! - A failed certificate write never leaves a certificate cached

use std::{future::Future, time::Duration};

use proptest::prelude::*;
use shroud_core::{
    AccessMode, AccessModeStore, CertificateFetcher, ChaoticStorage, FetchError, InMemoryAccount,
    MemoryStorage, RecipientId, UdConfig, UdError, UdManager, env::test_utils::MockEnv,
};
use shroud_crypto::testing::CertificateIssuer;

const START_MS: u64 = 1_700_000_000_000;
const HOUR_MS: u64 = 3_600_000;

struct ServerFetcher(Vec<u8>);

impl CertificateFetcher for ServerFetcher {
    fn fetch_sender_certificate(
        &self,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let certificate = self.0.clone();
        async move { Ok(certificate) }
    }
}

#[derive(Debug, Clone)]
enum Op {
    SetMode(usize, AccessMode),
    Send(usize),
    Refresh,
    SetUnrestricted(bool),
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    let mode = prop_oneof![
        Just(AccessMode::Unknown),
        Just(AccessMode::Enabled),
        Just(AccessMode::Disabled),
        Just(AccessMode::Unrestricted),
    ];
    prop_oneof![
        (0usize..4, mode).prop_map(|(r, m)| Op::SetMode(r, m)),
        (0usize..4).prop_map(Op::Send),
        Just(Op::Refresh),
        any::<bool>().prop_map(Op::SetUnrestricted),
        (0u64..120).prop_map(Op::Advance),
    ]
}

#[test]
fn prop_storage_failures_degrade_to_no_access() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

    proptest!(|(
        failure_rate in 0.0..0.6,
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 1..60),
    )| {
        let recipients: Vec<RecipientId> =
            (0..4).map(|i| RecipientId::new(format!("r{i}"))).collect();
        let account = InMemoryAccount::new();
        account.set_local_recipient(Some("me".into()));
        account.set_profile_key("me".into(), vec![0xAA; 32]);
        for recipient in &recipients {
            account.set_profile_key(recipient.clone(), vec![0xBB; 32]);
        }

        let env = MockEnv::new(START_MS, seed);
        let storage = ChaoticStorage::with_seed(MemoryStorage::new(), failure_rate, seed);
        let issuer = CertificateIssuer::new(7);
        let fetcher = ServerFetcher(issuer.issue("me", 1, START_MS + 1_000 * HOUR_MS));
        let mut manager = UdManager::with_trust_root(
            env.clone(),
            storage.clone(),
            account,
            UdConfig::default(),
            issuer.trust_root(),
        );
        let oracle = AccessModeStore::new(storage.inner().clone());

        for op in ops {
            match op {
                Op::SetMode(r, mode) => {
                    let _ = manager.set_access_mode(mode, &recipients[r]);
                },
                Op::Send(r) => {
                    if let Some(bundle) = manager.sending_access(&recipients[r]) {
                        let persisted = oracle.get(&recipients[r]).unwrap();
                        prop_assert!(persisted.allows_sealed_sender());
                        prop_assert_eq!(bundle.target.access.mode, persisted);
                    }
                },
                Op::Refresh => {
                    match runtime.block_on(manager.ensure_sender_certificate(&fetcher)) {
                        Ok(_) | Err(UdError::Storage(_)) => {},
                        Err(e) => prop_assert!(false, "unexpected error: {e}"),
                    }
                },
                Op::SetUnrestricted(allow) => {
                    let _ = manager.set_should_allow_unrestricted_access_local(allow);
                },
                Op::Advance(minutes) => env.advance(Duration::from_secs(minutes * 60)),
            }
        }
    });
}

#[test]
fn failed_certificate_write_leaves_cache_empty() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let issuer = CertificateIssuer::new(7);
    let storage = ChaoticStorage::with_seed(MemoryStorage::new(), 1.0, 0);
    let mut manager = UdManager::with_trust_root(
        MockEnv::new(START_MS, 0),
        storage,
        InMemoryAccount::new(),
        UdConfig::default(),
        issuer.trust_root(),
    );
    let fetcher = ServerFetcher(issuer.issue("me", 1, START_MS + 24 * HOUR_MS));

    let result = runtime.block_on(manager.ensure_sender_certificate(&fetcher));

    assert!(matches!(result, Err(UdError::Storage(_))));
    assert!(manager.cached_sender_certificate().is_none());
}

#[test]
fn unreadable_storage_means_unknown_mode() {
    let storage = ChaoticStorage::with_seed(MemoryStorage::new(), 1.0, 0);
    let account = InMemoryAccount::new();
    account.set_local_recipient(Some("me".into()));
    let manager = UdManager::with_trust_root(
        MockEnv::new(START_MS, 0),
        storage,
        account,
        UdConfig::default(),
        CertificateIssuer::new(1).trust_root(),
    );

    assert_eq!(manager.access_mode(&"me".into()), AccessMode::Unknown);
    assert!(!manager.is_enabled());
    assert!(!manager.should_allow_unrestricted_access_local());
}

//! Environment abstraction for deterministic testing.
//!
//! Decouples access-control logic from system resources (wall clock,
//! randomness). Tests drive a virtual clock and a seeded RNG; production uses
//! [`SystemEnv`](crate::SystemEnv).

/// Abstract environment providing wall-clock time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    ///
    /// Certificate expiry is an absolute timestamp, so this must be wall
    /// clock time rather than a monotonic instant.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Test environments.
pub mod test_utils {
    #![allow(clippy::disallowed_types, reason = "Locking simple clock and RNG state")]

    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::Environment;

    /// Environment with a manually advanced clock and a seeded RNG.
    ///
    /// Clones share the same clock and RNG.
    #[derive(Clone)]
    pub struct MockEnv {
        inner: Arc<Mutex<MockEnvInner>>,
    }

    struct MockEnvInner {
        now_ms: u64,
        rng: ChaCha20Rng,
    }

    impl MockEnv {
        /// Clock starts at `start_ms`, RNG seeded with `seed`.
        pub fn new(start_ms: u64, seed: u64) -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockEnvInner {
                    now_ms: start_ms,
                    rng: ChaCha20Rng::seed_from_u64(seed),
                })),
            }
        }

        /// Move the clock forward.
        #[allow(clippy::expect_used)]
        pub fn advance(&self, duration: Duration) {
            let mut inner = self.inner.lock().expect("Mutex poisoned");
            inner.now_ms = inner.now_ms.saturating_add(duration.as_millis() as u64);
        }
    }

    impl Environment for MockEnv {
        #[allow(clippy::expect_used)]
        fn wall_clock_millis(&self) -> u64 {
            self.inner.lock().expect("Mutex poisoned").now_ms
        }

        #[allow(clippy::expect_used)]
        fn random_bytes(&self, buffer: &mut [u8]) {
            self.inner.lock().expect("Mutex poisoned").rng.fill_bytes(buffer);
        }
    }

}

//! Shroud unidentified-delivery core.
//!
//! Decides, per recipient, whether a message can travel as sealed sender and
//! produces the access material to do so: the recipient's access key, the
//! local account's access key, and a validated sender certificate.
//!
//! # Architecture
//!
//! [`UdManager`] is the synchronous facade. It reads and writes through the
//! [`Storage`] trait, takes time and randomness from an [`Environment`], and
//! returns [`UdAction`]s for side effects it cannot perform itself. Only the
//! certificate fetch is async.
//!
//! [`UdService`] wraps a manager in a task with a bounded command queue and
//! executes those actions, so that many callers share one owner.
//!
//! # Components
//!
//! - [`AccessModeStore`]: per-recipient [`AccessMode`], persisted as ordinals
//! - [`CertificateCache`]: one validated certificate slot per deployment
//! - [`UdManager`]: access decisions and certificate refresh
//! - [`UdService`] / [`UdHandle`]: single-owner runtime
//! - [`SystemEnv`]: production environment (wall clock, OS RNG)
//! - [`MemoryStorage`], [`RedbStorage`], [`ChaoticStorage`]: storage backends

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod access_mode;
pub mod account;
pub mod certificate_cache;
pub mod config;
pub mod env;
mod error;
pub mod event;
mod manager;
mod service;
pub mod storage;
mod system_env;

pub use access::{AccessBundle, UdAccess, UdSendingAccess};
pub use access_mode::{ACCESS_MODE_COLLECTION, AccessMode, AccessModeStore};
pub use account::{
    AccountAttributesSync, CertificateFetcher, FetchError, InMemoryAccount, LocalIdentity,
    ProfileKeyLookup, RecipientId,
};
pub use certificate_cache::{CacheState, CertificateCache, UD_STATE_COLLECTION};
pub use config::UdConfig;
pub use env::Environment;
pub use error::UdError;
pub use event::{UdAction, UdEvent};
pub use manager::{UNRESTRICTED_ACCESS_KEY, UdManager};
pub use service::{UdHandle, UdService};
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError, StoredValue};
pub use system_env::SystemEnv;

//! Storage abstraction for unidentified-delivery state
//!
//! A small key-value interface: values live under a string key inside a named
//! collection. The trait is synchronous (no async) to keep the facade's API
//! synchronous everywhere except the certificate fetch.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use serde::{Deserialize, Serialize};

pub use self::redb::RedbStorage;

/// A persisted value.
///
/// Access modes are stored as `Int` ordinals, certificates as `Bytes`, and
/// flags as `Bool`. Readers must tolerate a value of an unexpected variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredValue {
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// Signed integer
    Int(i64),
    /// Boolean flag
    Bool(bool),
}

/// Key-value storage scoped by collection.
///
/// Must be Clone (shared between the mode store and the certificate cache),
/// Send + Sync (thread-safe), and synchronous. Implementations typically
/// share internal state via Arc, so clones access the same underlying storage.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Value under `key` in `collection`. `None` if never set or removed.
    fn get(&self, collection: &str, key: &str) -> Result<Option<StoredValue>, StorageError>;

    /// Store `value`, overwriting any existing value.
    fn set(&self, collection: &str, key: &str, value: StoredValue) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, collection: &str, key: &str) -> Result<(), StorageError>;
}

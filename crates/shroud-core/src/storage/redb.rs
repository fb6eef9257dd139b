//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Access modes, the certificate slots, and the unrestricted flag all survive
//! restarts.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};

use super::{Storage, StorageError, StoredValue};

/// Table: entries
/// Key: collection length (2 bytes BE) || collection || key
/// Value: CBOR-encoded `StoredValue`
const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the ENTRIES table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(ENTRIES).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn get(&self, collection: &str, key: &str) -> Result<Option<StoredValue>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(ENTRIES).map_err(|e| StorageError::Io(e.to_string()))?;

        let entry_key = encode_entry_key(collection, key)?;
        let Some(guard) =
            table.get(entry_key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };

        let value = ciborium::from_reader(guard.value())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(Some(value))
    }

    fn set(&self, collection: &str, key: &str, value: StoredValue) -> Result<(), StorageError> {
        let entry_key = encode_entry_key(collection, key)?;

        let mut value_bytes = Vec::new();
        ciborium::into_writer(&value, &mut value_bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(|e| StorageError::Io(e.to_string()))?;
            table
                .insert(entry_key.as_slice(), value_bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        let entry_key = encode_entry_key(collection, key)?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = table
                .remove(entry_key.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }
}

/// Length-prefix the collection so that ("ab", "c") and ("a", "bc") differ.
fn encode_entry_key(collection: &str, key: &str) -> Result<Vec<u8>, StorageError> {
    let collection_len = u16::try_from(collection.len()).map_err(|_| {
        StorageError::Serialization(format!("collection name too long: {}", collection.len()))
    })?;

    let mut bytes = Vec::with_capacity(2 + collection.len() + key.len());
    bytes.extend_from_slice(&collection_len.to_be_bytes());
    bytes.extend_from_slice(collection.as_bytes());
    bytes.extend_from_slice(key.as_bytes());
    Ok(bytes)
}

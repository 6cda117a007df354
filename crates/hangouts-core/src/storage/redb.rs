//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Each
//! [`WriteBatch`] is applied in one write transaction, so a handler's writes
//! survive or vanish together.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};

use super::{BatchOp, CacheKey, Storage, StorageError, WriteBatch};

/// Table: cache
/// Key: rendered cache key (`alice-bob-messages`)
/// Value: JSON-encoded list
const CACHE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

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
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(CACHE).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(CACHE).map_err(|e| StorageError::Io(e.to_string()))?;

        let rendered = key.to_string();
        let value = table.get(rendered.as_str()).map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(CACHE).map_err(|e| StorageError::Io(e.to_string()))?;

            for op in batch {
                match op {
                    BatchOp::Put { key, value } => {
                        let rendered = key.to_string();
                        table
                            .insert(rendered.as_str(), value.as_slice())
                            .map_err(|e| StorageError::Io(e.to_string()))?;
                    },
                    BatchOp::Delete { key } => {
                        let rendered = key.to_string();
                        table
                            .remove(rendered.as_str())
                            .map_err(|e| StorageError::Io(e.to_string()))?;
                    },
                }
            }
        }
        // Dropping an uncommitted transaction aborts it, so an error above
        // leaves the database untouched.
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }
}

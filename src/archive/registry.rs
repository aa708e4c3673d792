//! Partition registry: the persisted record book and its in-memory mirror.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rusqlite::params;

use super::table;
use crate::error::{Error, Result};
use crate::storage::Storage;

const RECORD_BOOK_DDL: &str = "CREATE TABLE IF NOT EXISTS archive_record_book (
    table_name TEXT PRIMARY KEY,
    month_key TEXT NOT NULL
)";

/// Cache of known partitions, month key -> table name, backed by the
/// `archive_record_book` table.
///
/// The record book is the source of truth; the cache is never persisted and
/// can be rebuilt at any time with [`initialize`](Self::initialize).
pub struct PartitionRegistry {
    storage: Arc<Storage>,
    cache: RwLock<HashMap<String, String>>,
}

impl PartitionRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Ensures the record book exists, then rebuilds the cache from it:
    /// clear, re-scan, repopulate. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        let mut loaded = HashMap::new();
        {
            let conn = self.storage.write();
            conn.execute(RECORD_BOOK_DDL, [])?;
            let mut stmt = conn.prepare("SELECT month_key, table_name FROM archive_record_book")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (month_key, table_name) = row?;
                loaded.insert(month_key, table_name);
            }
        }
        let mut cache = self.cache.write();
        cache.clear();
        cache.extend(loaded);
        Ok(())
    }

    /// Returns the partition table for `month_key`, creating the physical
    /// table, its index, and the record book entry on first use.
    ///
    /// The table name is a pure function of the key, so callers racing on
    /// the same month converge on the same name and the duplicate record
    /// insert is an `OR IGNORE` no-op. A DDL failure is fatal to this call
    /// and propagates to the caller.
    pub fn get_or_create(&self, month_key: &str) -> Result<String> {
        if let Some(name) = self.cache.read().get(month_key) {
            return Ok(name.clone());
        }

        table::validate_month_key(month_key)?;
        let name = table::table_name(month_key);
        {
            let conn = self.storage.write();
            table::ensure_table(&conn, &name).map_err(|err| match err {
                Error::Sqlite(source) => Error::PartitionCreation {
                    table: name.clone(),
                    source,
                },
                other => other,
            })?;
            conn.execute(
                "INSERT OR IGNORE INTO archive_record_book (table_name, month_key) VALUES (?1, ?2)",
                params![name, month_key],
            )?;
        }
        self.cache.write().insert(month_key.to_string(), name.clone());
        Ok(name)
    }

    /// Read-only lookup; never creates a partition.
    pub fn lookup(&self, month_key: &str) -> Option<String> {
        self.cache.read().get(month_key).cloned()
    }

    /// Snapshot of every known partition table, in no particular order.
    pub fn list_all(&self) -> Vec<String> {
        self.cache.read().values().cloned().collect()
    }

    /// Removes the record book entry and cache entry for a month.
    ///
    /// The physical partition table is left in place; this only unregisters
    /// the month. Not exercised by the archive/query paths.
    pub fn delete_month(&self, month_key: &str) -> Result<()> {
        {
            let conn = self.storage.write();
            conn.execute(
                "DELETE FROM archive_record_book WHERE month_key = ?1",
                params![month_key],
            )?;
        }
        self.cache.write().remove(month_key);
        Ok(())
    }
}

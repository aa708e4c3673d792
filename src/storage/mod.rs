//! SQLite storage handle shared by the archive engine.
//!
//! One write connection serialized behind a mutex, plus a small round-robin
//! pool of read connections. WAL journal mode lets the pooled readers run
//! concurrently with the writer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use crate::error::Result;

#[cfg(test)]
mod tests;

/// Default number of pooled read connections.
pub const DEFAULT_READ_POOL_SIZE: usize = 4;

/// Default busy timeout (ms) for every connection.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration for opening a [`Storage`] handle.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// Number of read connections in the pool.
    pub read_pool_size: usize,
    /// Busy timeout applied to every connection, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn with_read_pool_size(mut self, size: usize) -> Self {
        self.read_pool_size = size;
        self
    }

    pub fn with_busy_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }
}

/// Shared handle to the underlying SQLite database.
///
/// All mutations go through the single write connection; reads are spread
/// over the pool. Cloning is done at the `Arc<Storage>` level by callers.
pub struct Storage {
    write_connection: Mutex<Connection>,
    read_connections: Vec<Mutex<Connection>>,
    read_cursor: AtomicUsize,
}

impl Storage {
    /// Opens the database file and builds the connection pool.
    pub fn open(config: StorageConfig) -> Result<Storage> {
        let write_connection = open_connection(&config)?;
        let pool_size = config.read_pool_size.max(1);
        let mut read_connections = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            read_connections.push(Mutex::new(open_connection(&config)?));
        }
        Ok(Storage {
            write_connection: Mutex::new(write_connection),
            read_connections,
            read_cursor: AtomicUsize::new(0),
        })
    }

    /// Exclusive access to the write connection.
    pub fn write(&self) -> MutexGuard<'_, Connection> {
        self.write_connection.lock()
    }

    /// A read connection, selected round-robin over the pool.
    pub fn read(&self) -> MutexGuard<'_, Connection> {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_connections.len();
        self.read_connections[index].lock()
    }
}

fn open_connection(config: &StorageConfig) -> Result<Connection> {
    let conn = Connection::open(&config.path)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

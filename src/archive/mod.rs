//! Month-partitioned archival engine.
//!
//! Writes are grouped by calendar month into per-month partition tables; a
//! persisted record book (mirrored by an in-memory registry) tracks which
//! partitions exist. Reads fan out one concurrent sub-query per partition and
//! merge the results, admitted through a bounded gate so that only a fixed
//! number of fan-out operations hit the storage engine at once.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::storage::Storage;

mod month;
mod query;
mod registry;
mod table;
mod writer;

#[cfg(test)]
mod tests;

pub use month::{month_key, month_keys_between};
pub use registry::PartitionRegistry;
pub use table::ARCHIVE_TABLE_PREFIX;

/// Default capacity of the fan-out read gate.
pub const DEFAULT_GATE_PERMITS: usize = 4;

/// Configuration for a [`SensorArchive`].
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    /// Capacity of the read admission gate. One permit covers a whole
    /// fan-out operation, not an individual per-partition sub-query.
    pub gate_permits: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            gate_permits: DEFAULT_GATE_PERMITS,
        }
    }
}

impl ArchiveConfig {
    pub fn with_gate_permits(mut self, permits: usize) -> Self {
        self.gate_permits = permits;
        self
    }
}

/// One sensor reading, as stored in a partition table.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Assigned by the partition table on insert; zero for unsaved readings.
    pub id: i64,
    /// Forced on when the reading is archived.
    pub archived: bool,
    /// Event time in milliseconds since the epoch. Decides the partition,
    /// once, at archive time.
    pub created_at: i64,
    pub sensor_name: String,
    pub sensor_channel: i32,
    pub sensor_type: i32,
    pub sensor_model: String,
    /// Primary measurement value.
    pub primary_value: f64,
    /// Serialized secondary values. Stored and returned verbatim; the
    /// archive never interprets the contents.
    pub other_values: String,
}

/// A contained failure from a single partition during a multi-partition
/// operation.
#[derive(Debug)]
pub struct PartitionFailure {
    /// The partition the failure belongs to: a table name for reads, a
    /// month key for writes that never reached a table.
    pub partition: String,
    pub error: Error,
}

/// Outcome of [`SensorArchive::archive`].
///
/// A failed partition group never aborts its siblings, so the report carries
/// both the committed total and the per-partition failures for callers that
/// need strict accounting.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    /// Total records committed across all partition groups.
    pub archived: usize,
    /// Partition groups that were rolled back and discarded.
    pub failures: Vec<PartitionFailure>,
}

/// Merged result of a fan-out read.
///
/// Per-partition failures are contained: each contributes an empty/zero
/// share to `value` and an entry in `failures`.
#[derive(Debug)]
pub struct Fanout<T> {
    pub value: T,
    pub failures: Vec<PartitionFailure>,
}

impl<T: Default> Fanout<T> {
    fn empty() -> Self {
        Self {
            value: T::default(),
            failures: Vec::new(),
        }
    }
}

/// The archival engine: routes writes into monthly partition tables and fans
/// reads out across them.
///
/// Shared between tasks as `Arc<SensorArchive>`. [`initialize`] must run
/// once before the first archive or query; it is idempotent and can be
/// re-run at any time to rebuild the registry from the record book.
///
/// [`initialize`]: SensorArchive::initialize
pub struct SensorArchive {
    storage: Arc<Storage>,
    registry: Arc<PartitionRegistry>,
    gate: Semaphore,
}

impl SensorArchive {
    pub fn new(storage: Arc<Storage>, config: ArchiveConfig) -> Self {
        let registry = Arc::new(PartitionRegistry::new(Arc::clone(&storage)));
        Self {
            storage,
            registry,
            gate: Semaphore::new(config.gate_permits.max(1)),
        }
    }

    /// Loads the partition registry from the record book.
    ///
    /// Clears and repopulates the in-memory cache; with unchanged persisted
    /// state, repeated calls end in the same state.
    pub async fn initialize(&self) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || registry.initialize()).await?
    }

    /// The partition registry, for registry-level utilities such as
    /// [`PartitionRegistry::delete_month`].
    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    /// Table name for a month key, if that partition exists. Never creates.
    pub fn lookup_partition(&self, month_key: &str) -> Option<String> {
        self.registry.lookup(month_key)
    }

    /// Every known partition table, in no particular order.
    pub fn list_partitions(&self) -> Vec<String> {
        self.registry.list_all()
    }
}

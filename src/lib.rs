//! monarc - an embeddable month-partitioned archival store for sensor
//! time-series data.
//!
//! Readings are routed into one SQLite table per calendar month, tracked by a
//! persisted record book, and read back through fan-out queries that run one
//! concurrent sub-query per partition and merge the results into a single
//! globally ordered answer. A bounded admission gate keeps the number of
//! in-flight fan-out operations from overwhelming the storage engine.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use monarc::{ArchiveConfig, SensorArchive, Storage, StorageConfig};
//!
//! let storage = Arc::new(Storage::open(StorageConfig::new("sensors.db"))?);
//! let archive = SensorArchive::new(Arc::clone(&storage), ArchiveConfig::default());
//! archive.initialize().await?;
//!
//! let report = archive.archive(readings).await?;
//! println!("archived {} readings", report.archived);
//!
//! let result = archive.query_in_range("pH", 1, start_ms, end_ms).await?;
//! for reading in &result.value {
//!     println!("{} {}", reading.created_at, reading.primary_value);
//! }
//! ```

pub mod archive;
pub mod error;
pub mod storage;

pub use archive::{
    ArchiveConfig, ArchiveReport, Fanout, PartitionFailure, PartitionRegistry, SensorArchive,
    SensorReading, month_key, month_keys_between,
};
pub use error::{Error, Result};
pub use storage::{Storage, StorageConfig};

pub mod registry;

use std::sync::Arc;

use chrono::{Local, TimeZone};
use tempfile::TempDir;

use super::*;
use crate::storage::{Storage, StorageConfig};

pub struct TestArchive {
    pub archive: SensorArchive,
    pub storage: Arc<Storage>,
    // Holding the tempdir keeps the database file alive for the test.
    _dir: TempDir,
}

pub async fn open_archive() -> TestArchive {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path().join("archive.db"));
    let storage = Arc::new(Storage::open(config).unwrap());
    let archive = SensorArchive::new(Arc::clone(&storage), ArchiveConfig::default());
    archive.initialize().await.unwrap();
    TestArchive {
        archive,
        storage,
        _dir: dir,
    }
}

/// Millisecond timestamp in the local zone, matching what the partitioner
/// uses to derive month keys.
pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> i64 {
    Local
        .with_ymd_and_hms(year, month, day, hour, 0, 0)
        .unwrap()
        .timestamp_millis()
}

pub fn reading(name: &str, channel: i32, created_at: i64) -> SensorReading {
    SensorReading {
        id: 0,
        archived: false,
        created_at,
        sensor_name: name.to_string(),
        sensor_channel: channel,
        sensor_type: 0x06,
        sensor_model: "XC_PH_010Z".to_string(),
        primary_value: 6.18,
        other_values: "{\"temperature\":25.56}".to_string(),
    }
}

/// Number of rows the record book holds for a month key.
pub fn record_book_entries(storage: &Storage, month_key: &str) -> i64 {
    let conn = storage.read();
    conn.query_row(
        "SELECT COUNT(*) FROM archive_record_book WHERE month_key = ?1",
        [month_key],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn physical_table_exists(storage: &Storage, table: &str) -> bool {
    let conn = storage.read();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    count == 1
}

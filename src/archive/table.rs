//! Partition store management: DDL, SQL text, row mapping.
//!
//! Table names cannot be bound as statement parameters, so every identifier
//! that reaches SQL text is derived from a month key that passed the strict
//! allow-list check in [`validate_month_key`].

use rusqlite::{Connection, Row};

use super::SensorReading;
use crate::error::{Error, Result};

/// Prefix of every partition table; the full name is prefix + month key.
pub const ARCHIVE_TABLE_PREFIX: &str = "sensor_archive_";

/// Rejects any key that is not pure digits and underscores.
pub fn validate_month_key(month_key: &str) -> Result<()> {
    let ok = !month_key.is_empty()
        && month_key
            .chars()
            .all(|c| c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidPartitionKey(month_key.to_string()))
    }
}

/// Deterministic table name for a month key. Every caller computing a name
/// for the same key agrees, which is what makes concurrent partition
/// creation a benign race.
pub fn table_name(month_key: &str) -> String {
    format!("{ARCHIVE_TABLE_PREFIX}{month_key}")
}

/// Idempotently creates a partition table and its composite index. Safe
/// under repeated or concurrent invocation for the same name.
pub fn ensure_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            archived INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            sensor_name TEXT NOT NULL,
            sensor_channel INTEGER NOT NULL,
            sensor_type INTEGER NOT NULL,
            sensor_model TEXT NOT NULL,
            primary_value REAL NOT NULL,
            other_values TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_sensor_time
            ON {table} (sensor_name, sensor_channel, created_at);"
    ))?;
    Ok(())
}

pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (archived, created_at, sensor_name, sensor_channel, \
         sensor_type, sensor_model, primary_value, other_values) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
    )
}

pub fn count_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE sensor_name = ?1 AND sensor_channel = ?2")
}

const READING_COLUMNS: &str = "id, archived, created_at, sensor_name, sensor_channel, \
                               sensor_type, sensor_model, primary_value, other_values";

pub fn select_range_sql(table: &str) -> String {
    format!(
        "SELECT {READING_COLUMNS} FROM {table} \
         WHERE sensor_name = ?1 AND sensor_channel = ?2 AND created_at BETWEEN ?3 AND ?4"
    )
}

pub fn select_range_limited_sql(table: &str) -> String {
    format!(
        "SELECT {READING_COLUMNS} FROM {table} \
         WHERE sensor_name = ?1 AND sensor_channel = ?2 AND created_at BETWEEN ?3 AND ?4 \
         ORDER BY created_at ASC LIMIT ?5"
    )
}

pub fn read_row(row: &Row<'_>) -> rusqlite::Result<SensorReading> {
    Ok(SensorReading {
        id: row.get(0)?,
        archived: row.get::<_, i64>(1)? != 0,
        created_at: row.get(2)?,
        sensor_name: row.get(3)?,
        sensor_channel: row.get(4)?,
        sensor_type: row.get(5)?,
        sensor_model: row.get(6)?,
        primary_value: row.get(7)?,
        other_values: row.get(8)?,
    })
}

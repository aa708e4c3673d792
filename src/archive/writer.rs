//! Batched archival writes, one transaction per partition.

use std::collections::BTreeMap;
use std::sync::Arc;

use rusqlite::params;

use super::{ArchiveReport, PartitionFailure, PartitionRegistry, SensorArchive, SensorReading, month, table};
use crate::error::Result;
use crate::storage::Storage;

impl SensorArchive {
    /// Archives a batch of readings into their monthly partitions.
    ///
    /// Readings are grouped by the calendar month of `created_at`; each
    /// group is written in its own transaction so one partition's failure
    /// cannot roll back another's. A failed group is logged and recorded in
    /// the report; `archived` counts only committed readings.
    ///
    /// Partitions (tables, indexes, record book entries) are created on
    /// demand for months seen for the first time.
    pub async fn archive(&self, records: Vec<SensorReading>) -> Result<ArchiveReport> {
        if records.is_empty() {
            return Ok(ArchiveReport::default());
        }

        let storage = Arc::clone(&self.storage);
        let registry = Arc::clone(&self.registry);
        let report = tokio::task::spawn_blocking(move || {
            let mut report = ArchiveReport::default();

            let mut groups: BTreeMap<String, Vec<SensorReading>> = BTreeMap::new();
            for record in records {
                match month::month_key(record.created_at) {
                    Ok(key) => groups.entry(key).or_default().push(record),
                    Err(error) => {
                        log::error!("reading with created_at={} cannot be partitioned: {error}", record.created_at);
                        report.failures.push(PartitionFailure {
                            partition: format!("created_at={}", record.created_at),
                            error,
                        });
                    }
                }
            }

            for (month_key, group) in groups {
                match write_group(&storage, &registry, &month_key, &group) {
                    Ok(written) => report.archived += written,
                    Err(error) => {
                        log::error!(
                            "archiving {} readings into month {month_key} failed: {error}",
                            group.len()
                        );
                        report.failures.push(PartitionFailure {
                            partition: month_key,
                            error,
                        });
                    }
                }
            }
            report
        })
        .await?;
        Ok(report)
    }
}

/// Writes one month's group in a single transaction against its partition
/// table. Any error here rolls the whole group back.
fn write_group(
    storage: &Storage,
    registry: &PartitionRegistry,
    month_key: &str,
    group: &[SensorReading],
) -> Result<usize> {
    let table = registry.get_or_create(month_key)?;
    let mut conn = storage.write();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&table::insert_sql(&table))?;
        for record in group {
            stmt.execute(params![
                1i64, // archived is forced on at archive time
                record.created_at,
                record.sensor_name,
                record.sensor_channel,
                record.sensor_type,
                record.sensor_model,
                record.primary_value,
                record.other_values,
            ])?;
        }
    }
    tx.commit()?;
    Ok(group.len())
}

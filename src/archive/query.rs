//! Fan-out reads across partition tables.
//!
//! Every operation acquires one gate permit for its whole lifetime, then
//! runs its per-partition sub-queries as concurrent blocking tasks. A
//! sub-query failure is logged and recorded in the result's `failures`; it
//! never aborts the operation or its siblings.

use std::sync::Arc;
use std::thread;

use rusqlite::params;

use super::{Fanout, PartitionFailure, SensorArchive, SensorReading, month, table};
use crate::error::Result;
use crate::storage::Storage;

impl SensorArchive {
    /// Counts readings matching `sensor_name`/`sensor_channel` across every
    /// known partition.
    ///
    /// Tables are split into batches of roughly 1.5x the hardware
    /// parallelism hint; one task per batch counts its tables sequentially.
    /// A single table's failure contributes zero to its batch.
    pub async fn count(&self, sensor_name: &str, sensor_channel: i32) -> Result<Fanout<u64>> {
        let tables = self.registry.list_all();
        if tables.is_empty() {
            return Ok(Fanout::empty());
        }

        let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let batch_size = count_batch_size(parallelism);
        let _permit = self.gate.acquire().await?;

        let mut handles = Vec::new();
        for batch in tables.chunks(batch_size) {
            let storage = Arc::clone(&self.storage);
            let batch = batch.to_vec();
            let sensor_name = sensor_name.to_string();
            handles.push(tokio::task::spawn_blocking(move || {
                let mut sum = 0u64;
                let mut failures = Vec::new();
                for table_name in batch {
                    match count_one(&storage, &table_name, &sensor_name, sensor_channel) {
                        Ok(count) => sum += count,
                        Err(error) => {
                            log::error!("counting {table_name} failed: {error}");
                            failures.push(PartitionFailure {
                                partition: table_name,
                                error,
                            });
                        }
                    }
                }
                (sum, failures)
            }));
        }

        let mut total = 0u64;
        let mut failures = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((sum, mut batch_failures)) => {
                    total += sum;
                    failures.append(&mut batch_failures);
                }
                Err(join) => failures.push(PartitionFailure {
                    partition: "count-batch".to_string(),
                    error: join.into(),
                }),
            }
        }
        Ok(Fanout {
            value: total,
            failures,
        })
    }

    /// Returns all matching readings with `created_at` in `[start, end]`,
    /// merged across the months the range touches and sorted ascending by
    /// timestamp. No order is guaranteed between equal timestamps.
    ///
    /// Months without an existing partition are skipped; reads never create
    /// partitions.
    pub async fn query_in_range(
        &self,
        sensor_name: &str,
        sensor_channel: i32,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Fanout<Vec<SensorReading>>> {
        let tables = self.existing_partitions(start_ms, end_ms)?;
        if tables.is_empty() {
            return Ok(Fanout::empty());
        }

        let _permit = self.gate.acquire().await?;
        let (mut rows, failures) = self
            .fanout_select(tables, sensor_name, sensor_channel, start_ms, end_ms, None)
            .await;
        rows.sort_by_key(|r| r.created_at);
        Ok(Fanout {
            value: rows,
            failures,
        })
    }

    /// Pages through a time range, ascending by timestamp; `page` is
    /// 1-based.
    ///
    /// Each partition contributes at most `page_size` rows per call before
    /// the merge. That keeps per-partition scans cheap, but a page whose
    /// global offset lies deeper than `page_size` rows inside a single
    /// partition comes back short; callers paging far into dense months
    /// should narrow the time range instead.
    pub async fn query_in_range_paged(
        &self,
        sensor_name: &str,
        sensor_channel: i32,
        start_ms: i64,
        end_ms: i64,
        page_size: usize,
        page: usize,
    ) -> Result<Fanout<Vec<SensorReading>>> {
        if page_size == 0 || page == 0 {
            return Ok(Fanout::empty());
        }
        let Some(offset) = (page - 1).checked_mul(page_size) else {
            return Ok(Fanout::empty());
        };
        let tables = self.existing_partitions(start_ms, end_ms)?;
        if tables.is_empty() {
            return Ok(Fanout::empty());
        }

        let _permit = self.gate.acquire().await?;
        let (mut rows, failures) = self
            .fanout_select(
                tables,
                sensor_name,
                sensor_channel,
                start_ms,
                end_ms,
                Some(page_size as i64),
            )
            .await;
        rows.sort_by_key(|r| r.created_at);
        let value = rows.into_iter().skip(offset).take(page_size).collect();
        Ok(Fanout { value, failures })
    }

    /// Month keys in range, narrowed to partitions that actually exist.
    fn existing_partitions(&self, start_ms: i64, end_ms: i64) -> Result<Vec<String>> {
        Ok(month::month_keys_between(start_ms, end_ms)?
            .into_iter()
            .filter_map(|key| self.registry.lookup(&key))
            .collect())
    }

    /// One blocking select per partition table, all running concurrently;
    /// results are concatenated in spawn order, failures collected.
    async fn fanout_select(
        &self,
        tables: Vec<String>,
        sensor_name: &str,
        sensor_channel: i32,
        start_ms: i64,
        end_ms: i64,
        limit: Option<i64>,
    ) -> (Vec<SensorReading>, Vec<PartitionFailure>) {
        let mut handles = Vec::new();
        for table_name in tables {
            let storage = Arc::clone(&self.storage);
            let sensor_name = sensor_name.to_string();
            handles.push(tokio::task::spawn_blocking(move || {
                match select_range(
                    &storage,
                    &table_name,
                    &sensor_name,
                    sensor_channel,
                    start_ms,
                    end_ms,
                    limit,
                ) {
                    Ok(rows) => Ok(rows),
                    Err(error) => {
                        log::error!("querying {table_name} failed: {error}");
                        Err(PartitionFailure {
                            partition: table_name,
                            error,
                        })
                    }
                }
            }));
        }

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(partition_rows)) => rows.extend(partition_rows),
                Ok(Err(failure)) => failures.push(failure),
                Err(join) => failures.push(PartitionFailure {
                    partition: "range-query".to_string(),
                    error: join.into(),
                }),
            }
        }
        (rows, failures)
    }
}

/// At least one table per batch, however few cores the host reports.
fn count_batch_size(parallelism: usize) -> usize {
    (parallelism * 3 / 2).max(1)
}

fn count_one(
    storage: &Storage,
    table: &str,
    sensor_name: &str,
    sensor_channel: i32,
) -> Result<u64> {
    let conn = storage.read();
    let count: i64 = conn.query_row(
        &table::count_sql(table),
        params![sensor_name, sensor_channel],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn select_range(
    storage: &Storage,
    table: &str,
    sensor_name: &str,
    sensor_channel: i32,
    start_ms: i64,
    end_ms: i64,
    limit: Option<i64>,
) -> Result<Vec<SensorReading>> {
    let conn = storage.read();
    let mut rows = Vec::new();
    match limit {
        Some(limit) => {
            let mut stmt = conn.prepare(&table::select_range_limited_sql(table))?;
            let mapped = stmt.query_map(
                params![sensor_name, sensor_channel, start_ms, end_ms, limit],
                table::read_row,
            )?;
            for row in mapped {
                rows.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&table::select_range_sql(table))?;
            let mapped = stmt.query_map(
                params![sensor_name, sensor_channel, start_ms, end_ms],
                table::read_row,
            )?;
            for row in mapped {
                rows.push(row?);
            }
        }
    }
    Ok(rows)
}

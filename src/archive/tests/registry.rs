use super::*;
use crate::error::Error;

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let t = open_archive().await;
    let registry = t.archive.registry();

    let first = registry.get_or_create("2024_01").unwrap();
    let second = registry.get_or_create("2024_01").unwrap();
    assert_eq!(first, "sensor_archive_2024_01");
    assert_eq!(first, second);

    assert_eq!(record_book_entries(&t.storage, "2024_01"), 1);
    assert!(physical_table_exists(&t.storage, &first));

    let index_count: i64 = {
        let conn = t.storage.read();
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
            ["idx_sensor_archive_2024_01_sensor_time"],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(index_count, 1);
}

#[tokio::test]
async fn test_lookup_never_creates() {
    let t = open_archive().await;
    assert_eq!(t.archive.lookup_partition("2030_01"), None);
    assert!(!physical_table_exists(&t.storage, "sensor_archive_2030_01"));
    assert!(t.archive.list_partitions().is_empty());
}

#[tokio::test]
async fn test_get_or_create_rejects_malformed_keys() {
    let t = open_archive().await;
    let result = t.archive.registry().get_or_create("2024_01; DROP TABLE x");
    assert!(matches!(result, Err(Error::InvalidPartitionKey(_))));
    assert!(matches!(
        t.archive.registry().get_or_create(""),
        Err(Error::InvalidPartitionKey(_))
    ));
}

#[tokio::test]
async fn test_initialize_rebuilds_cache_from_record_book() {
    let t = open_archive().await;
    t.archive
        .archive(vec![reading("pH", 1, ts(2024, 1, 10, 8))])
        .await
        .unwrap();

    // A second engine over the same database starts cold and must converge
    // on the same registry state after initialize().
    let other = SensorArchive::new(Arc::clone(&t.storage), ArchiveConfig::default());
    assert_eq!(other.lookup_partition("2024_01"), None);
    other.initialize().await.unwrap();
    assert_eq!(
        other.lookup_partition("2024_01"),
        Some("sensor_archive_2024_01".to_string())
    );
    assert_eq!(other.list_partitions(), t.archive.list_partitions());

    // Re-running initialize on the first engine changes nothing.
    t.archive.initialize().await.unwrap();
    assert_eq!(
        t.archive.lookup_partition("2024_01"),
        Some("sensor_archive_2024_01".to_string())
    );
}

#[tokio::test]
async fn test_delete_month_unregisters_but_keeps_table() {
    let t = open_archive().await;
    let table = t.archive.registry().get_or_create("2024_05").unwrap();

    t.archive.registry().delete_month("2024_05").unwrap();
    assert_eq!(t.archive.lookup_partition("2024_05"), None);
    assert_eq!(record_book_entries(&t.storage, "2024_05"), 0);
    // Only the registration is removed; the partition table stays.
    assert!(physical_table_exists(&t.storage, &table));
}

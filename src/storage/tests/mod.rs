
use tempfile::TempDir;

use super::*;

pub struct TestStorage {
    pub storage: Storage,
    // Holding the tempdir keeps the database file alive for the test.
    pub dir: TempDir,
}

pub fn open_test_storage() -> TestStorage {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path().join("test.db")).with_read_pool_size(2);
    let storage = Storage::open(config).unwrap();
    TestStorage { storage, dir }
}

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use blobdb::{BlobReader, BlobStore, StoreConfig};
use rusqlite::Connection;

/// Opens a store over a fresh temp-dir database file.
pub fn store(name: &str) -> (tempfile::TempDir, BlobStore, PathBuf) {
    store_with(name, |_| {})
}

/// Opens a store with tweaked configuration.
pub fn store_with(
    name: &str,
    tweak: impl FnOnce(&mut StoreConfig),
) -> (tempfile::TempDir, BlobStore, PathBuf) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    let mut config = StoreConfig::with_url(format!("sqlite:{}", path.display()));
    tweak(&mut config);
    let store = BlobStore::open(config).expect("open store");
    (dir, store, path)
}

/// Direct connection for SQL fixtures and assertions outside the store.
pub fn raw_conn(path: &Path) -> Connection {
    Connection::open(path).expect("open raw connection")
}

pub fn read_all(mut reader: BlobReader) -> Vec<u8> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).expect("read blob");
    bytes
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_millis() as i64
}

/// Deterministic payload for multi-chunk round trips.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Count of rows still carrying the temp prefix.
pub fn temp_row_count(path: &Path) -> i64 {
    raw_conn(path)
        .query_row(
            "SELECT COUNT(*) FROM DATASTORE WHERE SUBSTR(ID, 1, 5) = 'TEMP_'",
            [],
            |row| row.get(0),
        )
        .expect("count temp rows")
}

/// `LAST_MODIFIED` of one row, or None when the row is gone.
pub fn last_modified(path: &Path, id: &str) -> Option<i64> {
    raw_conn(path)
        .query_row(
            "SELECT LAST_MODIFIED FROM DATASTORE WHERE ID = ?",
            [id],
            |row| row.get(0),
        )
        .ok()
}

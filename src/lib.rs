//! # blobdb: content-addressed blob store on SQLite
//!
//! Every blob is identified by the SHA-1 digest of its contents, so
//! identical payloads are stored exactly once. The store persists blob
//! bytes, a length and a last-access timestamp in a single `DATASTORE`
//! table, streams blobs in and out, and reclaims old rows through an
//! age-based garbage collector that never deletes blobs still referenced
//! by live handles.
//!
//! ## Architecture
//!
//! ```text
//! put(stream) ──► digest tee ──► spool ──► UPDATE SET DATA=?  ──► rename to
//!                 (SHA-1 +      (temp         on temp row          digest key
//!                  counter)      file)                            (guarded)
//!
//! delete_older_than(t) ──► refresh every live id ──► DELETE WHERE
//!                          (in-use registry)         LAST_MODIFIED < t
//! ```
//!
//! Writes are two-phase: a temp row is reserved under a generated id, the
//! payload is streamed into it, and a single guarded `UPDATE` renames it to
//! the digest key, or detects that the content already exists and reuses
//! the existing row. No multi-statement transaction is needed; the rename's
//! row-level atomicity arbitrates concurrent writers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::io::Read;
//! use blobdb::{BlobStore, StoreConfig};
//!
//! let store = BlobStore::open(StoreConfig::with_url("sqlite:blobs.db"))?;
//! let record = store.put(&b"hello"[..])?;
//!
//! let mut bytes = Vec::new();
//! record.stream()?.read_to_end(&mut bytes)?;
//! assert_eq!(bytes, b"hello");
//! # Ok::<(), blobdb::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`store`]: the store engine and its public operations
//! - [`record`]: caller-held record handles
//! - [`stream`]: blob readers (spooled or live)
//! - [`digest`]: streaming SHA-1 tee
//! - [`spool`]: temp-file spooling and length delivery modes
//! - [`dialect`]: dialect-keyed statement templates
//! - [`pool`]: connection pool and named data sources
//! - [`liveness`]: the in-use registry consulted by the garbage collector
//! - [`config`]: construction-time settings
//! - [`types`]: the content identifier
//! - [`error`]: the unified error type

pub mod config;
pub mod dialect;
pub mod digest;
pub mod error;
pub mod liveness;
pub mod pool;
pub mod record;
pub mod spool;
pub mod store;
pub mod stream;
pub mod types;

mod gateway;
mod schema;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use pool::{register_data_source, ConnectionPool};
pub use record::BlobRecord;
pub use spool::LengthMode;
pub use store::BlobStore;
pub use stream::BlobReader;
pub use types::{RecordId, DIGEST_LEN, TEMP_PREFIX};

//! The store engine.
//!
//! [`BlobStore`] orchestrates the digest tee, the spool, the SQL gateway
//! and the in-use registry behind the public operations. The centre of
//! gravity is the two-phase write in [`BlobStore::put`]:
//!
//! ```text
//! reserve          stream                      commit
//! ┌─────────────┐  ┌────────────────────────┐  ┌──────────────────────────┐
//! │ INSERT temp │→ │ digest tee → spool →   │→ │ UPDATE SET ID=digest ... │
//! │ row (NULL)  │  │ UPDATE SET DATA=?      │  │ WHERE ID=temp AND NOT    │
//! └─────────────┘  └────────────────────────┘  │ EXISTS(digest row)       │
//!                                              └──────────────────────────┘
//! ```
//!
//! The commit is a single guarded statement; its update count decides
//! between "fresh content" and "duplicate of an existing row". There is no
//! multi-statement transaction anywhere: every statement auto-commits on a
//! borrowed connection, and the rename's row-level atomicity is the whole
//! correctness argument for concurrent writers of the same content.
//!
//! Garbage collection deletes by age but first refreshes the timestamp of
//! every identifier the registry reports live, so a held record can never
//! lose its row.

use std::io::Read;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::DatabaseName;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::dialect::{self, Dialect, StatementSet};
use crate::digest::DigestReader;
use crate::error::{Error, Result};
use crate::gateway::{BlobPayload, SqlGateway};
use crate::liveness::InUseRegistry;
use crate::pool::{self, ConnectionPool};
use crate::record::BlobRecord;
use crate::schema;
use crate::spool::{self, LengthMode};
use crate::stream::BlobReader;
use crate::types::{RecordId, TEMP_PREFIX};

// =============================================================================
// Store
// =============================================================================

/// Content-addressed blob store over a relational table.
///
/// Cheap to share: operations take `&self` and may run from any number of
/// threads concurrently.
#[derive(Debug)]
pub struct BlobStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) gateway: SqlGateway,
    pub(crate) registry: InUseRegistry,
    copy_when_reading: bool,
    length_mode: LengthMode,
    min_record_length: u32,
    dialect: Dialect,
    /// Rows observed with a timestamp below this value are refreshed on
    /// access. Set by [`BlobStore::update_modified_on_access`].
    min_modified: AtomicI64,
    /// Serialises garbage collection; held for the whole sweep.
    gc_lock: Mutex<()>,
}

impl BlobStore {
    /// Opens a store from its configuration.
    ///
    /// Validates the settings, resolves the dialect's statements, acquires
    /// the connection pool (from the url or a registered data source) and,
    /// unless disabled, runs the schema check.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let dialect = config.resolve_dialect()?;
        let length_mode = config.length_mode()?;
        if config.max_connections.is_some() {
            debug!("maxConnections is accepted for compatibility and ignored");
        }

        let stmts = StatementSet::resolve(dialect, &config.effective_prefix());
        let pool = match &config.data_source_name {
            Some(name) => pool::data_source(name).ok_or_else(|| {
                Error::Config(format!("no data source registered under '{name}'"))
            })?,
            None => ConnectionPool::new(dialect::sqlite_path(&config.url)?),
        };
        let gateway = SqlGateway::new(pool, stmts);
        if config.schema_check_enabled {
            schema::ensure_table(&gateway)?;
        }

        Ok(Self {
            inner: Arc::new(StoreInner {
                gateway,
                registry: InUseRegistry::new(),
                copy_when_reading: config.copy_when_reading,
                length_mode,
                min_record_length: config.min_record_length,
                dialect,
                min_modified: AtomicI64::new(0),
                gc_lock: Mutex::new(()),
            }),
        })
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Stores a stream's bytes and returns a handle to the committed row.
    ///
    /// The returned record's identifier is the SHA-1 digest of the fully
    /// consumed input. Identical content is stored once: a second `put` of
    /// the same bytes lands on the existing row.
    ///
    /// # Errors
    ///
    /// I/O and SQL failures propagate. [`Error::HashCollision`] is raised
    /// when an existing row under the same digest reports a different
    /// length; that error is fatal for the store's content.
    pub fn put(&self, stream: impl Read) -> Result<BlobRecord> {
        let inner = &self.inner;

        // Reserve a temp row keyed by a fresh uuid. Retried on the
        // (practically impossible) collision with an existing row.
        let temp_id = loop {
            let candidate = format!("{TEMP_PREFIX}{}", Uuid::new_v4());
            if inner.gateway.select_meta(&candidate)?.is_some() {
                continue;
            }
            inner.gateway.insert_temp(&candidate, now_ms())?;
            break candidate;
        };
        let temp = inner.registry.temp_guard(temp_id);

        // Stream through the digest tee into the reserved row. Either arm
        // consumes the input to EOF.
        let mut tee = DigestReader::new(stream);
        let mut payload = match inner.length_mode {
            LengthMode::TempFile => BlobPayload::Spooled(spool::spool_to_temp(&mut tee)?),
            LengthMode::Unknown | LengthMode::Max => {
                let mut buf = Vec::new();
                tee.read_to_end(&mut buf)?;
                BlobPayload::Buffered(buf)
            }
        };
        inner.gateway.update_data(temp.id(), &mut payload)?;
        drop(payload);

        let (id, length) = tee.finish();
        let _held = inner.registry.use_guard(id);
        let id_str = id.to_string();
        let now = now_ms();

        // Commit: one guarded rename; the update count arbitrates between
        // fresh content and a duplicate of an existing row.
        let count = inner
            .gateway
            .rename_temp(&id_str, length as i64, now, temp.id())?;
        if count == 0 {
            inner.gateway.delete_by_id(temp.id())?;
            match inner.gateway.select_meta(&id_str)? {
                Some((stored_length, last_modified)) => {
                    if stored_length != length as i64 {
                        error!(id = %id_str, length, stored_length, "SHA-1 collision detected");
                        return Err(Error::HashCollision {
                            id: id_str,
                            length,
                            stored_length: stored_length as u64,
                        });
                    }
                    inner.touch(&id_str, last_modified)?;
                }
                None => {
                    // The duplicate vanished between rename and lookup;
                    // from here on the caller's record pins the id.
                    warn!(id = %id_str, "duplicate row disappeared during ingest");
                }
            }
        }
        Ok(BlobRecord::new(Arc::clone(inner), id, length, now))
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Looks up a record by identifier.
    ///
    /// Registers the identifier as in-use, refreshes its timestamp when it
    /// has fallen behind the access window, and returns a handle.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no row exists for the identifier.
    pub fn get_record(&self, id: &RecordId) -> Result<BlobRecord> {
        let inner = &self.inner;
        let _held = inner.registry.use_guard(*id);
        let id_str = id.to_string();
        let (length, last_modified) = inner
            .gateway
            .select_meta(&id_str)?
            .ok_or(Error::NotFound(id_str.clone()))?;
        inner.touch(&id_str, last_modified)?;
        Ok(BlobRecord::new(
            Arc::clone(inner),
            *id,
            length as u64,
            last_modified,
        ))
    }

    /// Like [`get_record`](Self::get_record), with the miss folded into
    /// `None`.
    pub fn get_record_if_stored(&self, id: &RecordId) -> Result<Option<BlobRecord>> {
        match self.get_record(id) {
            Ok(record) => Ok(Some(record)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Opens a reader over a stored blob's bytes.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no row exists for the identifier.
    pub fn open_stream(&self, id: &RecordId) -> Result<BlobReader> {
        self.inner.open_stream_by_id(id)
    }

    /// Snapshot of all committed identifiers. Rows mid-ingest (temp
    /// prefix) are filtered out.
    pub fn record_ids(&self) -> Result<Vec<RecordId>> {
        self.inner
            .gateway
            .select_all()?
            .into_iter()
            .filter(|id| !id.starts_with(TEMP_PREFIX))
            .map(|id| RecordId::from_hex(&id))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Garbage collection
    // -------------------------------------------------------------------------

    /// Deletes every row whose timestamp is older than `min_modified_ms`
    /// and returns the deletion count.
    ///
    /// At most one sweep runs at a time per store. Before deleting, every
    /// identifier the registry reports live (committed ids held by records
    /// plus temp ids mid-ingest) has its timestamp refreshed past the
    /// threshold, so rows referenced at the start of the sweep always
    /// survive it. Identifiers that become live only after the refresh
    /// pass may still be deleted; callers must hold a record before
    /// relying on the bytes.
    pub fn delete_older_than(&self, min_modified_ms: i64) -> Result<usize> {
        let inner = &self.inner;
        let _serialised = inner.gc_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let live = inner.registry.snapshot_live();
        let refresh_to = now_ms().max(min_modified_ms);
        for key in &live {
            inner.gateway.update_last_modified(refresh_to, key)?;
        }
        debug!(
            live = live.len(),
            min_modified_ms, "deleting rows older than threshold"
        );
        inner.gateway.delete_older(min_modified_ms)
    }

    /// Sets the access window: rows observed with `LAST_MODIFIED` below
    /// `before_ms` are refreshed to the current time on their next read or
    /// write.
    pub fn update_modified_on_access(&self, before_ms: i64) {
        debug!(before_ms, "updating modified date on access");
        self.inner.min_modified.store(before_ms, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Empties the committed in-use set. Records already handed out stop
    /// counting as live.
    pub fn clear_in_use(&self) {
        self.inner.registry.clear_committed();
    }

    /// Releases pooled connections. The store stays usable; subsequent
    /// operations open fresh connections.
    pub fn close(&self) -> Result<()> {
        self.inner.gateway.pool().close();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Smallest payload size the enclosing repository should store here.
    pub fn min_record_length(&self) -> u32 {
        self.inner.min_record_length
    }

    /// Whether reads spool to a scratch file.
    pub fn copy_when_reading(&self) -> bool {
        self.inner.copy_when_reading
    }

    /// Name of the resolved dialect.
    pub fn database_type(&self) -> &'static str {
        self.inner.dialect.name()
    }
}

// =============================================================================
// Shared internals
// =============================================================================

impl StoreInner {
    /// Opens a reader for one row, shaped by `copyWhenReading`.
    pub(crate) fn open_stream_by_id(&self, id: &RecordId) -> Result<BlobReader> {
        let id_str = id.to_string();
        let conn = self.gateway.checkout()?;
        let Some((rowid, is_null)) = self.gateway.locate_blob(&conn, &id_str)? else {
            return Err(Error::NotFound(id_str));
        };
        if is_null {
            // Only possible for rows created out-of-band; committed rows
            // always carry data.
            return Ok(BlobReader::empty());
        }
        let table = self.gateway.statements().table_name.clone();
        if self.copy_when_reading {
            let mut blob = conn.blob_open(DatabaseName::Main, &table, "DATA", rowid, true)?;
            let spool = spool::spool_to_temp(&mut blob)?;
            Ok(BlobReader::spooled(spool))
        } else {
            let length = {
                let blob = conn.blob_open(DatabaseName::Main, &table, "DATA", rowid, true)?;
                blob.size() as u64
            };
            Ok(BlobReader::live(conn, table, rowid, length))
        }
    }

    /// Refreshes a row's timestamp when it has fallen behind the access
    /// window. Returns the timestamp now in effect.
    pub(crate) fn touch(&self, id: &str, last_modified: i64) -> Result<i64> {
        let min = self.min_modified.load(Ordering::SeqCst);
        if last_modified < min {
            let now = now_ms();
            self.gateway.update_last_modified(now, id)?;
            return Ok(now);
        }
        Ok(last_modified)
    }
}

/// Milliseconds since the epoch.
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

//! Statement execution over pooled connections.
//!
//! [`SqlGateway`] owns the resolved [`StatementSet`] and runs each statement
//! on a connection borrowed from the pool, auto-committed. It also hides the
//! driver-level shape of binary parameters: a spooled payload of known
//! length is written through SQLite's incremental-BLOB API (bind
//! `ZEROBLOB(n)`, then stream into the open blob handle), while the
//! `-1`/`max` length modes arrive as an in-memory buffer and bind directly.

use std::io;
use std::sync::Arc;

use rusqlite::blob::ZeroBlob;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};

use crate::dialect::StatementSet;
use crate::error::{Error, Result};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::spool::SpoolFile;

// =============================================================================
// Binary parameters
// =============================================================================

/// A payload ready to be bound to the `DATA` column, shaped by the
/// configured length mode.
pub(crate) enum BlobPayload {
    /// Spooled to a scratch file; exact length known up front.
    Spooled(SpoolFile),
    /// Fully buffered in memory; the driver sees the bytes directly.
    Buffered(Vec<u8>),
}

// =============================================================================
// Gateway
// =============================================================================

/// Executes the store's statements against a connection pool.
#[derive(Debug)]
pub struct SqlGateway {
    pool: Arc<ConnectionPool>,
    stmts: StatementSet,
}

impl SqlGateway {
    pub(crate) fn new(pool: Arc<ConnectionPool>, stmts: StatementSet) -> Self {
        Self { pool, stmts }
    }

    /// The resolved statements, placeholders already substituted.
    pub(crate) fn statements(&self) -> &StatementSet {
        &self.stmts
    }

    pub(crate) fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Borrows a connection for a caller-managed scope (streaming reads).
    pub(crate) fn checkout(&self) -> Result<PooledConnection> {
        self.pool.checkout()
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Reserves a temp row: `(id, 0, now, NULL)`.
    pub(crate) fn insert_temp(&self, id: &str, now: i64) -> Result<()> {
        let conn = self.checkout()?;
        conn.execute(&self.stmts.insert_temp, params![id, now])?;
        Ok(())
    }

    /// Writes a payload into a reserved row.
    pub(crate) fn update_data(&self, id: &str, payload: &mut BlobPayload) -> Result<()> {
        let conn = self.checkout()?;
        match payload {
            BlobPayload::Buffered(bytes) => {
                conn.execute(&self.stmts.update_data, params![&bytes[..], id])?;
            }
            BlobPayload::Spooled(spool) => {
                let declared = i32::try_from(spool.length()).map_err(|_| {
                    Error::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "payload exceeds the 2 GiB BLOB limit",
                    ))
                })?;
                conn.execute(&self.stmts.update_data, params![ZeroBlob(declared), id])?;
                let (rowid, _) = self
                    .locate_blob(&conn, id)?
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;
                let mut blob =
                    conn.blob_open(DatabaseName::Main, &self.stmts.table_name, "DATA", rowid, false)?;
                io::copy(spool, &mut blob)?;
            }
        }
        Ok(())
    }

    /// Atomically renames a temp row to its digest key.
    ///
    /// Returns the update count: 1 when this call won, 0 when a row with
    /// that digest already exists.
    pub(crate) fn rename_temp(
        &self,
        id: &str,
        length: i64,
        now: i64,
        temp_id: &str,
    ) -> Result<usize> {
        let conn = self.checkout()?;
        Ok(conn.execute(
            &self.stmts.rename_temp,
            params![id, length, now, temp_id, id],
        )?)
    }

    /// Deletes one row by id.
    pub(crate) fn delete_by_id(&self, id: &str) -> Result<usize> {
        let conn = self.checkout()?;
        Ok(conn.execute(&self.stmts.delete_by_id, params![id])?)
    }

    /// Deletes every row with `LAST_MODIFIED < min`.
    pub(crate) fn delete_older(&self, min: i64) -> Result<usize> {
        let conn = self.checkout()?;
        Ok(conn.execute(&self.stmts.delete_older, params![min])?)
    }

    /// Sets a row's timestamp to `ts` if it currently holds a smaller value.
    pub(crate) fn update_last_modified(&self, ts: i64, id: &str) -> Result<usize> {
        let conn = self.checkout()?;
        Ok(conn.execute(&self.stmts.update_last_modified, params![ts, id, ts])?)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Looks up `(LENGTH, LAST_MODIFIED)` for an id.
    pub(crate) fn select_meta(&self, id: &str) -> Result<Option<(i64, i64)>> {
        let conn = self.checkout()?;
        let row = conn
            .query_row(&self.stmts.select_meta, params![id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(row)
    }

    /// Enumerates every row id, temp rows included.
    pub(crate) fn select_all(&self) -> Result<Vec<String>> {
        let conn = self.checkout()?;
        let mut stmt = conn.prepare(&self.stmts.select_all)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Resolves a row's `(rowid, DATA IS NULL)` on the given connection.
    ///
    /// Takes the connection explicitly so a streaming read can open the
    /// blob on the same connection afterwards.
    pub(crate) fn locate_blob(&self, conn: &Connection, id: &str) -> Result<Option<(i64, bool)>> {
        let row = conn
            .query_row(&self.stmts.select_data, params![id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(row)
    }

    // -------------------------------------------------------------------------
    // Schema bootstrap
    // -------------------------------------------------------------------------

    /// Whether the effective table already exists.
    pub(crate) fn table_exists(&self) -> Result<bool> {
        let conn = self.checkout()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                params![&self.stmts.table_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Runs DDL, e.g. the resolved `createTable` statement.
    pub(crate) fn execute_ddl(&self, sql: &str) -> Result<()> {
        let conn = self.checkout()?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

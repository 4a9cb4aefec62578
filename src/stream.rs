//! Caller-owned blob readers.
//!
//! [`BlobReader`] is what `open_stream` hands out. Three shapes, invisible
//! to the caller:
//!
//! - empty, for rows whose `DATA` is NULL; nothing is held;
//! - spooled, the default: the blob was copied to a scratch file and the
//!   database connection already released; the file is deleted on drop;
//! - live, for `copyWhenReading = false`: the reader owns its pooled
//!   connection for its whole lifetime and pulls the blob through SQLite's
//!   incremental-BLOB API in chunks. Dropping the reader releases the
//!   connection, which is the equivalent of closing the result set.
//!
//! Concurrent readers of the same row are independent: each live reader has
//! its own connection, each spooled reader its own file.

use std::io::{self, Read, Seek, SeekFrom};

use rusqlite::DatabaseName;

use crate::pool::PooledConnection;
use crate::spool::SpoolFile;

/// Bytes fetched per incremental-BLOB access in a live reader.
const LIVE_CHUNK: usize = 64 * 1024;

/// A readable view over one stored blob. Must be dropped (or read to EOF
/// and dropped) to release the underlying connection or scratch file.
pub struct BlobReader(Inner);

enum Inner {
    Empty,
    Spooled(SpoolFile),
    Live(LiveBlobReader),
}

impl BlobReader {
    pub(crate) fn empty() -> Self {
        Self(Inner::Empty)
    }

    pub(crate) fn spooled(spool: SpoolFile) -> Self {
        Self(Inner::Spooled(spool))
    }

    pub(crate) fn live(conn: PooledConnection, table: String, rowid: i64, length: u64) -> Self {
        Self(Inner::Live(LiveBlobReader {
            conn,
            table,
            rowid,
            length,
            pos: 0,
            buf: Vec::new(),
            buf_pos: 0,
        }))
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.0 {
            Inner::Empty => Ok(0),
            Inner::Spooled(spool) => spool.read(buf),
            Inner::Live(live) => live.read(buf),
        }
    }
}

// =============================================================================
// Live reader
// =============================================================================

/// Chunked reader over the incremental-BLOB API.
///
/// The blob handle borrows the connection, so it cannot be stored alongside
/// it; instead the handle is reopened per chunk, with a buffer large enough
/// that the reopen cost is amortised away.
struct LiveBlobReader {
    conn: PooledConnection,
    table: String,
    rowid: i64,
    length: u64,
    pos: u64,
    buf: Vec<u8>,
    buf_pos: usize,
}

impl LiveBlobReader {
    fn fill(&mut self) -> io::Result<()> {
        let chunk = LIVE_CHUNK.min((self.length - self.pos) as usize);
        self.buf.resize(chunk, 0);
        self.buf_pos = 0;
        let mut blob = self
            .conn
            .blob_open(DatabaseName::Main, &self.table, "DATA", self.rowid, true)
            .map_err(sql_io)?;
        blob.seek(SeekFrom::Start(self.pos))?;
        blob.read_exact(&mut self.buf)?;
        self.pos += chunk as u64;
        Ok(())
    }
}

impl Read for LiveBlobReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.buf_pos >= self.buf.len() {
            if self.pos >= self.length {
                return Ok(0);
            }
            self.fill()?;
        }
        let n = out.len().min(self.buf.len() - self.buf_pos);
        out[..n].copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + n]);
        self.buf_pos += n;
        Ok(n)
    }
}

fn sql_io(err: rusqlite::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

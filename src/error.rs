//! Error handling for blobdb.
//!
//! A single [`Error`] enum covers every failure mode the store can surface:
//! configuration problems raised at init, missing records, transport-level
//! SQL and I/O failures, and the (fatal) digest collision. Callers that want
//! to react to a specific condition match on the variant; everything else is
//! propagated as-is, carrying the original cause.

use thiserror::Error;

/// All errors that can occur in blobdb operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or contradictory configuration, rejected at init.
    ///
    /// Examples: an unknown `databaseType`, an unsupported stream length
    /// mode, `dataSourceName` combined with explicit credentials.
    #[error("configuration error: {0}")]
    Config(String),

    /// No row exists for the identifier the caller supplied.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A committed row carries an identifier that is not a lowercase hex
    /// digest. Only possible when the table was modified out-of-band.
    #[error("malformed record identifier '{0}'")]
    InvalidId(String),

    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Spool-file or stream I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Two payloads with the same SHA-1 digest reported different lengths.
    ///
    /// Always fatal: the store keys rows by digest, so a collision means
    /// the content-addressing guarantee no longer holds.
    #[error("SHA-1 collision on {id}: length {length} vs stored length {stored_length}")]
    HashCollision {
        /// The colliding identifier (lowercase hex).
        id: String,
        /// Byte length of the payload just ingested.
        length: u64,
        /// Byte length recorded for the existing row.
        stored_length: u64,
    },
}

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

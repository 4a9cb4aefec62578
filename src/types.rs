//! Core identifier type.
//!
//! Every committed row is keyed by the SHA-1 digest of its payload. A
//! [`RecordId`] wraps the raw digest bytes; its string form (lowercase hex)
//! is both the primary key in the `DATASTORE` table and the handle callers
//! pass around. Rows mid-ingest use a generated id carrying [`TEMP_PREFIX`]
//! instead and are never surfaced as identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Length in bytes of the SHA-1 digest backing a [`RecordId`].
pub const DIGEST_LEN: usize = 20;

/// Prefix marking a row as a reserved, not-yet-committed ingest target.
pub const TEMP_PREFIX: &str = "TEMP_";

// =============================================================================
// RecordId
// =============================================================================

/// Content identifier: the SHA-1 digest of a blob's bytes.
///
/// Two blobs with equal contents always yield equal identifiers, which is
/// what deduplicates storage. The identifier is cheap to copy and ordered,
/// so snapshots of identifiers can be sorted and compared in tests.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; DIGEST_LEN]);

impl RecordId {
    /// Wraps raw digest bytes produced by the digest engine.
    pub(crate) fn from_digest(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses the lowercase-hex string form stored in the `ID` column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] unless the input is exactly 40 hex
    /// characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| Error::InvalidId(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

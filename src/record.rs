//! Record handles.
//!
//! A [`BlobRecord`] is the caller's handle to one committed blob: the
//! identifier, the byte length, the last-modified timestamp, and stream
//! access. While a handle is alive its identifier counts as in-use, which
//! is what shields the row from age-based garbage collection; the hold is
//! released when the handle drops.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::store::StoreInner;
use crate::stream::BlobReader;
use crate::types::RecordId;

/// Handle to one committed blob. Holds its identifier live until dropped.
pub struct BlobRecord {
    id: RecordId,
    length: u64,
    last_modified: i64,
    store: Arc<StoreInner>,
}

impl BlobRecord {
    pub(crate) fn new(store: Arc<StoreInner>, id: RecordId, length: u64, last_modified: i64) -> Self {
        store.registry.acquire(id);
        Self {
            id,
            length,
            last_modified,
            store,
        }
    }

    /// The content identifier.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Payload length in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Last-modified timestamp (ms since epoch) observed when the handle
    /// was created.
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Opens a fresh reader over the blob's bytes.
    ///
    /// Each call yields an independent reader; the caller owns it and must
    /// drop it to release the underlying connection or scratch file.
    pub fn stream(&self) -> Result<BlobReader> {
        self.store.open_stream_by_id(&self.id)
    }
}

impl Drop for BlobRecord {
    fn drop(&mut self) {
        self.store.registry.release(&self.id);
    }
}

impl fmt::Debug for BlobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobRecord")
            .field("id", &self.id)
            .field("length", &self.length)
            .field("last_modified", &self.last_modified)
            .finish()
    }
}

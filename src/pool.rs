//! Connection pool and named data sources.
//!
//! Every statement the store executes runs on a connection borrowed from a
//! [`ConnectionPool`] and auto-committed; there are no multi-statement
//! transactions. Checkout pops an idle connection or opens a fresh one, so
//! concurrent operations never wait on each other for a connection. Checkin
//! happens on drop of the [`PooledConnection`] guard; a bounded idle list
//! keeps the common case allocation-free.
//!
//! Connections are opened in WAL journal mode with a busy timeout, so
//! concurrent writers queue behind SQLite's write lock instead of failing.
//!
//! A process-global registry maps logical names to pre-built pools. A store
//! configured with `dataSourceName` looks its pool up here instead of
//! opening one from a url.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

/// Idle connections kept for reuse; checkouts beyond this open fresh
/// connections that are closed on checkin.
const MAX_IDLE: usize = 8;

/// How long a connection waits on SQLite's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Pool
// =============================================================================

/// A checkout/checkin pool of SQLite connections over one database file.
#[derive(Debug)]
pub struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    /// Creates a pool over the given database file.
    ///
    /// The file is created on first checkout if it does not exist; no
    /// connection is opened up front.
    pub fn new(path: impl AsRef<Path>) -> Arc<Self> {
        Arc::new(Self {
            path: path.as_ref().to_path_buf(),
            idle: Mutex::new(Vec::new()),
        })
    }

    /// Borrows a connection, opening a new one when none is idle.
    pub fn checkout(self: &Arc<Self>) -> Result<PooledConnection> {
        let reused = lock(&self.idle).pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
        })
    }

    /// Drops all idle connections.
    pub fn close(&self) {
        lock(&self.idle).clear();
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL")?;
        Ok(conn)
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = lock(&self.idle);
        if idle.len() < MAX_IDLE {
            idle.push(conn);
        }
        // Beyond the cap the connection just drops, closing it.
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Checkout guard
// =============================================================================

/// A borrowed connection; returns to the pool on drop.
#[derive(Debug)]
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }
}

// =============================================================================
// Named data sources
// =============================================================================

fn registry() -> &'static Mutex<HashMap<String, Arc<ConnectionPool>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<ConnectionPool>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers a pre-built pool under a logical name, replacing any previous
/// registration. Stores configured with `dataSourceName` resolve against
/// this registry.
pub fn register_data_source(name: impl Into<String>, pool: Arc<ConnectionPool>) {
    lock(registry()).insert(name.into(), pool);
}

/// Looks up a pool registered under a logical name.
pub fn data_source(name: &str) -> Option<Arc<ConnectionPool>> {
    lock(registry()).get(name).cloned()
}

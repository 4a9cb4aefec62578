//! Schema bootstrap.
//!
//! The store persists into a single table. When `schemaCheckEnabled` is on,
//! init verifies the effective table exists and runs the dialect's
//! `createTable` DDL when it does not. Safe to run on every startup.

use tracing::debug;

use crate::error::Result;
use crate::gateway::SqlGateway;

/// Ensures the store's table exists, creating it when missing.
pub(crate) fn ensure_table(gateway: &SqlGateway) -> Result<()> {
    if gateway.table_exists()? {
        return Ok(());
    }
    let stmts = gateway.statements();
    debug!(table = %stmts.table_name, "creating datastore table");
    gateway.execute_ddl(&stmts.create_table)?;
    Ok(())
}

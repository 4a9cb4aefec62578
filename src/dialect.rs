//! Dialect-keyed statement templates.
//!
//! Every SQL statement the store executes comes from a fixed set of ten
//! templates. Templates carry two placeholders, `${table}` and
//! `${tablePrefix}`, resolved exactly once at init into a [`StatementSet`].
//! The effective table name is `tablePrefix + schemaObjectPrefix + DATASTORE`.
//!
//! The template variant is keyed by the configured `databaseType`, or derived
//! from the url sub-protocol (`sqlite:/path/to.db` -> `sqlite`). An
//! unresolvable or unknown dialect is a hard configuration error; there is no
//! silent generic fallback.

use crate::error::{Error, Result};

/// Base name of the one persistent table.
pub const DEFAULT_TABLE: &str = "DATASTORE";

// =============================================================================
// Generic templates
// =============================================================================
// The portable forms. Dialects start from these and override individual
// statements where the driver needs a different shape.

const CREATE_TABLE: &str = "CREATE TABLE ${tablePrefix}${table}(ID VARCHAR(255) PRIMARY KEY, LENGTH BIGINT, LAST_MODIFIED BIGINT, DATA BLOB)";

const INSERT_TEMP: &str = "INSERT INTO ${tablePrefix}${table} VALUES(?, 0, ?, NULL)";

const UPDATE_DATA: &str = "UPDATE ${tablePrefix}${table} SET DATA=? WHERE ID=?";

const UPDATE_LAST_MODIFIED: &str =
    "UPDATE ${tablePrefix}${table} SET LAST_MODIFIED=? WHERE ID=? AND LAST_MODIFIED<?";

/// The rename statement: promotes a temp row to its digest key, guarded so
/// at most one concurrent writer of the same content can win.
const RENAME_TEMP: &str = "UPDATE ${tablePrefix}${table} SET ID=?, LENGTH=?, LAST_MODIFIED=? WHERE ID=? AND NOT EXISTS(SELECT ID FROM ${tablePrefix}${table} WHERE ID=?)";

const DELETE_BY_ID: &str = "DELETE FROM ${tablePrefix}${table} WHERE ID=?";

const DELETE_OLDER: &str = "DELETE FROM ${tablePrefix}${table} WHERE LAST_MODIFIED<?";

const SELECT_META: &str =
    "SELECT LENGTH, LAST_MODIFIED FROM ${tablePrefix}${table} WHERE ID=?";

const SELECT_ALL: &str = "SELECT ID FROM ${tablePrefix}${table}";

/// SQLite form of the generic `SELECT ID, DATA ... WHERE ID=?` lookup: the
/// incremental-BLOB API addresses a blob by rowid, so this resolves the
/// rowid and NULL-ness instead of materialising the whole column.
const SELECT_DATA_SQLITE: &str =
    "SELECT rowid, DATA IS NULL FROM ${tablePrefix}${table} WHERE ID=?";

// =============================================================================
// Dialect
// =============================================================================

/// A known SQL dialect, selecting a statement-template variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite through rusqlite. The only shipped dialect.
    Sqlite,
}

impl Dialect {
    /// Looks up a dialect by its `databaseType` name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!(
                "unknown databaseType '{other}'; known dialects: sqlite"
            ))),
        }
    }

    /// Derives a dialect from a url's sub-protocol, e.g. `sqlite:store.db`.
    ///
    /// # Errors
    ///
    /// A url without a sub-protocol separator, or with an unknown one, is a
    /// configuration error: the caller must then set `databaseType`
    /// explicitly.
    pub fn from_url(url: &str) -> Result<Self> {
        let sub = url.split(':').next().filter(|s| !s.is_empty() && *s != url);
        match sub {
            Some(name) => Self::from_name(name),
            None => Err(Error::Config(format!(
                "cannot derive a dialect from url '{url}'; set databaseType explicitly"
            ))),
        }
    }

    /// The `databaseType` name of this dialect.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }
}

/// Extracts the filesystem path from a `sqlite:` url.
pub(crate) fn sqlite_path(url: &str) -> Result<&str> {
    let rest = url
        .strip_prefix("sqlite:")
        .ok_or_else(|| Error::Config(format!("not a sqlite url: '{url}'")))?;
    let path = rest.strip_prefix("//").unwrap_or(rest);
    if path.is_empty() {
        return Err(Error::Config(format!("sqlite url '{url}' has no path")));
    }
    Ok(path)
}

// =============================================================================
// Resolved statements
// =============================================================================

/// The ten statements with placeholders substituted, plus the effective
/// table name. Built once at init and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct StatementSet {
    /// Effective table name (`tablePrefix + schemaObjectPrefix + DATASTORE`).
    pub table_name: String,
    /// Schema bootstrap DDL.
    pub create_table: String,
    /// Reserve a temp row: `(id, 0, now, NULL)`.
    pub insert_temp: String,
    /// Write payload bytes into a reserved row.
    pub update_data: String,
    /// Refresh a row's timestamp, monotonically.
    pub update_last_modified: String,
    /// Atomic temp-to-digest rename, guarded against existing duplicates.
    pub rename_temp: String,
    /// Delete one row by id.
    pub delete_by_id: String,
    /// Age-based bulk delete.
    pub delete_older: String,
    /// Length and timestamp lookup by id.
    pub select_meta: String,
    /// Enumerate all row ids.
    pub select_all: String,
    /// Locate a row's payload for streaming.
    pub select_data: String,
}

impl StatementSet {
    /// Resolves the dialect's templates against the configured prefix.
    pub fn resolve(dialect: Dialect, table_prefix: &str) -> Self {
        let select_data = match dialect {
            Dialect::Sqlite => SELECT_DATA_SQLITE,
        };
        let sub = |template: &str| expand(template, DEFAULT_TABLE, table_prefix);
        Self {
            table_name: format!("{table_prefix}{DEFAULT_TABLE}"),
            create_table: sub(CREATE_TABLE),
            insert_temp: sub(INSERT_TEMP),
            update_data: sub(UPDATE_DATA),
            update_last_modified: sub(UPDATE_LAST_MODIFIED),
            rename_temp: sub(RENAME_TEMP),
            delete_by_id: sub(DELETE_BY_ID),
            delete_older: sub(DELETE_OLDER),
            select_meta: sub(SELECT_META),
            select_all: sub(SELECT_ALL),
            select_data: sub(select_data),
        }
    }
}

fn expand(template: &str, table: &str, prefix: &str) -> String {
    template
        .replace("${tablePrefix}", prefix)
        .replace("${table}", table)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_from_name() {
        assert_eq!(Dialect::from_name("sqlite").unwrap(), Dialect::Sqlite);
        assert!(matches!(
            Dialect::from_name("oracle"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn dialect_from_url_sub_protocol() {
        assert_eq!(Dialect::from_url("sqlite:store.db").unwrap(), Dialect::Sqlite);
        assert!(Dialect::from_url("postgresql:test").is_err());
        assert!(Dialect::from_url("just-a-path.db").is_err());
    }

    #[test]
    fn sqlite_path_forms() {
        assert_eq!(sqlite_path("sqlite:store.db").unwrap(), "store.db");
        assert_eq!(sqlite_path("sqlite:/var/lib/a.db").unwrap(), "/var/lib/a.db");
        assert_eq!(sqlite_path("sqlite:///var/lib/a.db").unwrap(), "/var/lib/a.db");
        assert!(sqlite_path("sqlite:").is_err());
        assert!(sqlite_path("mysql:x").is_err());
    }

    #[test]
    fn resolve_substitutes_placeholders() {
        let stmts = StatementSet::resolve(Dialect::Sqlite, "pre_");
        assert_eq!(stmts.table_name, "pre_DATASTORE");
        assert_eq!(
            stmts.select_meta,
            "SELECT LENGTH, LAST_MODIFIED FROM pre_DATASTORE WHERE ID=?"
        );
        assert_eq!(stmts.select_all, "SELECT ID FROM pre_DATASTORE");
        assert!(stmts.create_table.starts_with("CREATE TABLE pre_DATASTORE("));
        assert!(!stmts.rename_temp.contains("${"));
    }

    #[test]
    fn rename_guard_references_table_twice() {
        let stmts = StatementSet::resolve(Dialect::Sqlite, "");
        assert_eq!(stmts.rename_temp.matches("DATASTORE").count(), 2);
        assert!(stmts.rename_temp.contains("NOT EXISTS"));
    }

    #[test]
    fn sqlite_data_lookup_uses_rowid() {
        let stmts = StatementSet::resolve(Dialect::Sqlite, "");
        assert_eq!(
            stmts.select_data,
            "SELECT rowid, DATA IS NULL FROM DATASTORE WHERE ID=?"
        );
    }
}

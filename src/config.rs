//! Store configuration.
//!
//! One struct, handed over at construction. Deserializable from any serde
//! format with camelCase keys; unknown keys are rejected so a typo cannot
//! silently disable a setting. Validation happens in
//! [`StoreConfig::validate`], called by the store before any connection is
//! opened.

use serde::Deserialize;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::spool::LengthMode;

/// Default smallest payload size, in bytes.
pub const DEFAULT_MIN_RECORD_LENGTH: u32 = 100;

/// Upper bound for `minRecordLength`.
const MAX_MIN_RECORD_LENGTH: u32 = 32_000;

/// Construction-time settings for a [`BlobStore`](crate::BlobStore).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreConfig {
    /// Database url, e.g. `sqlite:/var/lib/app/blobs.db`. Must be blank
    /// when `data_source_name` is set.
    pub url: String,
    /// User name for the connection pool. Accepted for dialects that need
    /// credentials; blank for sqlite.
    pub user: String,
    /// Password for the connection pool.
    pub password: String,
    /// Driver hint. Accepted for compatibility; the dialect decides the
    /// driver here.
    pub driver: String,
    /// Explicit dialect name. When unset, derived from the url
    /// sub-protocol.
    pub database_type: Option<String>,
    /// Logical name of a pre-registered connection pool. Alternative to
    /// `url`; requires an explicit `database_type`.
    pub data_source_name: Option<String>,
    /// Smallest payload size the enclosing repository should send here.
    /// At most 32 000.
    pub min_record_length: u32,
    /// Legacy pool-size setting; accepted and ignored.
    pub max_connections: Option<u32>,
    /// Spool blobs to a scratch file when reading. Enabled by default to
    /// support concurrent reads on any driver.
    pub copy_when_reading: bool,
    /// Prefix prepended to the table name, e.g. a schema qualifier.
    pub table_prefix: String,
    /// Second prefix, between `table_prefix` and the table name.
    pub schema_object_prefix: String,
    /// Verify (and if needed create) the table at init.
    pub schema_check_enabled: bool,
    /// Stream length delivery: `tempFile`, `-1` or `max`.
    pub store_stream: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            driver: String::new(),
            database_type: None,
            data_source_name: None,
            min_record_length: DEFAULT_MIN_RECORD_LENGTH,
            max_connections: None,
            copy_when_reading: true,
            table_prefix: String::new(),
            schema_object_prefix: String::new(),
            schema_check_enabled: true,
            store_stream: LengthMode::default().as_str().to_string(),
        }
    }
}

impl StoreConfig {
    /// Convenience constructor for the common case: defaults plus a url.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Resolves the dialect from `database_type` or the url sub-protocol.
    pub(crate) fn resolve_dialect(&self) -> Result<Dialect> {
        if let Some(name) = &self.database_type {
            return Dialect::from_name(name);
        }
        if self.data_source_name.is_some() {
            return Err(Error::Config(
                "databaseType must be set explicitly when using dataSourceName".to_string(),
            ));
        }
        Dialect::from_url(&self.url)
    }

    /// Parses the configured length mode.
    pub(crate) fn length_mode(&self) -> Result<LengthMode> {
        LengthMode::parse(&self.store_stream)
    }

    /// Effective table-name prefix (`tablePrefix + schemaObjectPrefix`).
    pub(crate) fn effective_prefix(&self) -> String {
        format!("{}{}", self.table_prefix, self.schema_object_prefix)
    }

    /// Checks the settings for contradictions. Called once at store init.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(name) = &self.data_source_name {
            if !self.url.is_empty() || !self.user.is_empty() || !self.password.is_empty() {
                return Err(Error::Config(format!(
                    "dataSourceName '{name}' excludes url, user and password"
                )));
            }
        } else if self.url.is_empty() {
            return Err(Error::Config(
                "either url or dataSourceName must be set".to_string(),
            ));
        }
        if self.min_record_length > MAX_MIN_RECORD_LENGTH {
            return Err(Error::Config(format!(
                "minRecordLength {} exceeds the maximum of {MAX_MIN_RECORD_LENGTH}",
                self.min_record_length
            )));
        }
        self.length_mode()?;
        self.resolve_dialect()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.min_record_length, 100);
        assert!(config.copy_when_reading);
        assert!(config.schema_check_enabled);
        assert_eq!(config.store_stream, "tempFile");
        assert!(config.max_connections.is_none());
    }

    #[test]
    fn validate_requires_a_source() {
        let err = StoreConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_accepts_sqlite_url() {
        let config = StoreConfig::with_url("sqlite:blobs.db");
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve_dialect().unwrap(), Dialect::Sqlite);
    }

    #[test]
    fn data_source_excludes_credentials() {
        let mut config = StoreConfig::default();
        config.data_source_name = Some("main".to_string());
        config.database_type = Some("sqlite".to_string());
        config.url = "sqlite:blobs.db".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.url.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn data_source_requires_explicit_dialect() {
        let mut config = StoreConfig::default();
        config.data_source_name = Some("main".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("databaseType"));
    }

    #[test]
    fn min_record_length_bounded() {
        let mut config = StoreConfig::with_url("sqlite:blobs.db");
        config.min_record_length = 32_000;
        assert!(config.validate().is_ok());
        config.min_record_length = 32_001;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_store_stream_rejected() {
        let mut config = StoreConfig::with_url("sqlite:blobs.db");
        config.store_stream = "mmap".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn effective_prefix_concatenates() {
        let mut config = StoreConfig::with_url("sqlite:blobs.db");
        config.table_prefix = "app.".to_string();
        config.schema_object_prefix = "V2_".to_string();
        assert_eq!(config.effective_prefix(), "app.V2_");
    }
}

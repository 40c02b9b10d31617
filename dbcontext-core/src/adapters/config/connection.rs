//! Database connection configuration.
//!
//! `DatabaseConfig` is the only contract between the caller and the core.
//! Its fields are a superset across backends; each adapter reads what it
//! needs and applies its own defaults.

use crate::Result;
use crate::error::DbContextError;
use crate::models::DatabaseType;
use std::path::PathBuf;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Snowflake authenticator value that selects the browser SSO flow.
pub const EXTERNAL_BROWSER_AUTHENTICATOR: &str = "externalbrowser";

/// Configuration for one database connection.
///
/// # Security
/// The password is held in a zeroizing buffer and is omitted from both
/// `Debug` and `Display` output. This struct is never serialized.
///
/// # Example
/// ```rust
/// use dbcontext_core::adapters::DatabaseConfig;
///
/// let config = DatabaseConfig::new("postgres")
///     .with_host("localhost")
///     .with_user("reader")
///     .with_database("analytics");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Default)]
pub struct DatabaseConfig {
    /// Backend type tag (`postgres`, `redshift`, `snowflake`, `mysql`, `bigquery`, `sqlite`)
    pub database_type: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<Zeroizing<String>>,
    /// TLS mode in the backend's own vocabulary (`disable`, `require`, `PREFERRED`, ...)
    pub ssl_mode: Option<String>,
    /// Snowflake account identifier
    pub account: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub schema: Option<String>,
    /// Snowflake authenticator (`snowflake` or `externalbrowser`)
    pub authenticator: Option<String>,
    /// BigQuery project id
    pub project_id: Option<String>,
    /// BigQuery service account or authorized user JSON file
    pub credentials_file: Option<PathBuf>,
    /// SQLite database file
    pub path: Option<PathBuf>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("database_type", &self.database_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("ssl_mode", &self.ssl_mode)
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("schema", &self.schema)
            .field("authenticator", &self.authenticator)
            .field("project_id", &self.project_id)
            .field("credentials_file", &self.credentials_file)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = non_blank(self.host.as_deref())
            .or_else(|| non_blank(self.account.as_deref()))
            .or_else(|| non_blank(self.project_id.as_deref()))
            .map(str::to_string)
            .or_else(|| self.path.as_ref().map(|p| p.display().to_string()))
            .unwrap_or_default();
        write!(
            f,
            "{}({}{}{})",
            self.database_type,
            target,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            non_blank(self.database.as_deref()).map_or_else(String::new, |db| format!("/{}", db))
        )
        // Username and password are never included
    }
}

/// Returns the trimmed value when it is present and not blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl DatabaseConfig {
    /// Creates an empty config for the given backend tag.
    pub fn new(database_type: impl Into<String>) -> Self {
        Self {
            database_type: database_type.into(),
            ..Default::default()
        }
    }

    /// Builder method to set host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder method to set user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Builder method to set password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Builder method to set the SQLite file path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parses the backend tag.
    ///
    /// # Errors
    /// Returns `UnsupportedDatabaseType` for unknown tags.
    pub fn kind(&self) -> Result<DatabaseType> {
        DatabaseType::from_str(&self.database_type)
    }

    /// The password, if one was supplied.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().map(String::as_str)
    }

    /// Whether Snowflake should use the external browser SSO flow.
    pub fn uses_external_browser(&self) -> bool {
        non_blank(self.authenticator.as_deref())
            .is_some_and(|a| a.eq_ignore_ascii_case(EXTERNAL_BROWSER_AUTHENTICATOR))
    }

    /// Validates the fields the configured backend requires.
    ///
    /// Runs before any I/O; failures are configuration errors.
    ///
    /// # Errors
    /// Returns an error naming the first missing or invalid field.
    pub fn validate(&self) -> Result<DatabaseType> {
        let kind = self.kind()?;

        if self.port == Some(0) {
            return Err(DbContextError::configuration("port must be greater than 0"));
        }

        match kind {
            DatabaseType::PostgreSQL | DatabaseType::Redshift | DatabaseType::MySQL => {
                require(self.host.as_deref(), "host", kind)?;
                require(self.user.as_deref(), "user", kind)?;
            }
            DatabaseType::Snowflake => {
                require(self.account.as_deref(), "account", kind)?;
                require(self.user.as_deref(), "user", kind)?;
                if !self.uses_external_browser() {
                    require(self.password(), "password", kind)?;
                }
            }
            DatabaseType::SQLite => {
                let has_path = self
                    .path
                    .as_ref()
                    .is_some_and(|p| !p.as_os_str().is_empty());
                if !has_path {
                    return Err(DbContextError::configuration(
                        "SQLite connections require a database file path",
                    ));
                }
            }
            DatabaseType::BigQuery => {
                if let Some(file) = &self.credentials_file
                    && file.as_os_str().is_empty()
                {
                    return Err(DbContextError::configuration(
                        "credentials_file cannot be empty",
                    ));
                }
            }
        }

        Ok(kind)
    }

}

fn require(value: Option<&str>, field: &str, kind: DatabaseType) -> Result<()> {
    if non_blank(value).is_none() {
        return Err(DbContextError::configuration(format!(
            "{} connections require '{}'",
            kind, field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_backends_require_host_and_user() {
        for tag in ["postgres", "redshift", "mysql"] {
            let config = DatabaseConfig::new(tag).with_user("u");
            assert!(config.validate().unwrap_err().is_configuration_error());

            let config = DatabaseConfig::new(tag).with_host("db").with_user("u");
            assert!(config.validate().is_ok(), "{tag} should validate");
        }
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let config = DatabaseConfig::new("postgres").with_host("   ").with_user("u");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_unknown_type_fails_before_io() {
        let err = DatabaseConfig::new("oracle").validate().unwrap_err();
        assert!(matches!(err, DbContextError::UnsupportedDatabaseType { .. }));
    }

    #[test]
    fn test_snowflake_password_unless_browser() {
        let mut config = DatabaseConfig::new("snowflake").with_user("me");
        config.account = Some("acme-xy12345".to_string());
        assert!(config.validate().is_err());

        config.authenticator = Some("ExternalBrowser".to_string());
        assert!(config.validate().is_ok());

        config.authenticator = None;
        let config = config.with_password("pw");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sqlite_requires_path() {
        assert!(DatabaseConfig::new("sqlite").validate().is_err());
        assert_eq!(
            DatabaseConfig::new("sqlite3").with_path("/tmp/x.db").validate().unwrap(),
            DatabaseType::SQLite
        );
    }

    #[test]
    fn test_port_zero_rejected() {
        let config = DatabaseConfig::new("mysql")
            .with_host("db")
            .with_user("u")
            .with_port(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_and_display_omit_credentials() {
        let config = DatabaseConfig::new("postgres")
            .with_host("example.com")
            .with_port(5432)
            .with_database("testdb")
            .with_user("testuser")
            .with_password("hunter2");

        let debug = format!("{:?}", config);
        let display = format!("{}", config);

        assert!(!debug.contains("hunter2"));
        assert!(!display.contains("hunter2"));
        assert!(!display.contains("testuser"));
        assert!(display.contains("example.com:5432/testdb"));
        assert_eq!(config.password(), Some("hunter2"));
    }
}

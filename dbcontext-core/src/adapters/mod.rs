//! Discovery traits and the factory that selects a backend adapter.
//!
//! The rest of the system only sees the three capability traits defined
//! here. All dialect knowledge (quoting, system-schema exclusion, type-name
//! normalization, connection defaults) lives in the backend modules.
//!
//! # Module Structure
//! - `config`: `DatabaseConfig`
//! - `helpers`: schema assembly and SQL fragments shared by adapters
//! - `row_decoding`: sqlx row to [`SqlValue`](crate::format::SqlValue) decoding
//! - Backend modules (postgres, redshift, mysql, sqlite, snowflake, bigquery)

use crate::Result;
use crate::models::{ColumnInfo, DatabaseType, EnrichedColumnInfo, SampleResult, SchemaInfo};
use async_trait::async_trait;

pub mod config;

pub use config::{DatabaseConfig, EXTERNAL_BROWSER_AUTHENTICATOR};

/// Lists schemas and their tables for one database connection.
///
/// # Object Safety
/// Object-safe; callers hold adapters as `Box<dyn TableDetailDiscoverer>`.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Returns every non-system schema with all of its tables.
    ///
    /// Partial results are never returned: a failing catalog query fails
    /// the whole call. Schemas without tables are included.
    ///
    /// # Errors
    /// Returns `Discovery` for catalog failures and `Timeout` when the
    /// discovery deadline expires.
    async fn discover(&self) -> Result<Vec<SchemaInfo>>;

    /// Releases the adapter's connection. Call exactly once.
    async fn close(&self) -> Result<()>;

    /// The backend this adapter talks to.
    fn database_type(&self) -> DatabaseType;
}

/// Column and sample access for individual tables.
#[async_trait]
pub trait TableDetailDiscoverer: Discoverer {
    /// Catalog columns of one table in ordinal order.
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Up to `limit` randomly chosen rows, every cell already stringified.
    async fn get_sample_rows(&self, schema: &str, table: &str, limit: u32)
    -> Result<SampleResult>;

    /// Statistical profile of one column.
    ///
    /// # Errors
    /// Always an `Enrichment` error naming the column, schema and table.
    async fn get_column_enrichment(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnInfo,
    ) -> Result<EnrichedColumnInfo>;
}

/// Lists the databases reachable through one connection.
#[async_trait]
pub trait DatabaseLister: Send + Sync {
    /// Names of the user databases visible to the connection.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Releases the adapter's connection. Call exactly once.
    async fn close(&self) -> Result<()>;
}

/// Creates the table-detail discoverer for a configuration.
///
/// The configuration is validated and the backend type resolved before any
/// connection attempt; an unknown or compiled-out backend fails fast.
///
/// # Errors
/// Returns a configuration error for invalid input, otherwise a
/// `Connection` or `Timeout` error if the backend cannot be reached.
pub async fn create_discoverer(config: &DatabaseConfig) -> Result<Box<dyn TableDetailDiscoverer>> {
    let database_type = config.validate()?;
    tracing::debug!("Creating {} discoverer for {}", database_type, config);

    match database_type {
        #[cfg(feature = "postgresql")]
        DatabaseType::PostgreSQL => Ok(Box::new(postgres::PostgresAdapter::connect(config).await?)),
        #[cfg(feature = "redshift")]
        DatabaseType::Redshift => Ok(Box::new(redshift::RedshiftAdapter::connect(config).await?)),
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => Ok(Box::new(mysql::MySqlAdapter::connect(config).await?)),
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => Ok(Box::new(sqlite::SqliteAdapter::connect(config).await?)),
        #[cfg(feature = "snowflake")]
        DatabaseType::Snowflake => {
            Ok(Box::new(snowflake::SnowflakeAdapter::connect(config).await?))
        }
        #[cfg(feature = "bigquery")]
        DatabaseType::BigQuery => Ok(Box::new(bigquery::BigQueryAdapter::connect(config).await?)),
        #[allow(unreachable_patterns)]
        other => Err(compiled_out(other)),
    }
}

/// Creates the database lister for a configuration.
///
/// # Errors
/// Same as [`create_discoverer`].
pub async fn create_database_lister(config: &DatabaseConfig) -> Result<Box<dyn DatabaseLister>> {
    let database_type = config.validate()?;
    tracing::debug!("Creating {} database lister for {}", database_type, config);

    match database_type {
        #[cfg(feature = "postgresql")]
        DatabaseType::PostgreSQL => Ok(Box::new(postgres::PostgresAdapter::connect(config).await?)),
        #[cfg(feature = "redshift")]
        DatabaseType::Redshift => Ok(Box::new(redshift::RedshiftAdapter::connect(config).await?)),
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => Ok(Box::new(mysql::MySqlAdapter::connect(config).await?)),
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => Ok(Box::new(sqlite::SqliteAdapter::connect(config).await?)),
        #[cfg(feature = "snowflake")]
        DatabaseType::Snowflake => {
            Ok(Box::new(snowflake::SnowflakeAdapter::connect(config).await?))
        }
        #[cfg(feature = "bigquery")]
        DatabaseType::BigQuery => Ok(Box::new(bigquery::BigQueryAdapter::connect(config).await?)),
        #[allow(unreachable_patterns)]
        other => Err(compiled_out(other)),
    }
}

#[allow(dead_code)]
fn compiled_out(database_type: DatabaseType) -> crate::error::DbContextError {
    crate::error::DbContextError::unsupported_feature(
        format!("{} adapter", database_type),
        format!(
            "{} (rebuild with --features {})",
            database_type,
            feature_name(database_type)
        ),
    )
}

#[allow(dead_code)]
const fn feature_name(database_type: DatabaseType) -> &'static str {
    match database_type {
        DatabaseType::PostgreSQL => "postgresql",
        DatabaseType::Redshift => "redshift",
        DatabaseType::Snowflake => "snowflake",
        DatabaseType::MySQL => "mysql",
        DatabaseType::BigQuery => "bigquery",
        DatabaseType::SQLite => "sqlite",
    }
}

// Shared helper utilities
pub mod helpers;

#[cfg(any(
    feature = "postgresql",
    feature = "redshift",
    feature = "mysql",
    feature = "sqlite"
))]
pub mod row_decoding;

// Database-specific adapter modules
#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "redshift")]
pub mod redshift;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "snowflake")]
pub mod snowflake;

#[cfg(feature = "bigquery")]
pub mod bigquery;

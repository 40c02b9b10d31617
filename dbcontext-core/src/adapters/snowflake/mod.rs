//! Snowflake adapter over the Snowflake REST API.
//!
//! # Module Structure
//! - `connection`: account URL resolution, password and external-browser login
//! - `query`: statement execution, result polling and chunk download
//! - `schema_collection`: `<database>.INFORMATION_SCHEMA` catalog queries
//! - `sampling`: `SAMPLE (n ROWS)` sampling and the column profile SQL
//!
//! The session token lives in memory only and is revoked by `close`.

pub mod connection;
pub mod query;
pub mod sampling;
pub mod schema_collection;

#[cfg(test)]
mod tests;

use super::{DatabaseLister, Discoverer, TableDetailDiscoverer};
use crate::deadline::{DISCOVERY_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use crate::models::{ColumnInfo, DatabaseType, EnrichedColumnInfo, SampleResult, SchemaInfo};
use crate::{Result, enrichment};
use async_trait::async_trait;
use query::Session;

pub use connection::{account_url, effective_authenticator};

/// Snowflake adapter over one authenticated session.
pub struct SnowflakeAdapter {
    pub(crate) session: Session,
    database: Option<String>,
}

impl SnowflakeAdapter {
    /// The database whose catalog is read.
    ///
    /// # Errors
    /// Returns a configuration error when the connection names no database.
    pub(crate) fn require_database(&self) -> Result<&str> {
        self.database.as_deref().ok_or_else(|| {
            DbContextError::configuration(
                "Snowflake discovery requires a database; set one on the connection",
            )
        })
    }
}

impl std::fmt::Debug for SnowflakeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeAdapter")
            .field("account_url", &self.session.base_url())
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Discoverer for SnowflakeAdapter {
    async fn discover(&self) -> Result<Vec<SchemaInfo>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "Snowflake discovery",
            schema_collection::discover(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Snowflake
    }
}

#[async_trait]
impl TableDetailDiscoverer for SnowflakeAdapter {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "Snowflake column listing",
            schema_collection::get_columns(self, schema, table),
        )
        .await
        .map_err(|e| DbContextError::table_failed(schema, table, "Failed to list columns", e))
    }

    async fn get_sample_rows(
        &self,
        schema: &str,
        table: &str,
        limit: u32,
    ) -> Result<SampleResult> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "Snowflake sampling",
            sampling::sample_rows(self, schema, table, limit),
        )
        .await
        .map_err(|e| DbContextError::table_failed(schema, table, "Failed to sample rows", e))
    }

    async fn get_column_enrichment(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnInfo,
    ) -> Result<EnrichedColumnInfo> {
        enrichment::profile_column(self, schema, table, column).await
    }
}

#[async_trait]
impl DatabaseLister for SnowflakeAdapter {
    async fn list_databases(&self) -> Result<Vec<String>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "Snowflake database listing",
            schema_collection::list_databases(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.session.close().await
    }
}

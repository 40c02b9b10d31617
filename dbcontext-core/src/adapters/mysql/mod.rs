//! MySQL adapter.
//!
//! MySQL has no schema level below the database, so each database is
//! reported as a schema. When the configuration names a database, discovery
//! is scoped to it.
//!
//! # Module Structure
//! - `connection`: connect options, defaulting (port 3306, `ssl-mode=PREFERRED`) and pool setup
//! - `schema_collection`: `information_schema` catalog queries
//! - `sampling`: random row sampling and the column profile SQL
//!
//! # Security Guarantees
//! - Every session runs `SET SESSION TRANSACTION READ ONLY`
//! - Passwords never appear in errors or logs

pub mod connection;
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
use sqlx::MySqlPool;

pub use connection::{effective_port, effective_ssl_mode};

/// MySQL adapter over a single pooled connection.
pub struct MySqlAdapter {
    pub(crate) pool: MySqlPool,
    /// Database discovery is scoped to, if any.
    database: Option<String>,
}

impl MySqlAdapter {
    /// The database discovery is scoped to.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

impl std::fmt::Debug for MySqlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdapter")
            .field("database", &self.database)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Discoverer for MySqlAdapter {
    async fn discover(&self) -> Result<Vec<SchemaInfo>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "MySQL discovery",
            schema_collection::discover(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }
}

#[async_trait]
impl TableDetailDiscoverer for MySqlAdapter {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "MySQL column listing",
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
            "MySQL sampling",
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
impl DatabaseLister for MySqlAdapter {
    async fn list_databases(&self) -> Result<Vec<String>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "MySQL database listing",
            schema_collection::list_databases(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

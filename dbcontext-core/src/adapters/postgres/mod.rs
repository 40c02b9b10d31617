//! PostgreSQL adapter.
//!
//! # Module Structure
//! - `connection`: connect options, defaulting (port 5432, `sslmode=disable`) and pool setup
//! - `schema_collection`: schemas from `pg_namespace`, tables from
//!   `information_schema.tables` plus `pg_matviews`, columns from `pg_attribute`
//! - `sampling`: random row sampling and the column profile SQL
//!
//! # Security Guarantees
//! - Every session runs with `default_transaction_read_only = on`
//! - Passwords never appear in errors or logs

pub mod connection;
pub mod sampling;
pub mod schema_collection;


use super::{DatabaseLister, Discoverer, TableDetailDiscoverer};
use crate::deadline::{DISCOVERY_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use crate::models::{ColumnInfo, DatabaseType, EnrichedColumnInfo, SampleResult, SchemaInfo};
use crate::{Result, enrichment};
use async_trait::async_trait;
use sqlx::PgPool;

pub use connection::{effective_database, effective_port, effective_ssl_mode};

/// PostgreSQL adapter over a single pooled connection.
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
    database: String,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("database", &self.database)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl PostgresAdapter {
    /// The database this adapter is connected to.
    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl Discoverer for PostgresAdapter {
    async fn discover(&self) -> Result<Vec<SchemaInfo>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "PostgreSQL discovery",
            schema_collection::discover(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }
}

#[async_trait]
impl TableDetailDiscoverer for PostgresAdapter {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "PostgreSQL column listing",
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
            "PostgreSQL sampling",
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
impl DatabaseLister for PostgresAdapter {
    async fn list_databases(&self) -> Result<Vec<String>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "PostgreSQL database listing",
            schema_collection::list_databases(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

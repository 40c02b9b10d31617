//! Amazon Redshift adapter.
//!
//! Redshift speaks the PostgreSQL wire protocol, so the connection runs on
//! the sqlx Postgres driver, but its catalog differs: tables come from
//! `SVV_TABLES`, materialized views from `STV_MV_INFO` and columns from
//! `SVV_COLUMNS`.
//!
//! # Module Structure
//! - `connection`: defaulting (port 5439, `sslmode=require`, database `dev`) and pool setup
//! - `schema_collection`: catalog queries
//! - `sampling`: random row sampling and the column profile SQL

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
use sqlx::PgPool;

pub use connection::{effective_database, effective_port, effective_ssl_mode};

/// Redshift adapter over a single pooled connection.
pub struct RedshiftAdapter {
    pub(crate) pool: PgPool,
    database: String,
}

impl std::fmt::Debug for RedshiftAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedshiftAdapter")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Discoverer for RedshiftAdapter {
    async fn discover(&self) -> Result<Vec<SchemaInfo>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "Redshift discovery",
            schema_collection::discover(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Redshift
    }
}

#[async_trait]
impl TableDetailDiscoverer for RedshiftAdapter {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "Redshift column listing",
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
            "Redshift sampling",
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
impl DatabaseLister for RedshiftAdapter {
    async fn list_databases(&self) -> Result<Vec<String>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "Redshift database listing",
            schema_collection::list_databases(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

//! SQLite adapter.
//!
//! # Module Structure
//! - `connection`: read-only file connection and ping
//! - `schema_collection`: tables/views via `sqlite_master`, columns via `pragma_table_info`
//! - `sampling`: random row sampling and the column profile SQL
//!
//! # SQLite-Specific Behavior
//! - A file has exactly one schema, `main`, which is always reported
//! - `sqlite_%` internal tables are excluded
//! - The database is opened read-only and never created

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
use sqlx::SqlitePool;
use std::path::PathBuf;

/// Name of the only schema a SQLite connection exposes.
pub const MAIN_SCHEMA: &str = "main";

/// SQLite adapter over a single read-only connection.
pub struct SqliteAdapter {
    pub(crate) pool: SqlitePool,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteAdapter {
    /// The database file this adapter reads.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl Discoverer for SqliteAdapter {
    async fn discover(&self) -> Result<Vec<SchemaInfo>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "SQLite discovery",
            schema_collection::discover(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }
}

#[async_trait]
impl TableDetailDiscoverer for SqliteAdapter {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "SQLite column listing",
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
            "SQLite sampling",
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
impl DatabaseLister for SqliteAdapter {
    async fn list_databases(&self) -> Result<Vec<String>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "SQLite database listing",
            schema_collection::list_databases(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

//! Google BigQuery adapter over the BigQuery REST API.
//!
//! A project plays the role of a database and its datasets the role of
//! schemas. Datasets and tables come from the REST list endpoints; columns
//! and profiles come from query jobs against `INFORMATION_SCHEMA` and the
//! tables themselves.
//!
//! # Module Structure
//! - `auth`: credential discovery and OAuth2 access tokens
//! - `client`: paginated list calls and `jobs.query` / `getQueryResults`
//! - `connection`: project resolution and connectivity check
//! - `schema_collection`: datasets, tables, columns and projects
//! - `sampling`: random row sampling and the column profile SQL

pub mod auth;
pub mod client;
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
use client::BigQueryClient;

pub use connection::resolve_project_id;

/// BigQuery adapter bound to one project.
pub struct BigQueryAdapter {
    pub(crate) client: BigQueryClient,
}

impl BigQueryAdapter {
    /// The project catalogs are read from.
    pub fn project_id(&self) -> &str {
        self.client.project_id()
    }
}

impl std::fmt::Debug for BigQueryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryAdapter")
            .field("project_id", &self.project_id())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Discoverer for BigQueryAdapter {
    async fn discover(&self) -> Result<Vec<SchemaInfo>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "BigQuery discovery",
            schema_collection::discover(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("Closing BigQuery client for {}", self.project_id());
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::BigQuery
    }
}

#[async_trait]
impl TableDetailDiscoverer for BigQueryAdapter {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        with_deadline(
            TABLE_DETAIL_TIMEOUT,
            "BigQuery column listing",
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
            "BigQuery sampling",
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
impl DatabaseLister for BigQueryAdapter {
    async fn list_databases(&self) -> Result<Vec<String>> {
        with_deadline(
            DISCOVERY_TIMEOUT,
            "BigQuery project listing",
            schema_collection::list_databases(self),
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

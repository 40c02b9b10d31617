//! PostgreSQL row sampling and column profile SQL.
//!
//! Every sampled cell is cast to `text` at the source, which covers arrays,
//! JSON, numerics and extension types alike.

use super::PostgresAdapter;
use super::schema_collection::get_columns;
use crate::Result;
use crate::adapters::helpers::{distinct_values_query, stats_query};
use crate::adapters::row_decoding::{decode_cell, decode_row, format_row};
use crate::enrichment::{MAX_SAMPLE_VALUE_LENGTH, ProfileSource};
use crate::error::DbContextError;
use crate::format::{SqlValue, quote_double};
use crate::models::{ColumnInfo, SampleResult};
use async_trait::async_trait;

pub(crate) fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_double(schema), quote_double(table))
}

/// Builds the random sample query for the given columns.
pub(crate) fn sample_query(schema: &str, table: &str, columns: &[ColumnInfo]) -> String {
    let select_list = columns
        .iter()
        .map(|c| {
            let col = quote_double(&c.name);
            format!("{col}::text AS {col}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} ORDER BY RANDOM() LIMIT $1",
        select_list,
        qualified(schema, table)
    )
}

/// Samples up to `limit` random rows of a relation.
pub(crate) async fn sample_rows(
    adapter: &PostgresAdapter,
    schema: &str,
    table: &str,
    limit: u32,
) -> Result<SampleResult> {
    let columns = get_columns(adapter, schema, table).await?;
    if columns.is_empty() {
        return Ok(SampleResult::default());
    }

    let rows = sqlx::query(&sample_query(schema, table, &columns))
        .bind(i64::from(limit))
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::query_failed("Failed to sample rows", e))?;

    let formatted = rows.iter().map(format_row).collect::<Result<Vec<_>>>()?;
    tracing::debug!("Sampled {} rows from {}.{}", formatted.len(), schema, table);

    Ok(SampleResult {
        columns: columns.into_iter().map(|c| c.name).collect(),
        rows: formatted,
    })
}

#[async_trait]
impl ProfileSource for PostgresAdapter {
    fn stats_sql(&self, schema: &str, table: &str, column: &ColumnInfo) -> String {
        let col = quote_double(&column.name);
        stats_query(&col, &format!("{col}::text"), &qualified(schema, table))
    }

    fn sample_values_sql(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnInfo,
        limit: usize,
    ) -> String {
        let col = quote_double(&column.name);
        distinct_values_query(
            &col,
            &format!("LEFT({col}::text, {})", MAX_SAMPLE_VALUE_LENGTH + 1),
            &qualified(schema, table),
            limit,
        )
    }

    async fn fetch_row(&self, sql: &str) -> Result<Vec<SqlValue>> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbContextError::query_failed("Column stats query failed", e))?;
        decode_row(&row)
    }

    async fn fetch_column(&self, sql: &str) -> Result<Vec<SqlValue>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbContextError::query_failed("Column sample query failed", e))?;
        rows.iter().map(|row| decode_cell(row, 0)).collect()
    }
}

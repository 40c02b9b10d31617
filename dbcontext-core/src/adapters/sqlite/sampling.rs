//! SQLite row sampling and column profile SQL.
//!
//! SQLite values carry their own storage class, so sample cells are decoded
//! as-is without casts.

use super::SqliteAdapter;
use super::schema_collection::get_columns;
use crate::Result;
use crate::adapters::helpers::{distinct_values_query, stats_query};
use crate::adapters::row_decoding::{decode_row, format_row};
use crate::enrichment::{MAX_SAMPLE_VALUE_LENGTH, ProfileSource};
use crate::error::DbContextError;
use crate::format::{SqlValue, quote_double};
use crate::models::{ColumnInfo, SampleResult};
use async_trait::async_trait;

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_double(schema), quote_double(table))
}

/// Samples up to `limit` random rows of a table.
pub(crate) async fn sample_rows(
    adapter: &SqliteAdapter,
    schema: &str,
    table: &str,
    limit: u32,
) -> Result<SampleResult> {
    let columns = get_columns(adapter, schema, table).await?;
    if columns.is_empty() {
        return Ok(SampleResult::default());
    }

    let select_list = columns
        .iter()
        .map(|c| quote_double(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "SELECT {} FROM {} ORDER BY RANDOM() LIMIT ?1",
        select_list,
        qualified(schema, table)
    );

    let rows = sqlx::query(&query)
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
impl ProfileSource for SqliteAdapter {
    fn stats_sql(&self, schema: &str, table: &str, column: &ColumnInfo) -> String {
        let col = quote_double(&column.name);
        stats_query(
            &col,
            &format!("CAST({col} AS TEXT)"),
            &qualified(schema, table),
        )
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
            &format!("SUBSTR(CAST({col} AS TEXT), 1, {})", MAX_SAMPLE_VALUE_LENGTH + 1),
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
        rows.iter()
            .map(|row| crate::adapters::row_decoding::decode_cell(row, 0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_escaping() {
        assert_eq!(qualified("main", "my\"table"), "\"main\".\"my\"\"table\"");
    }
}

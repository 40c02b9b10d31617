//! MySQL row sampling and column profile SQL.

use super::MySqlAdapter;
use super::schema_collection::get_columns;
use crate::Result;
use crate::adapters::helpers::{distinct_values_query, stats_query};
use crate::adapters::row_decoding::decode_cell;
use crate::enrichment::{MAX_SAMPLE_VALUE_LENGTH, ProfileSource};
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value, quote_backtick};
use crate::models::{ColumnInfo, SampleResult};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::MySqlRow;

pub(crate) fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_backtick(schema), quote_backtick(table))
}

fn text_expr(column: &str) -> String {
    format!("CAST({} AS CHAR)", quote_backtick(column))
}

/// Decodes a cell, falling back to `u64` for `BIGINT UNSIGNED` results that
/// do not fit the signed chain.
pub(crate) fn decode_mysql_cell(row: &MySqlRow, index: usize) -> Result<SqlValue> {
    decode_cell(row, index).or_else(|e| {
        row.try_get::<u64, _>(index)
            .map(SqlValue::UInt)
            .map_err(|_| e)
    })
}

/// Builds the random-sample query for the given columns.
pub(crate) fn sample_query(schema: &str, table: &str, columns: &[ColumnInfo]) -> String {
    let select_list = columns
        .iter()
        .map(|c| format!("{} AS {}", text_expr(&c.name), quote_backtick(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} ORDER BY RAND() LIMIT ?",
        select_list,
        qualified(schema, table)
    )
}

/// Samples up to `limit` random rows of a relation.
pub(crate) async fn sample_rows(
    adapter: &MySqlAdapter,
    schema: &str,
    table: &str,
    limit: u32,
) -> Result<SampleResult> {
    let columns = get_columns(adapter, schema, table).await?;
    if columns.is_empty() {
        return Ok(SampleResult::default());
    }

    let rows = sqlx::query(&sample_query(schema, table, &columns))
        .bind(limit)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::query_failed("Failed to sample rows", e))?;

    let mut formatted = Vec::with_capacity(rows.len());
    for row in &rows {
        let cells = (0..row.len())
            .map(|i| decode_mysql_cell(row, i).map(|v| format_value(&v)))
            .collect::<Result<Vec<_>>>()?;
        formatted.push(cells);
    }
    tracing::debug!("Sampled {} rows from {}.{}", formatted.len(), schema, table);

    Ok(SampleResult {
        columns: columns.into_iter().map(|c| c.name).collect(),
        rows: formatted,
    })
}

#[async_trait]
impl ProfileSource for MySqlAdapter {
    fn stats_sql(&self, schema: &str, table: &str, column: &ColumnInfo) -> String {
        stats_query(
            &quote_backtick(&column.name),
            &text_expr(&column.name),
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
        distinct_values_query(
            &quote_backtick(&column.name),
            &format!(
                "LEFT({}, {})",
                text_expr(&column.name),
                MAX_SAMPLE_VALUE_LENGTH + 1
            ),
            &qualified(schema, table),
            limit,
        )
    }

    async fn fetch_row(&self, sql: &str) -> Result<Vec<SqlValue>> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbContextError::query_failed("Column stats query failed", e))?;
        (0..row.len()).map(|i| decode_mysql_cell(&row, i)).collect()
    }

    async fn fetch_column(&self, sql: &str) -> Result<Vec<SqlValue>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbContextError::query_failed("Column sample query failed", e))?;
        rows.iter().map(|row| decode_mysql_cell(row, 0)).collect()
    }
}

//! BigQuery row sampling and column profile SQL.

use super::BigQueryAdapter;
use super::schema_collection::get_columns;
use crate::Result;
use crate::adapters::helpers::{distinct_values_query, stats_query};
use crate::enrichment::{MAX_SAMPLE_VALUE_LENGTH, ProfileSource};
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value, quote_backtick};
use crate::models::{ColumnInfo, SampleResult};
use async_trait::async_trait;

pub(crate) fn qualified(project: &str, dataset: &str, table: &str) -> String {
    format!(
        "{}.{}.{}",
        quote_backtick(project),
        quote_backtick(dataset),
        quote_backtick(table)
    )
}

/// Text rendering of a column.
///
/// Nested and JSON types go through `TO_JSON_STRING`, geography through
/// WKT and bytes through base64, since `CAST(.. AS STRING)` rejects them.
pub(crate) fn text_expr(column: &ColumnInfo) -> String {
    let col = quote_backtick(&column.name);
    let data_type = column.data_type.trim().to_uppercase();
    if ["ARRAY", "STRUCT", "JSON", "RANGE"]
        .iter()
        .any(|prefix| data_type.starts_with(prefix))
    {
        format!("TO_JSON_STRING({col})")
    } else if data_type == "GEOGRAPHY" {
        format!("ST_ASTEXT({col})")
    } else if data_type.starts_with("BYTES") {
        format!("TO_BASE64({col})")
    } else {
        format!("CAST({col} AS STRING)")
    }
}

/// Builds the random-sample query.
pub(crate) fn sample_query(
    project: &str,
    dataset: &str,
    table: &str,
    columns: &[ColumnInfo],
    limit: u32,
) -> String {
    let select_list = columns
        .iter()
        .map(|c| format!("{} AS {}", text_expr(c), quote_backtick(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} ORDER BY RAND() LIMIT {}",
        select_list,
        qualified(project, dataset, table),
        limit
    )
}

/// Samples up to `limit` random rows of a table.
pub(crate) async fn sample_rows(
    adapter: &BigQueryAdapter,
    dataset: &str,
    table: &str,
    limit: u32,
) -> Result<SampleResult> {
    let columns = get_columns(adapter, dataset, table).await?;
    if columns.is_empty() {
        return Ok(SampleResult::default());
    }

    let sql = sample_query(adapter.project_id(), dataset, table, &columns, limit);
    let result = adapter.client.query(&sql, Vec::new()).await?;
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();
    tracing::debug!("Sampled {} rows from {}.{}", rows.len(), dataset, table);

    Ok(SampleResult {
        columns: columns.into_iter().map(|c| c.name).collect(),
        rows,
    })
}

#[async_trait]
impl ProfileSource for BigQueryAdapter {
    fn stats_sql(&self, dataset: &str, table: &str, column: &ColumnInfo) -> String {
        stats_query(
            &quote_backtick(&column.name),
            &text_expr(column),
            &qualified(self.project_id(), dataset, table),
        )
    }

    fn sample_values_sql(
        &self,
        dataset: &str,
        table: &str,
        column: &ColumnInfo,
        limit: usize,
    ) -> String {
        distinct_values_query(
            &quote_backtick(&column.name),
            &format!("SUBSTR({}, 1, {})", text_expr(column), MAX_SAMPLE_VALUE_LENGTH + 1),
            &qualified(self.project_id(), dataset, table),
            limit,
        )
    }

    async fn fetch_row(&self, sql: &str) -> Result<Vec<SqlValue>> {
        self.client
            .query(sql, Vec::new())
            .await?
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| DbContextError::parse("Column stats query returned no rows"))
    }

    async fn fetch_column(&self, sql: &str) -> Result<Vec<SqlValue>> {
        Ok(self
            .client
            .query(sql, Vec::new())
            .await?
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }
}

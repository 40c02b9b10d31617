//! Snowflake row sampling and column profile SQL.

use super::SnowflakeAdapter;
use super::schema_collection::get_columns;
use crate::Result;
use crate::adapters::helpers::{distinct_values_query, stats_query};
use crate::enrichment::{MAX_SAMPLE_VALUE_LENGTH, ProfileSource};
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value, quote_double};
use crate::models::{ColumnInfo, SampleResult};
use async_trait::async_trait;

pub(crate) fn qualified(database: &str, schema: &str, table: &str) -> String {
    format!(
        "{}.{}.{}",
        quote_double(database),
        quote_double(schema),
        quote_double(table)
    )
}

fn text_expr(column: &str) -> String {
    format!("TO_VARCHAR({})", quote_double(column))
}

/// Builds the sample query. `SAMPLE (n ROWS)` picks rows at random.
pub(crate) fn sample_query(
    database: &str,
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    limit: u32,
) -> String {
    let select_list = columns
        .iter()
        .map(|c| format!("{} AS {}", text_expr(&c.name), quote_double(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} SAMPLE ({} ROWS)",
        select_list,
        qualified(database, schema, table),
        limit
    )
}

/// Samples up to `limit` random rows of a relation.
pub(crate) async fn sample_rows(
    adapter: &SnowflakeAdapter,
    schema: &str,
    table: &str,
    limit: u32,
) -> Result<SampleResult> {
    let database = adapter.require_database()?;
    let columns = get_columns(adapter, schema, table).await?;
    if columns.is_empty() {
        return Ok(SampleResult::default());
    }

    let result = adapter
        .session
        .execute(&sample_query(database, schema, table, &columns, limit), &[])
        .await?;
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();
    tracing::debug!("Sampled {} rows from {}.{}", rows.len(), schema, table);

    Ok(SampleResult {
        columns: columns.into_iter().map(|c| c.name).collect(),
        rows,
    })
}

#[async_trait]
impl ProfileSource for SnowflakeAdapter {
    fn stats_sql(&self, schema: &str, table: &str, column: &ColumnInfo) -> String {
        let database = self.database.as_deref().unwrap_or_default();
        stats_query(
            &quote_double(&column.name),
            &text_expr(&column.name),
            &qualified(database, schema, table),
        )
    }

    fn sample_values_sql(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnInfo,
        limit: usize,
    ) -> String {
        let database = self.database.as_deref().unwrap_or_default();
        distinct_values_query(
            &quote_double(&column.name),
            &format!(
                "LEFT({}, {})",
                text_expr(&column.name),
                MAX_SAMPLE_VALUE_LENGTH + 1
            ),
            &qualified(database, schema, table),
            limit,
        )
    }

    async fn fetch_row(&self, sql: &str) -> Result<Vec<SqlValue>> {
        self.require_database()?;
        self.session
            .execute(sql, &[])
            .await?
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| DbContextError::parse("Column stats query returned no rows"))
    }

    async fn fetch_column(&self, sql: &str) -> Result<Vec<SqlValue>> {
        self.require_database()?;
        Ok(self
            .session
            .execute(sql, &[])
            .await?
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }
}

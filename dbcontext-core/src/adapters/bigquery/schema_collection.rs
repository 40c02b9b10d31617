//! BigQuery catalog access.

use super::BigQueryAdapter;
use super::client::{API_BASE, string_parameter};
use crate::Result;
use crate::adapters::helpers::assemble_schemas;
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value, parse_count, quote_backtick};
use crate::models::{ColumnInfo, SchemaInfo, TableInfo};
use serde_json::Value as JsonValue;

/// Prefixes of the hidden datasets BigQuery creates for sessions and scripts.
const HIDDEN_DATASET_PREFIXES: [&str; 2] = ["_session", "_script"];

/// Whether a dataset is one of BigQuery's hidden session/script datasets.
pub(crate) fn is_hidden_dataset(dataset: &str) -> bool {
    let lower = dataset.to_lowercase();
    HIDDEN_DATASET_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

fn reference_id(item: &JsonValue, reference: &str, id: &str) -> Option<String> {
    item.get(reference)?
        .get(id)?
        .as_str()
        .map(str::to_string)
}

pub(crate) fn columns_query(project: &str, dataset: &str) -> String {
    format!(
        "SELECT column_name, data_type, is_nullable, ordinal_position, column_default \
         FROM {}.{}.INFORMATION_SCHEMA.COLUMNS \
         WHERE table_name = @table_name ORDER BY ordinal_position",
        quote_backtick(project),
        quote_backtick(dataset)
    )
}

/// Lists datasets with their tables.
pub(crate) async fn discover(adapter: &BigQueryAdapter) -> Result<Vec<SchemaInfo>> {
    let start_time = std::time::Instant::now();
    let project = adapter.project_id();
    let fail = |context: String| {
        move |e: DbContextError| DbContextError::discovery_failed("BigQuery", context, e)
    };

    let datasets: Vec<String> = adapter
        .client
        .list_all(
            &format!("{}/projects/{}/datasets", API_BASE, project),
            "datasets",
        )
        .await
        .map_err(fail("Failed to list datasets".to_string()))?
        .iter()
        .filter_map(|item| reference_id(item, "datasetReference", "datasetId"))
        .filter(|dataset| !is_hidden_dataset(dataset))
        .collect();

    let mut tables = Vec::new();
    for dataset in &datasets {
        let items = adapter
            .client
            .list_all(
                &format!("{}/projects/{}/datasets/{}/tables", API_BASE, project, dataset),
                "tables",
            )
            .await
            .map_err(fail(format!("Failed to list tables of dataset {}", dataset)))?;
        for item in &items {
            let Some(name) = reference_id(item, "tableReference", "tableId") else {
                continue;
            };
            let table_type = item.get("type").and_then(JsonValue::as_str).unwrap_or("TABLE");
            tables.push((dataset.clone(), TableInfo::new(name, table_type)));
        }
    }

    let schemas = assemble_schemas(datasets, tables);
    tracing::info!(
        "BigQuery discovery of {} completed in {:.2}s - found {} datasets, {} tables",
        project,
        start_time.elapsed().as_secs_f64(),
        schemas.len(),
        schemas.iter().map(|s| s.tables.len()).sum::<usize>()
    );
    Ok(schemas)
}

fn text(value: Option<&SqlValue>) -> Result<String> {
    match value {
        Some(SqlValue::Null) | None => Err(DbContextError::parse(
            "BigQuery catalog row is missing a column",
        )),
        Some(other) => Ok(format_value(other)),
    }
}

/// Columns of one table in ordinal order.
///
/// BigQuery reports a missing default as the literal string `NULL`.
pub(crate) async fn get_columns(
    adapter: &BigQueryAdapter,
    dataset: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let result = adapter
        .client
        .query(
            &columns_query(adapter.project_id(), dataset),
            vec![string_parameter("table_name", table)],
        )
        .await?;

    result
        .rows
        .iter()
        .map(|row| {
            let column_default = match row.get(4) {
                None | Some(SqlValue::Null) => None,
                Some(value) => Some(format_value(value)).filter(|d| d != "NULL"),
            };
            Ok(ColumnInfo {
                name: text(row.first())?,
                data_type: text(row.get(1))?,
                is_nullable: text(row.get(2))?,
                ordinal_position: parse_count(row.get(3).unwrap_or(&SqlValue::Null))?,
                column_default,
            })
        })
        .collect()
}

/// Projects visible to the credentials.
pub(crate) async fn list_databases(adapter: &BigQueryAdapter) -> Result<Vec<String>> {
    let mut projects: Vec<String> = adapter
        .client
        .list_all(&format!("{}/projects", API_BASE), "projects")
        .await
        .map_err(|e| DbContextError::discovery_failed("BigQuery", "Failed to list projects", e))?
        .iter()
        .filter_map(|item| reference_id(item, "projectReference", "projectId"))
        .collect();
    projects.sort();
    projects.dedup();
    Ok(projects)
}

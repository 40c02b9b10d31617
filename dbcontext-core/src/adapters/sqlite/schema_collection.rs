//! SQLite catalog queries.
//!
//! # SQLite System Tables
//! - `sqlite_master`: tables and views
//! - `pragma_table_info(table, schema)`: columns of one table
//! - `PRAGMA database_list`: attached databases

use super::{MAIN_SCHEMA, SqliteAdapter};
use crate::Result;
use crate::adapters::helpers::assemble_schemas;
use crate::error::DbContextError;
use crate::models::{ColumnInfo, SchemaInfo, TableInfo, nullable_flag};
use sqlx::Row;

/// Lists tables and views of the `main` schema.
pub(crate) async fn discover(adapter: &SqliteAdapter) -> Result<Vec<SchemaInfo>> {
    let start_time = std::time::Instant::now();

    let tables_query = r"
        SELECT name, type
        FROM sqlite_master
        WHERE type IN ('table', 'view')
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
    ";

    let rows = sqlx::query(tables_query)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::discovery_failed("SQLite", "Failed to enumerate tables", e))?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.try_get("name").map_err(|e| {
            DbContextError::discovery_failed("SQLite", "Failed to parse table name", e)
        })?;
        let kind: String = row.try_get("type").map_err(|e| {
            DbContextError::discovery_failed("SQLite", "Failed to parse table type", e)
        })?;
        tables.push((MAIN_SCHEMA.to_string(), TableInfo::new(name, &kind)));
    }

    let schemas = assemble_schemas([MAIN_SCHEMA.to_string()], tables);
    tracing::info!(
        "SQLite discovery completed in {:.2}s - found {} tables",
        start_time.elapsed().as_secs_f64(),
        schemas.iter().map(|s| s.tables.len()).sum::<usize>()
    );
    Ok(schemas)
}

/// Columns of one table in declaration order.
pub(crate) async fn get_columns(
    adapter: &SqliteAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let query = r#"
        SELECT cid, name, type, "notnull" AS not_null, dflt_value
        FROM pragma_table_info(?1, ?2)
        ORDER BY cid
    "#;

    let rows = sqlx::query(query)
        .bind(table)
        .bind(schema)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::query_failed("Failed to read pragma_table_info", e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let cid: i64 = row
            .try_get("cid")
            .map_err(|e| DbContextError::query_failed("Failed to parse column id", e))?;
        let not_null: i64 = row
            .try_get("not_null")
            .map_err(|e| DbContextError::query_failed("Failed to parse notnull flag", e))?;
        columns.push(ColumnInfo {
            name: row
                .try_get("name")
                .map_err(|e| DbContextError::query_failed("Failed to parse column name", e))?,
            data_type: row
                .try_get::<Option<String>, _>("type")
                .map_err(|e| DbContextError::query_failed("Failed to parse column type", e))?
                .unwrap_or_default(),
            is_nullable: nullable_flag(not_null == 0),
            ordinal_position: cid + 1,
            column_default: row
                .try_get("dflt_value")
                .map_err(|e| DbContextError::query_failed("Failed to parse column default", e))?,
        });
    }

    tracing::debug!("Found {} columns in {}.{}", columns.len(), schema, table);
    Ok(columns)
}

/// Names of the databases attached to the connection (normally just `main`).
pub(crate) async fn list_databases(adapter: &SqliteAdapter) -> Result<Vec<String>> {
    let rows = sqlx::query("PRAGMA database_list")
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::discovery_failed("SQLite", "Failed to list databases", e))?;

    let mut names = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.try_get("name").map_err(|e| {
            DbContextError::discovery_failed("SQLite", "Failed to parse database name", e)
        })?;
        if name != "temp" {
            names.push(name);
        }
    }
    Ok(names)
}

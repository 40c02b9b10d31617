//! MySQL catalog queries against `information_schema`.
//!
//! Catalog columns are `CAST(.. AS CHAR)` because MySQL 8 reports several of
//! them with a binary collation, which sqlx refuses to decode as `String`.

use super::MySqlAdapter;
use crate::Result;
use crate::adapters::helpers::assemble_schemas;
use crate::error::DbContextError;
use crate::models::{ColumnInfo, SchemaInfo, TableInfo};
use sqlx::Row;

const SCHEMAS_QUERY: &str = r"
    SELECT CAST(SCHEMA_NAME AS CHAR) AS schema_name
    FROM information_schema.SCHEMATA
    WHERE SCHEMA_NAME NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
      AND (? IS NULL OR SCHEMA_NAME = ?)
    ORDER BY 1
";

const TABLES_QUERY: &str = r"
    SELECT CAST(TABLE_SCHEMA AS CHAR) AS schema_name,
           CAST(TABLE_NAME AS CHAR) AS table_name,
           CAST(TABLE_TYPE AS CHAR) AS table_type
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
      AND (? IS NULL OR TABLE_SCHEMA = ?)
    ORDER BY 1, 2
";

const COLUMNS_QUERY: &str = r"
    SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
           CAST(COLUMN_TYPE AS CHAR) AS data_type,
           CAST(IS_NULLABLE AS CHAR) AS is_nullable,
           CAST(ORDINAL_POSITION AS SIGNED) AS ordinal_position,
           CAST(COLUMN_DEFAULT AS CHAR) AS column_default
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = ?
      AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
";

/// Lists databases (as schemas) with their tables and views.
pub(crate) async fn discover(adapter: &MySqlAdapter) -> Result<Vec<SchemaInfo>> {
    let start_time = std::time::Instant::now();
    let scope = adapter.database();
    let fail = |context: &'static str| {
        move |e: sqlx::Error| DbContextError::discovery_failed("MySQL", context, e)
    };

    let schema_names = sqlx::query(SCHEMAS_QUERY)
        .bind(scope)
        .bind(scope)
        .fetch_all(&adapter.pool)
        .await
        .map_err(fail("Failed to enumerate schemas"))?
        .iter()
        .map(|row| row.try_get::<String, _>("schema_name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(fail("Failed to parse schema name"))?;

    let tables = sqlx::query(TABLES_QUERY)
        .bind(scope)
        .bind(scope)
        .fetch_all(&adapter.pool)
        .await
        .map_err(fail("Failed to enumerate tables"))?
        .iter()
        .map(|row| {
            let schema: String = row.try_get("schema_name")?;
            let name: String = row.try_get("table_name")?;
            let table_type: String = row.try_get("table_type")?;
            Ok((schema, TableInfo::new(name, &table_type)))
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(fail("Failed to parse table row"))?;

    let schemas = assemble_schemas(schema_names, tables);
    tracing::info!(
        "MySQL discovery completed in {:.2}s - found {} schemas, {} tables",
        start_time.elapsed().as_secs_f64(),
        schemas.len(),
        schemas.iter().map(|s| s.tables.len()).sum::<usize>()
    );
    Ok(schemas)
}

/// Columns of one relation in ordinal order.
///
/// `data_type` is the full `COLUMN_TYPE`, e.g. `varchar(255)` or
/// `int unsigned`.
pub(crate) async fn get_columns(
    adapter: &MySqlAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(schema)
        .bind(table)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::query_failed("Failed to query information_schema.COLUMNS", e))?;

    rows.iter()
        .map(|row| {
            Ok(ColumnInfo {
                name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                is_nullable: row.try_get("is_nullable")?,
                ordinal_position: row.try_get("ordinal_position")?,
                column_default: row.try_get("column_default")?,
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| DbContextError::query_failed("Failed to parse column row", e))
}

/// User databases on the server, ignoring any configured scope.
pub(crate) async fn list_databases(adapter: &MySqlAdapter) -> Result<Vec<String>> {
    sqlx::query(SCHEMAS_QUERY)
        .bind(Option::<&str>::None)
        .bind(Option::<&str>::None)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::discovery_failed("MySQL", "Failed to list databases", e))?
        .iter()
        .map(|row| row.try_get::<String, _>("schema_name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DbContextError::discovery_failed("MySQL", "Failed to parse database name", e))
}

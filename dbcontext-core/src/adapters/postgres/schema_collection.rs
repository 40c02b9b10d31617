//! PostgreSQL catalog queries.
//!
//! Every catalog column is cast to `text`/`int8` in SQL: the
//! `information_schema` domains do not decode as Rust strings.

use super::PostgresAdapter;
use crate::Result;
use crate::adapters::helpers::assemble_schemas;
use crate::error::DbContextError;
use crate::models::{ColumnInfo, SchemaInfo, TableInfo};
use sqlx::Row;

const SCHEMAS_QUERY: &str = r"
    SELECT nspname::text AS schema_name
    FROM pg_catalog.pg_namespace
    WHERE nspname NOT IN ('information_schema', 'pg_catalog')
      AND nspname NOT LIKE 'pg_toast%'
      AND nspname NOT LIKE 'pg_temp%'
    ORDER BY nspname
";

const TABLES_QUERY: &str = r"
    SELECT table_schema::text AS schema_name,
           table_name::text AS table_name,
           table_type::text AS table_type
    FROM information_schema.tables
    WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
      AND table_schema NOT LIKE 'pg_toast%'
      AND table_schema NOT LIKE 'pg_temp%'
    UNION ALL
    SELECT schemaname::text, matviewname::text, 'MATERIALIZED VIEW'
    FROM pg_catalog.pg_matviews
    WHERE schemaname NOT IN ('information_schema', 'pg_catalog')
    ORDER BY 1, 2
";

const COLUMNS_QUERY: &str = r"
    SELECT a.attname::text AS column_name,
           pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
           CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS is_nullable,
           a.attnum::int8 AS ordinal_position,
           pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE n.nspname::text = $1
      AND c.relname::text = $2
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
";

const DATABASES_QUERY: &str = r"
    SELECT datname::text AS database_name
    FROM pg_catalog.pg_database
    WHERE NOT datistemplate AND datallowconn
    ORDER BY datname
";

/// Lists every non-system schema with its tables, views and materialized views.
pub(crate) async fn discover(adapter: &PostgresAdapter) -> Result<Vec<SchemaInfo>> {
    let start_time = std::time::Instant::now();

    let schema_rows = sqlx::query(SCHEMAS_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| {
            DbContextError::discovery_failed("PostgreSQL", "Failed to enumerate schemas", e)
        })?;
    let schema_names = schema_rows
        .iter()
        .map(|row| row.try_get::<String, _>("schema_name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            DbContextError::discovery_failed("PostgreSQL", "Failed to parse schema name", e)
        })?;

    let table_rows = sqlx::query(TABLES_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| {
            DbContextError::discovery_failed("PostgreSQL", "Failed to enumerate tables", e)
        })?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for row in &table_rows {
        let (schema, name, table_type) = parse_table_row(row).map_err(|e| {
            DbContextError::discovery_failed("PostgreSQL", "Failed to parse table row", e)
        })?;
        tables.push((schema, TableInfo::new(name, &table_type)));
    }

    let schemas = assemble_schemas(schema_names, tables);
    tracing::info!(
        "PostgreSQL discovery of {} completed in {:.2}s - found {} schemas, {} tables",
        adapter.database,
        start_time.elapsed().as_secs_f64(),
        schemas.len(),
        schemas.iter().map(|s| s.tables.len()).sum::<usize>()
    );
    Ok(schemas)
}

fn parse_table_row(
    row: &sqlx::postgres::PgRow,
) -> std::result::Result<(String, String, String), sqlx::Error> {
    Ok((row.try_get(0)?, row.try_get(1)?, row.try_get(2)?))
}

/// Columns of one relation in `attnum` order.
pub(crate) async fn get_columns(
    adapter: &PostgresAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(schema)
        .bind(table)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::query_failed("Failed to query pg_attribute", e))?;

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

/// Databases that accept connections, excluding templates.
pub(crate) async fn list_databases(adapter: &PostgresAdapter) -> Result<Vec<String>> {
    let rows = sqlx::query(DATABASES_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| {
            DbContextError::discovery_failed("PostgreSQL", "Failed to list databases", e)
        })?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("database_name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DbContextError::discovery_failed("PostgreSQL", "Failed to parse database name", e))
}

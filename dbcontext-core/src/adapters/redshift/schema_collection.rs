//! Redshift catalog queries.
//!
//! `SVV_TABLES` reports materialized views as plain views; they are
//! re-labelled from `STV_MV_INFO`.

use super::RedshiftAdapter;
use crate::Result;
use crate::adapters::helpers::assemble_schemas;
use crate::error::DbContextError;
use crate::models::{ColumnInfo, SchemaInfo, TABLE_TYPE_MATERIALIZED_VIEW, TableInfo};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::collections::HashSet;

const SCHEMAS_QUERY: &str = r"
    SELECT nspname::varchar AS schema_name
    FROM pg_catalog.pg_namespace
    WHERE nspname NOT IN ('information_schema', 'catalog_history')
      AND LEFT(nspname, 3) <> 'pg_'
    ORDER BY 1
";

const TABLES_QUERY: &str = r"
    SELECT table_schema::varchar AS schema_name,
           table_name::varchar AS table_name,
           table_type::varchar AS table_type
    FROM svv_tables
    WHERE table_catalog = current_database()
      AND table_schema NOT IN ('information_schema', 'catalog_history')
      AND LEFT(table_schema, 3) <> 'pg_'
    ORDER BY 1, 2
";

const MATVIEWS_QUERY: &str = r"
    SELECT TRIM(schema)::varchar AS schema_name,
           TRIM(name)::varchar AS table_name
    FROM stv_mv_info
    WHERE TRIM(db_name) = current_database()
";

const COLUMNS_QUERY: &str = r"
    SELECT column_name::varchar AS column_name,
           data_type::varchar AS data_type,
           is_nullable::varchar AS is_nullable,
           ordinal_position::bigint AS ordinal_position,
           column_default::varchar(4096) AS column_default
    FROM svv_columns
    WHERE table_schema = $1
      AND table_name = $2
    ORDER BY ordinal_position
";

const DATABASES_QUERY: &str = r"
    SELECT datname::varchar AS database_name
    FROM pg_catalog.pg_database
    WHERE datname NOT IN ('padb_harvest', 'template0', 'template1')
    ORDER BY 1
";

fn string_pair(row: &PgRow) -> std::result::Result<(String, String), sqlx::Error> {
    Ok((row.try_get("schema_name")?, row.try_get("table_name")?))
}

/// Lists every non-system schema with its tables and views.
pub(crate) async fn discover(adapter: &RedshiftAdapter) -> Result<Vec<SchemaInfo>> {
    let start_time = std::time::Instant::now();
    let fail = |context: &'static str| {
        move |e: sqlx::Error| DbContextError::discovery_failed("Redshift", context, e)
    };

    let schema_names = sqlx::query(SCHEMAS_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(fail("Failed to enumerate schemas"))?
        .iter()
        .map(|row| row.try_get::<String, _>("schema_name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(fail("Failed to parse schema name"))?;

    let matviews: HashSet<(String, String)> = sqlx::query(MATVIEWS_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(fail("Failed to enumerate materialized views"))?
        .iter()
        .map(string_pair)
        .collect::<std::result::Result<_, _>>()
        .map_err(fail("Failed to parse materialized view"))?;

    let table_rows = sqlx::query(TABLES_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(fail("Failed to enumerate tables"))?;

    let mut seen = HashSet::new();
    let mut tables = Vec::with_capacity(table_rows.len());
    for row in &table_rows {
        let key = string_pair(row).map_err(fail("Failed to parse table row"))?;
        let table_type: String = row
            .try_get("table_type")
            .map_err(fail("Failed to parse table type"))?;
        let table_type = if matviews.contains(&key) {
            TABLE_TYPE_MATERIALIZED_VIEW.to_string()
        } else {
            table_type
        };
        tables.push((key.0.clone(), TableInfo::new(key.1.clone(), &table_type)));
        seen.insert(key);
    }
    for key in matviews.difference(&seen) {
        tables.push((
            key.0.clone(),
            TableInfo::new(key.1.clone(), TABLE_TYPE_MATERIALIZED_VIEW),
        ));
    }

    let schemas = assemble_schemas(schema_names, tables);
    tracing::info!(
        "Redshift discovery of {} completed in {:.2}s - found {} schemas, {} tables",
        adapter.database,
        start_time.elapsed().as_secs_f64(),
        schemas.len(),
        schemas.iter().map(|s| s.tables.len()).sum::<usize>()
    );
    Ok(schemas)
}

/// Columns of one relation in ordinal order.
pub(crate) async fn get_columns(
    adapter: &RedshiftAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(schema)
        .bind(table)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::query_failed("Failed to query svv_columns", e))?;

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

/// Databases on the cluster.
pub(crate) async fn list_databases(adapter: &RedshiftAdapter) -> Result<Vec<String>> {
    sqlx::query(DATABASES_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| DbContextError::discovery_failed("Redshift", "Failed to list databases", e))?
        .iter()
        .map(|row| row.try_get::<String, _>("database_name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DbContextError::discovery_failed("Redshift", "Failed to parse database name", e))
}

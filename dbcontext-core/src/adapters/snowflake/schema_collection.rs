//! Snowflake catalog queries against `<database>.INFORMATION_SCHEMA`.

use super::SnowflakeAdapter;
use crate::Result;
use crate::adapters::helpers::assemble_schemas;
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value, parse_count, quote_double};
use crate::models::{ColumnInfo, SchemaInfo, TableInfo};

const DATABASES_QUERY: &str =
    "SELECT DATABASE_NAME FROM SNOWFLAKE.INFORMATION_SCHEMA.DATABASES ORDER BY 1";

pub(crate) fn schemas_query(database: &str) -> String {
    format!(
        "SELECT SCHEMA_NAME FROM {}.INFORMATION_SCHEMA.SCHEMATA \
         WHERE SCHEMA_NAME <> 'INFORMATION_SCHEMA' ORDER BY 1",
        quote_double(database)
    )
}

pub(crate) fn tables_query(database: &str) -> String {
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM {}.INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA <> 'INFORMATION_SCHEMA' ORDER BY 1, 2",
        quote_double(database)
    )
}

pub(crate) fn columns_query(database: &str) -> String {
    format!(
        "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, ORDINAL_POSITION, COLUMN_DEFAULT \
         FROM {}.INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
        quote_double(database)
    )
}

fn text(value: Option<&SqlValue>) -> Result<String> {
    match value {
        Some(SqlValue::Text(s)) => Ok(s.clone()),
        Some(other) => Ok(format_value(other)),
        None => Err(DbContextError::parse("Snowflake catalog row is missing a column")),
    }
}

fn optional_text(value: Option<&SqlValue>) -> Option<String> {
    match value {
        None | Some(SqlValue::Null) => None,
        Some(other) => Some(format_value(other)),
    }
}

/// Lists every schema of the configured database with its tables.
pub(crate) async fn discover(adapter: &SnowflakeAdapter) -> Result<Vec<SchemaInfo>> {
    let start_time = std::time::Instant::now();
    let database = adapter.require_database()?;
    let fail = |context: &'static str| {
        move |e: DbContextError| DbContextError::discovery_failed("Snowflake", context, e)
    };

    let schema_names = adapter
        .session
        .execute(&schemas_query(database), &[])
        .await
        .map_err(fail("Failed to enumerate schemas"))?
        .rows
        .iter()
        .map(|row| text(row.first()))
        .collect::<Result<Vec<_>>>()
        .map_err(fail("Failed to parse schema name"))?;

    let tables = adapter
        .session
        .execute(&tables_query(database), &[])
        .await
        .map_err(fail("Failed to enumerate tables"))?
        .rows
        .iter()
        .map(|row| {
            let schema = text(row.first())?;
            let name = text(row.get(1))?;
            let table_type = text(row.get(2))?;
            Ok((schema, TableInfo::new(name, &table_type)))
        })
        .collect::<Result<Vec<_>>>()
        .map_err(fail("Failed to parse table row"))?;

    let schemas = assemble_schemas(schema_names, tables);
    tracing::info!(
        "Snowflake discovery of {} completed in {:.2}s - found {} schemas, {} tables",
        database,
        start_time.elapsed().as_secs_f64(),
        schemas.len(),
        schemas.iter().map(|s| s.tables.len()).sum::<usize>()
    );
    Ok(schemas)
}

/// Columns of one relation in ordinal order.
pub(crate) async fn get_columns(
    adapter: &SnowflakeAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let database = adapter.require_database()?;
    let result = adapter
        .session
        .execute(&columns_query(database), &[schema, table])
        .await?;

    result
        .rows
        .iter()
        .map(|row| {
            Ok(ColumnInfo {
                name: text(row.first())?,
                data_type: text(row.get(1))?,
                is_nullable: text(row.get(2))?,
                ordinal_position: parse_count(row.get(3).unwrap_or(&SqlValue::Null))?,
                column_default: optional_text(row.get(4)),
            })
        })
        .collect()
}

/// Databases visible to the session's role.
pub(crate) async fn list_databases(adapter: &SnowflakeAdapter) -> Result<Vec<String>> {
    adapter
        .session
        .execute(DATABASES_QUERY, &[])
        .await
        .map_err(|e| DbContextError::discovery_failed("Snowflake", "Failed to list databases", e))?
        .rows
        .iter()
        .map(|row| text(row.first()))
        .collect()
}

//! Serializable shapes of the context documents and their header comments.
//!
//! Every YAML document is written as a `#` comment header followed by the
//! body, so an agent reading a single file knows what each field means.

use crate::Result;
use crate::error::DbContextError;
use crate::models::{ColumnInfo, EnrichedColumnInfo};
use serde::{Deserialize, Serialize};

pub(crate) const DATABASES_HEADER: &str = "\
# Databases reachable through this connection.
#
# connection:        name of the saved connection
# database_type:     backend (postgres, redshift, snowflake, mysql, bigquery, sqlite)
# default_database:  database used when none is selected explicitly; kept across updates
# generated_at:      UTC time this file was last written
# databases:         one entry per database; each has a schemas/ directory below
#                    databases/<name>/ once it has been discovered
";

pub(crate) const SCHEMAS_HEADER: &str = "\
# Schemas of one database.
#
# table_count:       base tables, external tables and snapshots in the schema
# view_count:        views and materialized views in the schema
# ai_description:    left blank for an AI-written summary of the schema
# db_description:    left blank for a human-written description of the schema
#
# Each schema has a directory next to this file holding _tables.yml.
";

pub(crate) const TABLES_HEADER: &str = "\
# Tables and views of one schema.
#
# table_type:        BASE TABLE, VIEW, MATERIALIZED VIEW, EXTERNAL TABLE, SNAPSHOT, ...
# ai_description:    left blank for an AI-written summary of the table
# db_description:    left blank for a human-written description of the table
#
# Each table has a directory next to this file holding <table>__columns.yml
# and, when rows were sampled, <table>__sample.xml.
";

pub(crate) const COLUMNS_HEADER: &str = "\
# Columns of one table, in catalog (ordinal) order.
#
# data_type:         type as reported by the database catalog
# is_nullable:       YES or NO, as reported by the catalog
# ordinal_position:  1-based position of the column in the table
# column_default:    default expression, absent when the column has none
";

pub(crate) const ENRICHED_COLUMNS_HEADER: &str = "\
# Columns of one table with statistical profiles, in catalog (ordinal) order.
#
# data_type:                   type as reported by the database catalog
# is_nullable:                 YES or NO, as reported by the catalog
# ordinal_position:            1-based position of the column in the table
# column_default:              default expression, absent when the column has none
# ai_description:              left blank for an AI-written summary of the column
# db_description:              left blank for a human-written description of the column
# total_rows:                  rows in the table when profiled
# null_count / non_null_count: rows where the column is / is not NULL
# distinct_non_null_count:     distinct non-NULL values
# *_pct:                       percentages in [0, 100], rounded to 4 decimals
# sample_values:               up to 5 distinct values, trimmed and cut to 100 characters
#                              (\"...\" marks a cut); empty for vector columns
";

/// `_databases.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabasesFile {
    pub connection: String,
    pub database_type: String,
    pub default_database: String,
    pub generated_at: String,
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
}

/// One entry of `_databases.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,
}

/// `_schemas.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemasFile {
    pub connection: String,
    pub database: String,
    pub database_type: String,
    pub generated_at: String,
    pub schema_count: usize,
    pub schemas: Vec<SchemaEntry>,
}

/// One entry of `_schemas.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    pub table_count: usize,
    pub view_count: usize,
    pub ai_description: String,
    pub db_description: String,
}

/// `_tables.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablesFile {
    pub connection: String,
    pub database: String,
    pub database_type: String,
    pub schema: String,
    pub generated_at: String,
    pub table_count: usize,
    pub view_count: usize,
    pub tables: Vec<TableEntry>,
}

/// One entry of `_tables.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub table_type: String,
    pub ai_description: String,
    pub db_description: String,
}

/// `<table>__columns.yml` before profiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnsFile {
    pub connection: String,
    pub database: String,
    pub database_type: String,
    pub schema: String,
    pub table: String,
    pub generated_at: String,
    pub column_count: usize,
    pub columns: Vec<ColumnInfo>,
}

/// `<table>__columns.yml` after profiling; replaces [`ColumnsFile`] in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedColumnsFile {
    pub connection: String,
    pub database: String,
    pub database_type: String,
    pub schema: String,
    pub table: String,
    pub generated_at: String,
    pub enriched: bool,
    pub column_count: usize,
    pub columns: Vec<EnrichedColumnInfo>,
}

/// Serializes a document behind its header comment.
pub(crate) fn render_yaml<T: Serialize>(header: &str, document: &T) -> Result<String> {
    let body = serde_yaml::to_string(document)
        .map_err(|e| DbContextError::serialization("Failed to serialize context document", e))?;
    Ok(format!("{}\n{}", header, body))
}

//! Core data models for discovery results.
//!
//! All models are plain values produced fresh by each discovery call. None
//! of them carry credentials.

use serde::{Deserialize, Serialize};

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    Redshift,
    Snowflake,
    MySQL,
    BigQuery,
    SQLite,
}

impl DatabaseType {
    /// Every supported backend, in display order.
    pub const ALL: [DatabaseType; 6] = [
        DatabaseType::PostgreSQL,
        DatabaseType::Redshift,
        DatabaseType::Snowflake,
        DatabaseType::MySQL,
        DatabaseType::BigQuery,
        DatabaseType::SQLite,
    ];

    /// Canonical lower-case tag used in configuration and context files.
    pub fn tag(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSQL => "postgres",
            DatabaseType::Redshift => "redshift",
            DatabaseType::Snowflake => "snowflake",
            DatabaseType::MySQL => "mysql",
            DatabaseType::BigQuery => "bigquery",
            DatabaseType::SQLite => "sqlite",
        }
    }

    /// Whether table-detail generation needs an explicit default database.
    ///
    /// SQLite has no meaningful database concept and tolerates the sentinel.
    pub fn requires_explicit_database(&self) -> bool {
        !matches!(self, DatabaseType::SQLite)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::Redshift => write!(f, "Redshift"),
            DatabaseType::Snowflake => write!(f, "Snowflake"),
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::BigQuery => write!(f, "BigQuery"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = crate::error::DbContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::PostgreSQL),
            "redshift" => Ok(DatabaseType::Redshift),
            "snowflake" => Ok(DatabaseType::Snowflake),
            "mysql" => Ok(DatabaseType::MySQL),
            "bigquery" | "bq" => Ok(DatabaseType::BigQuery),
            "sqlite" | "sqlite3" => Ok(DatabaseType::SQLite),
            _ => Err(crate::error::DbContextError::UnsupportedDatabaseType {
                database_type: s.to_string(),
                supported: DatabaseType::ALL
                    .iter()
                    .map(DatabaseType::tag)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Canonical table type for ordinary tables.
pub const TABLE_TYPE_BASE_TABLE: &str = "BASE TABLE";
/// Canonical table type for views.
pub const TABLE_TYPE_VIEW: &str = "VIEW";
/// Canonical table type for materialized views.
pub const TABLE_TYPE_MATERIALIZED_VIEW: &str = "MATERIALIZED VIEW";
/// Canonical table type for external tables.
pub const TABLE_TYPE_EXTERNAL_TABLE: &str = "EXTERNAL TABLE";
/// Canonical table type for foreign tables.
pub const TABLE_TYPE_FOREIGN_TABLE: &str = "FOREIGN TABLE";
/// Canonical table type for snapshots.
pub const TABLE_TYPE_SNAPSHOT: &str = "SNAPSHOT";

/// Normalizes a catalog table type into its upper-case canonical name.
///
/// Backends report the same concept under different spellings
/// (`TABLE`, `table`, `MATERIALIZED_VIEW`, `EXTERNAL`, `FOREIGN`). Unknown
/// types are upper-cased with underscores turned into spaces.
pub fn normalize_table_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase().replace('_', " ");
    match upper.as_str() {
        "TABLE" | "BASE TABLE" => TABLE_TYPE_BASE_TABLE.to_string(),
        "VIEW" => TABLE_TYPE_VIEW.to_string(),
        "MATERIALIZED VIEW" => TABLE_TYPE_MATERIALIZED_VIEW.to_string(),
        "EXTERNAL" | "EXTERNAL TABLE" => TABLE_TYPE_EXTERNAL_TABLE.to_string(),
        "FOREIGN" | "FOREIGN TABLE" => TABLE_TYPE_FOREIGN_TABLE.to_string(),
        "SNAPSHOT" => TABLE_TYPE_SNAPSHOT.to_string(),
        _ => upper,
    }
}

/// A non-system namespace and the tables it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub tables: Vec<TableInfo>,
}

impl SchemaInfo {
    /// Creates an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }
}

/// A table-like object inside a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub table_type: String,
}

impl TableInfo {
    /// Creates a table entry, normalizing the table type.
    pub fn new(name: impl Into<String>, table_type: &str) -> Self {
        Self {
            name: name.into(),
            table_type: normalize_table_type(table_type),
        }
    }

    /// Whether this entry is a view of any kind.
    pub fn is_view(&self) -> bool {
        self.table_type.contains(TABLE_TYPE_VIEW)
    }
}

/// Catalog metadata for one column.
///
/// `ordinal_position` (1-based) and `is_nullable` (`YES`/`NO`) are copied
/// verbatim from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: String,
    pub ordinal_position: i64,
    pub column_default: Option<String>,
}

/// Converts a boolean nullability flag into the catalog's `YES`/`NO` form.
pub fn nullable_flag(nullable: bool) -> String {
    if nullable { "YES" } else { "NO" }.to_string()
}

/// A column together with its statistical profile.
///
/// Computed once per column per run and always written as a full
/// replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedColumnInfo {
    #[serde(flatten)]
    pub column: ColumnInfo,
    pub ai_description: String,
    pub db_description: String,
    pub total_rows: i64,
    pub null_count: i64,
    pub non_null_count: i64,
    pub distinct_non_null_count: i64,
    pub distinct_of_non_null_pct: f64,
    pub null_of_total_rows_pct: f64,
    pub non_null_of_total_rows_pct: f64,
    pub sample_values: Vec<String>,
}

/// Pre-stringified sample rows. Row order is undefined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SampleResult {
    /// Whether the sample holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_database_type_aliases() {
        assert_eq!(
            DatabaseType::from_str("postgresql").unwrap(),
            DatabaseType::PostgreSQL
        );
        assert_eq!(DatabaseType::from_str("PG").unwrap(), DatabaseType::PostgreSQL);
        assert_eq!(DatabaseType::from_str("bq").unwrap(), DatabaseType::BigQuery);
        assert_eq!(DatabaseType::from_str(" SQLite3 ").unwrap(), DatabaseType::SQLite);
    }

    #[test]
    fn test_unknown_database_type_lists_supported() {
        let err = DatabaseType::from_str("oracle").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("oracle"));
        assert!(message.contains("snowflake"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_tag_round_trips_through_from_str() {
        for db_type in DatabaseType::ALL {
            assert_eq!(DatabaseType::from_str(db_type.tag()).unwrap(), db_type);
        }
    }

    #[test]
    fn test_normalize_table_type() {
        assert_eq!(normalize_table_type("table"), TABLE_TYPE_BASE_TABLE);
        assert_eq!(normalize_table_type("BASE TABLE"), TABLE_TYPE_BASE_TABLE);
        assert_eq!(normalize_table_type("MATERIALIZED_VIEW"), TABLE_TYPE_MATERIALIZED_VIEW);
        assert_eq!(normalize_table_type("EXTERNAL"), TABLE_TYPE_EXTERNAL_TABLE);
        assert_eq!(normalize_table_type("FOREIGN"), TABLE_TYPE_FOREIGN_TABLE);
        assert_eq!(normalize_table_type("snapshot"), TABLE_TYPE_SNAPSHOT);
        assert_eq!(normalize_table_type("event_table"), "EVENT TABLE");
    }

    #[test]
    fn test_is_view() {
        assert!(TableInfo::new("v", "VIEW").is_view());
        assert!(TableInfo::new("mv", "materialized view").is_view());
        assert!(!TableInfo::new("t", "BASE TABLE").is_view());
    }

    #[test]
    fn test_sqlite_tolerates_sentinel_database() {
        assert!(!DatabaseType::SQLite.requires_explicit_database());
        assert!(DatabaseType::PostgreSQL.requires_explicit_database());
        assert!(DatabaseType::BigQuery.requires_explicit_database());
    }
}

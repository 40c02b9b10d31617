//! Unit tests for the SQLite adapter against temporary database files.

use crate::adapters::{DatabaseConfig, DatabaseLister, Discoverer, TableDetailDiscoverer};
use crate::enrichment::ProfileSource;
use crate::models::DatabaseType;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

use super::{MAIN_SCHEMA, SqliteAdapter};

// =============================================================================
// Fixtures
// =============================================================================

async fn create_database(statements: &[&str]) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("fixture.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("create fixture database");
    for statement in statements {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("fixture statement");
    }
    pool.close().await;
    (dir, path)
}

async fn open(path: &std::path::Path) -> SqliteAdapter {
    SqliteAdapter::connect(&DatabaseConfig::new("sqlite").with_path(path))
        .await
        .expect("open adapter")
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_missing_file_is_connection_error() {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig::new("sqlite").with_path(dir.path().join("absent.db"));
    let err = SqliteAdapter::connect(&config).await.unwrap_err();
    assert!(!err.is_configuration_error());
    assert!(!dir.path().join("absent.db").exists());
}

#[tokio::test]
async fn test_connection_is_read_only() {
    let (_dir, path) = create_database(&["CREATE TABLE t (id INTEGER)"]).await;
    let adapter = open(&path).await;

    let result = sqlx::query("INSERT INTO t VALUES (1)")
        .execute(&adapter.pool)
        .await;
    assert!(result.is_err());
    assert_eq!(adapter.database_type(), DatabaseType::SQLite);
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_discover_reports_tables_and_views_in_main() {
    let (_dir, path) = create_database(&[
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER)",
        "CREATE VIEW active_users AS SELECT * FROM users",
    ])
    .await;
    let adapter = open(&path).await;

    let schemas = adapter.discover().await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, MAIN_SCHEMA);

    let names: Vec<_> = schemas[0].tables.iter().map(|t| t.name.as_str()).collect();
    // sqlite_sequence is created by AUTOINCREMENT and must be hidden
    assert_eq!(names, vec!["active_users", "orders", "users"]);
    assert_eq!(schemas[0].tables[0].table_type, "VIEW");
    assert_eq!(schemas[0].tables[2].table_type, "BASE TABLE");

    Discoverer::close(&adapter).await.unwrap();
}

#[tokio::test]
async fn test_empty_database_still_has_main_schema() {
    let (_dir, path) = create_database(&[]).await;
    let adapter = open(&path).await;

    let schemas = adapter.discover().await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert!(schemas[0].tables.is_empty());
}

#[tokio::test]
async fn test_list_databases() {
    let (_dir, path) = create_database(&[]).await;
    let adapter = open(&path).await;
    assert_eq!(adapter.list_databases().await.unwrap(), vec!["main"]);
    DatabaseLister::close(&adapter).await.unwrap();
}

// =============================================================================
// Table detail
// =============================================================================

#[tokio::test]
async fn test_columns_follow_declaration_order() {
    let (_dir, path) = create_database(&[
        "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL DEFAULT 'x', price REAL)",
    ])
    .await;
    let adapter = open(&path).await;

    let columns = adapter.get_columns(MAIN_SCHEMA, "items").await.unwrap();
    let ordinals: Vec<_> = columns.iter().map(|c| c.ordinal_position).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    assert_eq!(columns[1].name, "label");
    assert_eq!(columns[1].data_type, "TEXT");
    assert_eq!(columns[1].is_nullable, "NO");
    assert_eq!(columns[1].column_default.as_deref(), Some("'x'"));
    assert_eq!(columns[2].is_nullable, "YES");
}

#[tokio::test]
async fn test_sample_rows_are_stringified() {
    let (_dir, path) = create_database(&[
        "CREATE TABLE mixed (n INTEGER, f REAL, t TEXT, b BLOB)",
        "INSERT INTO mixed VALUES (1, 2.5, 'hello', X'FF00')",
        "INSERT INTO mixed VALUES (NULL, NULL, NULL, NULL)",
    ])
    .await;
    let adapter = open(&path).await;

    let sample = adapter.get_sample_rows(MAIN_SCHEMA, "mixed", 10).await.unwrap();
    assert_eq!(sample.columns, vec!["n", "f", "t", "b"]);
    assert_eq!(sample.rows.len(), 2);
    assert!(sample.rows.contains(&vec![
        "1".to_string(),
        "2.5".to_string(),
        "hello".to_string(),
        "base64:/wA=".to_string(),
    ]));
    assert!(sample.rows.contains(&vec!["NULL".to_string(); 4]));
}

#[tokio::test]
async fn test_sample_limit_is_respected() {
    let (_dir, path) = create_database(&[
        "CREATE TABLE numbers (n INTEGER)",
        "WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 50) \
         INSERT INTO numbers SELECT x FROM seq",
    ])
    .await;
    let adapter = open(&path).await;

    let sample = adapter.get_sample_rows(MAIN_SCHEMA, "numbers", 7).await.unwrap();
    assert_eq!(sample.rows.len(), 7);
}

#[tokio::test]
async fn test_unknown_table_sample_is_empty() {
    let (_dir, path) = create_database(&[]).await;
    let adapter = open(&path).await;

    let sample = adapter.get_sample_rows(MAIN_SCHEMA, "missing", 5).await.unwrap();
    assert!(sample.is_empty());
    assert!(sample.columns.is_empty());
}

#[tokio::test]
async fn test_profile_sql_uses_double_quotes() {
    let (_dir, path) = create_database(&[]).await;
    let adapter = open(&path).await;
    let column = crate::models::ColumnInfo {
        name: "we\"ird".to_string(),
        data_type: "TEXT".to_string(),
        is_nullable: "YES".to_string(),
        ordinal_position: 1,
        column_default: None,
    };

    let sql = adapter.stats_sql(MAIN_SCHEMA, "t", &column);
    assert!(sql.contains("COUNT(DISTINCT CAST(\"we\"\"ird\" AS TEXT))"));
    assert!(sql.ends_with("FROM \"main\".\"t\""));

    let sql = adapter.sample_values_sql(MAIN_SCHEMA, "t", &column, 20);
    assert!(sql.contains("SUBSTR(CAST(\"we\"\"ird\" AS TEXT), 1, 101)"));
    assert!(sql.ends_with("LIMIT 20"));
}

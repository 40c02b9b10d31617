//! Unit tests for the Redshift adapter.

use super::connection::{connect_options, effective_database, effective_port, effective_ssl_mode};
use super::sampling::text_expr;
use crate::adapters::DatabaseConfig;
use crate::enrichment::ProfileSource;
use crate::models::ColumnInfo;

fn column(name: &str, data_type: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: "YES".to_string(),
        ordinal_position: 1,
        column_default: None,
    }
}

#[test]
fn test_redshift_defaults() {
    let config = DatabaseConfig::new("redshift")
        .with_host("cluster.example.com")
        .with_user("awsuser");
    assert_eq!(effective_port(&config), 5439);
    assert_eq!(effective_ssl_mode(&config), "require");
    assert_eq!(effective_database(&config), "dev");
    assert!(connect_options(&config).is_ok());
}

#[test]
fn test_ssl_mode_override() {
    let mut config = DatabaseConfig::new("redshift")
        .with_host("cluster.example.com")
        .with_user("awsuser");
    config.ssl_mode = Some("verify-full".to_string());
    assert_eq!(effective_ssl_mode(&config), "verify-full");

    config.ssl_mode = Some("bogus".to_string());
    assert!(connect_options(&config).unwrap_err().is_configuration_error());
}

#[test]
fn test_text_expr_per_type() {
    assert_eq!(
        text_expr(&column("payload", "SUPER")),
        "JSON_SERIALIZE(\"payload\")"
    );
    assert_eq!(text_expr(&column("shape", "geometry")), "ST_AsEWKT(\"shape\")");
    assert_eq!(
        text_expr(&column("id", "integer")),
        "CAST(\"id\" AS VARCHAR(65535))"
    );
}

#[tokio::test]
async fn test_profile_sql_is_built_without_connecting() {
    // ProfileSource SQL builders never touch the pool
    let options = connect_options(
        &DatabaseConfig::new("redshift")
            .with_host("127.0.0.1")
            .with_user("u"),
    )
    .unwrap();
    let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy_with(options);
    let adapter = super::RedshiftAdapter {
        pool,
        database: "dev".to_string(),
    };

    let sql = adapter.stats_sql("public", "events", &column("payload", "super"));
    assert!(sql.contains("COUNT(DISTINCT JSON_SERIALIZE(\"payload\"))"));

    let sql = adapter.sample_values_sql("public", "events", &column("id", "bigint"), 20);
    assert!(sql.contains("LEFT(CAST(\"id\" AS VARCHAR(65535)), 101)"));
    assert!(sql.contains("FROM \"public\".\"events\""));
}

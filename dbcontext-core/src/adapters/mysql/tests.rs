//! Unit tests for the MySQL adapter.
//!
//! Live-server coverage is in `tests/mysql_integration.rs`.

use super::connection::{connect_options, effective_port, effective_ssl_mode};
use super::sampling::{qualified, sample_query};
use crate::adapters::DatabaseConfig;
use crate::models::ColumnInfo;

fn config() -> DatabaseConfig {
    DatabaseConfig::new("mysql")
        .with_host("db.example.com")
        .with_user("reader")
}

#[test]
fn test_mysql_defaults() {
    let config = config();
    assert_eq!(effective_port(&config), 3306);
    assert_eq!(effective_ssl_mode(&config), "PREFERRED");
    assert!(connect_options(&config).is_ok());
}

#[test]
fn test_ssl_mode_spellings() {
    let mut config = config();
    config.ssl_mode = Some("verify-identity".to_string());
    assert_eq!(effective_ssl_mode(&config), "VERIFY_IDENTITY");
    assert!(connect_options(&config).is_ok());

    config.ssl_mode = Some("required".to_string());
    assert!(connect_options(&config).is_ok());

    config.ssl_mode = Some("sometimes".to_string());
    let err = connect_options(&config).unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("SOMETIMES"));
}

#[test]
fn test_backtick_quoting() {
    assert_eq!(qualified("shop", "order`items"), "`shop`.`order``items`");
}

#[test]
fn test_sample_query_casts_every_column() {
    let columns = vec![
        ColumnInfo {
            name: "id".to_string(),
            data_type: "int unsigned".to_string(),
            is_nullable: "NO".to_string(),
            ordinal_position: 1,
            column_default: None,
        },
        ColumnInfo {
            name: "body".to_string(),
            data_type: "json".to_string(),
            is_nullable: "YES".to_string(),
            ordinal_position: 2,
            column_default: None,
        },
    ];
    assert_eq!(
        sample_query("shop", "orders", &columns),
        "SELECT CAST(`id` AS CHAR) AS `id`, CAST(`body` AS CHAR) AS `body` \
         FROM `shop`.`orders` ORDER BY RAND() LIMIT ?"
    );
}

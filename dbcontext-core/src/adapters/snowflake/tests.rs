//! Unit tests for the Snowflake adapter. None of them reach the network.

use super::SnowflakeAdapter;
use super::connection::{account_name, account_url, effective_authenticator, extract_token};
use super::query::{ApiResponse, QueryData, Session, bindings_json, parse_chunk};
use super::sampling::sample_query;
use super::schema_collection::{columns_query, schemas_query};
use crate::adapters::DatabaseConfig;
use crate::enrichment::ProfileSource;
use crate::models::ColumnInfo;
use serde_json::json;
use zeroize::Zeroizing;

fn config(account: &str) -> DatabaseConfig {
    let mut config = DatabaseConfig::new("snowflake").with_user("analyst");
    config.account = Some(account.to_string());
    config
}

fn adapter(database: Option<&str>) -> SnowflakeAdapter {
    SnowflakeAdapter {
        session: Session::new(
            reqwest::Client::new(),
            "https://acme.snowflakecomputing.com".to_string(),
            Zeroizing::new("token".to_string()),
        ),
        database: database.map(str::to_string),
    }
}

fn column(name: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: "TEXT".to_string(),
        is_nullable: "YES".to_string(),
        ordinal_position: 1,
        column_default: None,
    }
}

#[test]
fn test_account_url_resolution() {
    assert_eq!(
        account_url(&config("xy12345.eu-west-1")),
        "https://xy12345.eu-west-1.snowflakecomputing.com"
    );
    assert_eq!(
        account_url(&config("xy12345.snowflakecomputing.com")),
        "https://xy12345.snowflakecomputing.com"
    );

    let privatelink = config("xy12345").with_host("https://xy12345.privatelink.snowflakecomputing.com/");
    assert_eq!(
        account_url(&privatelink),
        "https://xy12345.privatelink.snowflakecomputing.com"
    );
    assert_eq!(
        account_url(&config("xy12345").with_port(8443)),
        "https://xy12345.snowflakecomputing.com:8443"
    );
}

#[test]
fn test_account_name_strips_region() {
    assert_eq!(account_name(&config("xy12345.eu-west-1.aws")), "XY12345");
}

#[test]
fn test_authenticator_defaults_to_password() {
    let mut config = config("acme");
    assert_eq!(effective_authenticator(&config), "snowflake");
    assert!(!config.uses_external_browser());

    config.authenticator = Some("ExternalBrowser".to_string());
    assert_eq!(effective_authenticator(&config), "externalbrowser");
    assert!(config.uses_external_browser());
}

#[test]
fn test_extract_token_from_redirect() {
    let get = "GET /?token=abc%2B123&confirm=true HTTP/1.1\r\nHost: localhost\r\n\r\n";
    assert_eq!(extract_token(get).as_deref(), Some("abc+123"));

    let post = "POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\ntoken=xyz";
    assert_eq!(extract_token(post).as_deref(), Some("xyz"));

    let favicon = "GET /favicon.ico HTTP/1.1\r\n\r\n";
    assert_eq!(extract_token(favicon), None);
}

#[test]
fn test_bindings_are_one_based_text() {
    assert_eq!(
        bindings_json(&["PUBLIC", "ORDERS"]),
        json!({
            "1": { "type": "TEXT", "value": "PUBLIC" },
            "2": { "type": "TEXT", "value": "ORDERS" },
        })
    );
}

#[test]
fn test_parse_chunk_without_brackets() {
    let rows = parse_chunk(r#"["1","a"],["2",null]"#).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1], serde_json::Value::Null);
    assert!(parse_chunk("  ").unwrap().is_empty());
    assert!(parse_chunk("not json").is_err());
}

#[test]
fn test_api_response_error_carries_code() {
    let response: ApiResponse<QueryData> = serde_json::from_value(json!({
        "data": null,
        "code": "390100",
        "message": "Incorrect username or password was specified.",
        "success": false,
    }))
    .unwrap();
    let err = response.into_data().unwrap_err();
    assert_eq!(err.code, "390100");
    assert!(err.to_string().contains("Incorrect username"));
}

#[test]
fn test_api_response_without_data_field() {
    #[derive(Debug, serde::Deserialize)]
    struct Token {
        token: String,
    }

    let response: ApiResponse<Token> = serde_json::from_value(json!({
        "code": "390318",
        "message": "OAuth access token expired.",
        "success": true,
    }))
    .unwrap();
    let err = response.into_data().unwrap_err();
    assert_eq!(err.code, "390318");

    let response: ApiResponse<Token> = serde_json::from_value(json!({
        "data": { "token": "abc" },
        "success": true,
    }))
    .unwrap();
    assert_eq!(response.into_data().unwrap().token, "abc");
}

#[test]
fn test_query_data_parses_rowset() {
    let response: ApiResponse<QueryData> = serde_json::from_value(json!({
        "data": {
            "rowtype": [{ "name": "SCHEMA_NAME", "type": "text" }],
            "rowset": [["PUBLIC"], ["STAGING"]],
            "queryId": "01b2",
        },
        "code": null,
        "message": null,
        "success": true,
    }))
    .unwrap();
    let data = response.into_data().unwrap();
    assert_eq!(data.rowtype[0].name, "SCHEMA_NAME");
    assert_eq!(data.rowset.len(), 2);
    assert!(data.chunks.is_empty());
}

#[test]
fn test_catalog_queries_are_database_scoped() {
    assert!(schemas_query("ANALYTICS").contains("\"ANALYTICS\".INFORMATION_SCHEMA.SCHEMATA"));
    let sql = columns_query("ANALYTICS");
    assert!(sql.contains("TABLE_SCHEMA = ? AND TABLE_NAME = ?"));
    assert!(sql.ends_with("ORDER BY ORDINAL_POSITION"));
}

#[test]
fn test_sample_query_uses_row_sampling() {
    assert_eq!(
        sample_query("DB", "PUBLIC", "ORDERS", &[column("ID"), column("NOTE")], 10),
        "SELECT TO_VARCHAR(\"ID\") AS \"ID\", TO_VARCHAR(\"NOTE\") AS \"NOTE\" \
         FROM \"DB\".\"PUBLIC\".\"ORDERS\" SAMPLE (10 ROWS)"
    );
}

#[test]
fn test_profile_sql_is_fully_qualified() {
    let adapter = adapter(Some("DB"));
    let sql = adapter.stats_sql("PUBLIC", "ORDERS", &column("NOTE"));
    assert!(sql.contains("COUNT(DISTINCT TO_VARCHAR(\"NOTE\"))"));
    assert!(sql.contains("FROM \"DB\".\"PUBLIC\".\"ORDERS\""));

    let sql = adapter.sample_values_sql("PUBLIC", "ORDERS", &column("NOTE"), 20);
    assert!(sql.contains("LEFT(TO_VARCHAR(\"NOTE\"), 101)"));
    assert!(sql.ends_with("LIMIT 20"));
}

#[tokio::test]
async fn test_discovery_without_database_is_configuration_error() {
    let adapter = adapter(None);
    let err = adapter.require_database().unwrap_err();
    assert!(err.is_configuration_error());

    let err = adapter.fetch_row("SELECT 1").await.unwrap_err();
    assert!(err.is_configuration_error());
}

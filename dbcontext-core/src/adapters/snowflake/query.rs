//! Statement execution over the Snowflake REST query API.
//!
//! Small results come back inline in `rowset`. Larger ones are split into
//! chunks that are downloaded separately; long-running statements answer
//! with an in-progress code and are polled through `getResultUrl`. Every
//! cell arrives as a JSON string or null.

use crate::Result;
use crate::error::DbContextError;
use crate::format::SqlValue;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use zeroize::Zeroizing;

/// Codes Snowflake returns while a statement is still executing.
const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Error reported by the Snowflake API inside an otherwise successful response.
#[derive(Debug, thiserror::Error)]
#[error("Snowflake error {code}: {message}")]
pub struct SnowflakeApiError {
    /// Snowflake error code, empty when the response carried none.
    pub code: String,
    /// Server-provided message.
    pub message: String,
}

/// Envelope shared by every Snowflake REST response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: bool,
}

impl<T> ApiResponse<T> {
    fn error(&self) -> SnowflakeApiError {
        SnowflakeApiError {
            code: self.code.clone().unwrap_or_default(),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| "request was not successful".to_string()),
        }
    }

    fn in_progress(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| QUERY_IN_PROGRESS_CODES.contains(&code))
    }

    /// The payload of a successful response.
    pub(crate) fn into_data(self) -> std::result::Result<T, SnowflakeApiError> {
        if !self.success {
            return Err(self.error());
        }
        let error = self.error();
        self.data.ok_or(error)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RowType {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Chunk {
    pub url: String,
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct QueryData {
    pub rowtype: Vec<RowType>,
    pub rowset: Vec<Vec<JsonValue>>,
    pub chunks: Vec<Chunk>,
    pub chunk_headers: HashMap<String, String>,
    pub qrmk: Option<String>,
    pub get_result_url: Option<String>,
    pub query_id: Option<String>,
}

/// Rows of a finished statement.
#[derive(Debug, Default)]
pub(crate) struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// An authenticated Snowflake session.
pub(crate) struct Session {
    http: reqwest::Client,
    base_url: String,
    token: Zeroizing<String>,
    sequence: AtomicU64,
}

impl Session {
    pub(crate) fn new(http: reqwest::Client, base_url: String, token: Zeroizing<String>) -> Self {
        Self {
            http,
            base_url,
            token,
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token.as_str())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<ApiResponse<T>> {
        request
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .header(reqwest::header::ACCEPT, "application/snowflake")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DbContextError::query_failed(context.to_string(), e))?
            .json()
            .await
            .map_err(|e| DbContextError::query_failed(format!("{}: invalid response", context), e))
    }

    /// Runs one statement with positional text bindings and returns every row.
    pub(crate) async fn execute(&self, sql: &str, bindings: &[&str]) -> Result<QueryResult> {
        let sequence_id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let body = json!({
            "sqlText": sql,
            "asyncExec": false,
            "sequenceId": sequence_id,
            "querySubmissionTime": chrono::Utc::now().timestamp_millis(),
            "bindings": bindings_json(bindings),
        });
        tracing::debug!("Snowflake query #{}: {}", sequence_id, sql);

        let request = self
            .http
            .post(format!("{}/queries/v1/query-request", self.base_url))
            .query(&[("requestId", uuid::Uuid::new_v4().to_string())])
            .json(&body);
        let mut response: ApiResponse<QueryData> = self.send(request, "Snowflake query").await?;

        while response.in_progress() {
            let result_url = response
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    DbContextError::parse("Snowflake query in progress without a result URL")
                })?;
            tokio::time::sleep(POLL_INTERVAL).await;
            let request = self.http.get(format!("{}{}", self.base_url, result_url));
            response = self.send(request, "Snowflake result poll").await?;
        }

        let data = response
            .into_data()
            .map_err(|e| DbContextError::query_failed("Snowflake query", e))?;
        if let Some(query_id) = &data.query_id {
            tracing::debug!("Snowflake query {} returned {} chunks", query_id, data.chunks.len());
        }
        self.collect_rows(data).await
    }

    async fn collect_rows(&self, data: QueryData) -> Result<QueryResult> {
        let QueryData {
            rowtype,
            rowset,
            chunks,
            chunk_headers,
            qrmk,
            ..
        } = data;

        let mut raw_rows = rowset;
        for chunk in &chunks {
            let mut request = self.http.get(&chunk.url);
            if chunk_headers.is_empty() {
                if let Some(key) = &qrmk {
                    request = request
                        .header("x-amz-server-side-encryption-customer-algorithm", "AES256")
                        .header("x-amz-server-side-encryption-customer-key", key);
                }
            } else {
                for (name, value) in &chunk_headers {
                    request = request.header(name.as_str(), value.as_str());
                }
            }
            let body = request
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| DbContextError::query_failed("Snowflake chunk download", e))?
                .text()
                .await
                .map_err(|e| DbContextError::query_failed("Snowflake chunk download", e))?;
            let rows = parse_chunk(&body)?;
            if chunk.row_count != 0 && rows.len() as u64 != chunk.row_count {
                tracing::warn!(
                    "Snowflake chunk declared {} rows but contained {}",
                    chunk.row_count,
                    rows.len()
                );
            }
            raw_rows.extend(rows);
        }

        Ok(QueryResult {
            columns: rowtype.into_iter().map(|c| c.name).collect(),
            rows: raw_rows
                .iter()
                .map(|row| row.iter().map(SqlValue::from_json).collect())
                .collect(),
        })
    }

    /// Deletes the session on the server.
    pub(crate) async fn close(&self) -> Result<()> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let request = self
            .http
            .post(format!("{}/session", self.base_url))
            .query(&[("delete", "true"), ("request_id", request_id.as_str())]);
        let response: ApiResponse<JsonValue> = self.send(request, "Snowflake session close").await?;
        if !response.success {
            return Err(DbContextError::query_failed(
                "Snowflake session close",
                response.error(),
            ));
        }
        Ok(())
    }
}

/// Builds the `bindings` object: positions are 1-based strings.
pub(crate) fn bindings_json(bindings: &[&str]) -> JsonValue {
    let map: Map<String, JsonValue> = bindings
        .iter()
        .enumerate()
        .map(|(i, value)| {
            (
                (i + 1).to_string(),
                json!({ "type": "TEXT", "value": value }),
            )
        })
        .collect();
    JsonValue::Object(map)
}

/// Parses a result chunk: a comma-separated run of JSON arrays without the
/// enclosing brackets.
pub(crate) fn parse_chunk(body: &str) -> Result<Vec<Vec<JsonValue>>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let wrapped = if trimmed.starts_with("[[") || trimmed == "[]" {
        trimmed.to_string()
    } else {
        format!("[{}]", trimmed)
    };
    serde_json::from_str(&wrapped)
        .map_err(|e| DbContextError::serialization("Invalid Snowflake result chunk", e))
}

//! Thin BigQuery REST v2 client: paginated list calls and query jobs.

use super::auth::TokenProvider;
use crate::Result;
use crate::error::DbContextError;
use crate::format::SqlValue;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};

/// Base URL of the BigQuery REST API.
pub const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

const QUERY_WAIT_MS: u64 = 10_000;
const PAGE_SIZE: u32 = 1000;

/// Error body returned by Google APIs.
#[derive(Debug, thiserror::Error)]
#[error("BigQuery API error {status}: {message}")]
pub struct BigQueryApiError {
    /// HTTP status code.
    pub status: u16,
    /// Message from the error body, or the raw body.
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FieldSchema {
    pub name: String,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub job_complete: bool,
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<QueryRow>,
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryRow {
    #[serde(default)]
    pub f: Vec<JsonValue>,
}

/// Rows of a finished query.
#[derive(Debug, Default)]
pub(crate) struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    fn extend(&mut self, response: QueryResponse) {
        if self.columns.is_empty()
            && let Some(schema) = response.schema
        {
            self.columns = schema.fields.into_iter().map(|f| f.name).collect();
        }
        self.rows.extend(
            response
                .rows
                .iter()
                .map(|row| row.f.iter().map(SqlValue::from_json).collect()),
        );
    }
}

/// Builds a named `STRING` query parameter.
pub(crate) fn string_parameter(name: &str, value: &str) -> JsonValue {
    json!({
        "name": name,
        "parameterType": { "type": "STRING" },
        "parameterValue": { "value": value },
    })
}

/// Authenticated client scoped to one billing project.
pub(crate) struct BigQueryClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    project_id: String,
}

impl BigQueryClient {
    pub(crate) fn new(http: reqwest::Client, tokens: TokenProvider, project_id: String) -> Self {
        Self {
            http,
            tokens,
            project_id,
        }
    }

    pub(crate) fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let token = self.tokens.access_token(&self.http).await?;
        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| DbContextError::query_failed(context.to_string(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(DbContextError::query_failed(
                context.to_string(),
                BigQueryApiError {
                    status: status.as_u16(),
                    message,
                },
            ));
        }
        response
            .json()
            .await
            .map_err(|e| DbContextError::query_failed(format!("{}: invalid response", context), e))
    }

    /// One GET against the API.
    pub(crate) async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<JsonValue> {
        let request = self.http.get(url).query(query);
        self.send(request, &format!("GET {}", url)).await
    }

    /// Follows `nextPageToken` through a list endpoint, collecting the
    /// array stored under `items_key` on every page.
    pub(crate) async fn list_all(&self, url: &str, items_key: &str) -> Result<Vec<JsonValue>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(url)
                .query(&[("maxResults", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let mut page: JsonValue = self.send(request, &format!("GET {}", url)).await?;

            if let Some(JsonValue::Array(page_items)) = page.get_mut(items_key).map(JsonValue::take)
            {
                items.extend(page_items);
            }
            page_token = page
                .get("nextPageToken")
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                return Ok(items);
            }
        }
    }

    /// Runs a standard-SQL query with named parameters and returns every row.
    pub(crate) async fn query(&self, sql: &str, parameters: Vec<JsonValue>) -> Result<QueryResult> {
        tracing::debug!("BigQuery query: {}", sql);
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": parameters,
            "timeoutMs": QUERY_WAIT_MS,
            "maxResults": PAGE_SIZE,
        });
        let request = self
            .http
            .post(format!("{}/projects/{}/queries", API_BASE, self.project_id))
            .json(&body);
        let mut response: QueryResponse = self.send(request, "BigQuery jobs.query").await?;

        let mut result = QueryResult::default();
        loop {
            let complete = response.job_complete;
            let next_page = response.page_token.clone();
            let job = response.job_reference.as_ref().map(|j| {
                (j.job_id.clone(), j.location.clone())
            });
            if complete {
                result.extend(response);
            }
            if complete && next_page.is_none() {
                return Ok(result);
            }

            let (job_id, location) = job.ok_or_else(|| {
                DbContextError::parse("BigQuery query response without a job reference")
            })?;
            let mut request = self
                .http
                .get(format!(
                    "{}/projects/{}/queries/{}",
                    API_BASE, self.project_id, job_id
                ))
                .query(&[
                    ("timeoutMs", QUERY_WAIT_MS.to_string()),
                    ("maxResults", PAGE_SIZE.to_string()),
                ]);
            if let Some(location) = &location {
                request = request.query(&[("location", location.as_str())]);
            }
            if complete && let Some(token) = &next_page {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            response = self.send(request, "BigQuery jobs.getQueryResults").await?;
        }
    }
}

//! BigQuery client setup and project resolution.

use super::BigQueryAdapter;
use super::auth::{BIGQUERY_SCOPE, CLOUD_PLATFORM_READ_SCOPE, Credentials, TokenProvider, load_credentials};
use super::client::{API_BASE, BigQueryClient};
use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::adapters::config::non_blank;
use crate::deadline::{CONNECT_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;

/// Environment variables consulted for the project, in order.
pub const PROJECT_ENV_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT"];

/// Resolves the project queries are billed to and catalogs are read from:
/// the config, then the credentials file, then the environment.
///
/// # Errors
/// Returns a configuration error when no source names a project.
pub fn resolve_project_id(config: &DatabaseConfig, credentials: &Credentials) -> Result<String> {
    if let Some(project) = non_blank(config.project_id.as_deref()) {
        return Ok(project.to_string());
    }
    if let Some(project) = credentials.project_id() {
        return Ok(project.to_string());
    }
    PROJECT_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            DbContextError::configuration(format!(
                "No BigQuery project id: set one on the connection or via {}",
                PROJECT_ENV_VARS.join(" / ")
            ))
        })
}

impl BigQueryAdapter {
    /// Loads credentials, resolves the project and verifies access by
    /// listing one dataset.
    ///
    /// # Errors
    /// Returns a configuration error when credentials or project cannot be
    /// resolved, a `Connection` error naming BigQuery, or `Timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let credentials = load_credentials(config)?;
        let project_id = resolve_project_id(config, &credentials)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("dbcontext/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TABLE_DETAIL_TIMEOUT)
            .build()
            .map_err(|e| {
                DbContextError::connection_failed("BigQuery", "failed to build HTTP client", e)
            })?;
        let tokens = TokenProvider::new(credentials, &[BIGQUERY_SCOPE, CLOUD_PLATFORM_READ_SCOPE]);
        let client = BigQueryClient::new(http, tokens, project_id.clone());

        with_deadline(CONNECT_TIMEOUT, "BigQuery connect", async {
            client
                .get_json(
                    &format!("{}/projects/{}/datasets", API_BASE, project_id),
                    &[("maxResults", "1")],
                )
                .await
                .map_err(|e| {
                    DbContextError::connection_failed(
                        "BigQuery",
                        format!("cannot access project {}", project_id),
                        e,
                    )
                })
        })
        .await?;

        tracing::info!("Connected to BigQuery project {}", project_id);
        Ok(Self { client })
    }
}

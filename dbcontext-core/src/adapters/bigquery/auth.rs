//! Google OAuth2 access tokens for the BigQuery REST API.
//!
//! Two credential file shapes are supported: service-account keys, which
//! are exchanged for a token with a self-signed RS256 JWT, and gcloud
//! application-default user credentials, which carry a refresh token.
//! Tokens are cached until shortly before they expire.

use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::error::DbContextError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

/// Read-only scope is enough for catalog listing and SELECT jobs.
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery.readonly";
/// Project listing needs the broader cloud-platform read scope.
pub const CLOUD_PLATFORM_READ_SCOPE: &str =
    "https://www.googleapis.com/auth/cloud-platform.read-only";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const JWT_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Contents of a Google credentials file.
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// A service-account key file.
    ServiceAccount {
        client_email: String,
        private_key: Zeroizing<String>,
        #[serde(default)]
        private_key_id: Option<String>,
        #[serde(default)]
        token_uri: Option<String>,
        #[serde(default)]
        project_id: Option<String>,
    },
    /// gcloud application-default user credentials.
    AuthorizedUser {
        client_id: String,
        client_secret: Zeroizing<String>,
        refresh_token: Zeroizing<String>,
        #[serde(default)]
        quota_project_id: Option<String>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceAccount {
                client_email,
                project_id,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("client_email", client_email)
                .field("project_id", project_id)
                .finish_non_exhaustive(),
            Self::AuthorizedUser {
                client_id,
                quota_project_id,
                ..
            } => f
                .debug_struct("AuthorizedUser")
                .field("client_id", client_id)
                .field("quota_project_id", quota_project_id)
                .finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    /// Reads and parses a credentials file.
    ///
    /// # Errors
    /// Returns an `Io` error if the file cannot be read and a configuration
    /// error if it is not a supported credentials document.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            DbContextError::io(
                format!("Failed to read credentials file {}", path.display()),
                e,
            )
        })?);
        Self::from_json(&contents).map_err(|e| {
            DbContextError::configuration(format!(
                "Unsupported credentials file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parses credentials from JSON text.
    pub fn from_json(contents: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Project embedded in the credentials, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::ServiceAccount { project_id, .. } => project_id.as_deref(),
            Self::AuthorizedUser {
                quota_project_id, ..
            } => quota_project_id.as_deref(),
        }
        .filter(|p| !p.trim().is_empty())
    }
}

/// Where credentials are read from: the config, then
/// `GOOGLE_APPLICATION_CREDENTIALS`, then gcloud's well-known ADC file.
pub fn credentials_path(config: &DatabaseConfig) -> Option<PathBuf> {
    if let Some(path) = &config.credentials_file {
        return Some(path.clone());
    }
    if let Some(path) = std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS")
        .filter(|p| !p.is_empty())
    {
        return Some(PathBuf::from(path));
    }
    well_known_adc_path().filter(|p| p.is_file())
}

fn well_known_adc_path() -> Option<PathBuf> {
    let base = if cfg!(target_os = "windows") {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    base.map(|dir| dir.join("gcloud").join("application_default_credentials.json"))
}

/// Resolves and loads credentials for a config.
///
/// # Errors
/// Returns a configuration error when no credentials can be found.
pub fn load_credentials(config: &DatabaseConfig) -> Result<Credentials> {
    let path = credentials_path(config).ok_or_else(|| {
        DbContextError::configuration(
            "No BigQuery credentials found: set a credentials file, \
             GOOGLE_APPLICATION_CREDENTIALS, or run `gcloud auth application-default login`",
        )
    })?;
    tracing::debug!("Loading BigQuery credentials from {}", path.display());
    Credentials::from_file(&path)
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: Zeroizing<String>,
    expires_at: Instant,
}

/// Issues and caches access tokens for one set of credentials.
pub struct TokenProvider {
    credentials: Credentials,
    scopes: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("credentials", &self.credentials)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Creates a provider requesting the given scopes.
    pub fn new(credentials: Credentials, scopes: &[&str]) -> Self {
        Self {
            credentials,
            scopes: scopes.join(" "),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a new one when needed.
    ///
    /// # Errors
    /// Returns a `Connection` error naming BigQuery when the token endpoint
    /// rejects the credentials.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<Zeroizing<String>> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + REFRESH_MARGIN
        {
            return Ok(token.access_token.clone());
        }

        let response = self.fetch(http).await?;
        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(3600));
        let access_token = Zeroizing::new(response.access_token);
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }

    async fn fetch(&self, http: &reqwest::Client) -> Result<TokenResponse> {
        let request = match &self.credentials {
            Credentials::ServiceAccount {
                client_email,
                private_key,
                private_key_id,
                token_uri,
                ..
            } => {
                let token_uri = token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
                let assertion = Zeroizing::new(sign_assertion(
                    client_email,
                    private_key,
                    private_key_id.as_deref(),
                    &self.scopes,
                    token_uri,
                    chrono::Utc::now().timestamp(),
                )?);
                http.post(token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
            }
            Credentials::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                ..
            } => http.post(DEFAULT_TOKEN_URI).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ]),
        };

        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DbContextError::connection_failed("BigQuery", "token request failed", e))?
            .json()
            .await
            .map_err(|e| DbContextError::connection_failed("BigQuery", "invalid token response", e))
    }
}

/// Signs the JWT a service account exchanges for an access token.
pub(crate) fn sign_assertion(
    client_email: &str,
    private_key: &str,
    private_key_id: Option<&str>,
    scope: &str,
    audience: &str,
    issued_at: i64,
) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
        DbContextError::configuration(format!("Invalid service account private key: {}", e))
    })?;
    let mut header = Header::new(Algorithm::RS256);
    header.kid = private_key_id.map(str::to_string);

    let claims = JwtClaims {
        iss: client_email,
        scope,
        aud: audience,
        iat: issued_at,
        exp: issued_at + JWT_LIFETIME_SECS,
    };
    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| DbContextError::serialization("Failed to sign service account JWT", e))
}

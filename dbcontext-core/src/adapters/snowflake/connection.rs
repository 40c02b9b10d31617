//! Snowflake session management over the REST API.
//!
//! Password logins post credentials to `/session/v1/login-request`.
//! External-browser (SSO) logins first ask `/session/authenticator-request`
//! for an SSO URL and proof key, open the URL in the user's browser, wait
//! for the identity provider to redirect a token to a one-shot localhost
//! listener and then log in with token and proof key.

use super::SnowflakeAdapter;
use super::query::{ApiResponse, Session};
use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::adapters::config::{EXTERNAL_BROWSER_AUTHENTICATOR, non_blank};
use crate::deadline::{CONNECT_TIMEOUT, SSO_LOGIN_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zeroize::Zeroizing;

/// Authenticator used when the config names none.
pub const DEFAULT_AUTHENTICATOR: &str = "snowflake";

const CLIENT_APP_ID: &str = "dbcontext";
const REDIRECT_REQUEST_LIMIT: usize = 64 * 1024;

const SSO_SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/html; charset=utf-8\r\n\
    Connection: close\r\n\r\n\
    <html><body>Snowflake authentication complete. You can close this window.</body></html>";

/// The authenticator to log in with, lower-cased.
pub fn effective_authenticator(config: &DatabaseConfig) -> String {
    non_blank(config.authenticator.as_deref())
        .unwrap_or(DEFAULT_AUTHENTICATOR)
        .to_lowercase()
}

/// Base URL of the account, e.g. `https://xy12345.eu-west-1.snowflakecomputing.com`.
///
/// An explicit `host` wins, which covers PrivateLink endpoints.
pub fn account_url(config: &DatabaseConfig) -> String {
    let host = non_blank(config.host.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let account = non_blank(config.account.as_deref()).unwrap_or_default();
            if account.contains(".snowflakecomputing.") {
                account.to_string()
            } else {
                format!("{}.snowflakecomputing.com", account)
            }
        });
    let host = host
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    match config.port {
        Some(port) => format!("https://{}:{}", host, port),
        None => format!("https://{}", host),
    }
}

/// Account locator sent as `ACCOUNT_NAME`: the account up to its region suffix.
pub fn account_name(config: &DatabaseConfig) -> String {
    non_blank(config.account.as_deref())
        .unwrap_or_default()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorData {
    sso_url: String,
    proof_key: String,
}

impl SnowflakeAdapter {
    /// Logs in and opens a session.
    ///
    /// # Errors
    /// Returns a configuration error for an unusable config, a `Connection`
    /// error naming Snowflake when login fails, or `Timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let base_url = account_url(config);
        let http = reqwest::Client::builder()
            .user_agent(concat!("dbcontext/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TABLE_DETAIL_TIMEOUT)
            .build()
            .map_err(|e| {
                DbContextError::connection_failed("Snowflake", "failed to build HTTP client", e)
            })?;

        let token = if config.uses_external_browser() {
            with_deadline(
                SSO_LOGIN_TIMEOUT,
                "Snowflake external browser login",
                external_browser_login(&http, &base_url, config),
            )
            .await?
        } else {
            with_deadline(
                CONNECT_TIMEOUT,
                "Snowflake login",
                password_login(&http, &base_url, config),
            )
            .await?
        };

        let database = non_blank(config.database.as_deref()).map(str::to_string);
        tracing::info!(
            "Connected to Snowflake account {} ({})",
            account_name(config),
            effective_authenticator(config)
        );
        Ok(Self {
            session: Session::new(http, base_url, token),
            database,
        })
    }
}

fn login_body(config: &DatabaseConfig, extra: JsonValue) -> JsonValue {
    let mut data = json!({
        "CLIENT_APP_ID": CLIENT_APP_ID,
        "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
        "ACCOUNT_NAME": account_name(config),
        "LOGIN_NAME": non_blank(config.user.as_deref()).unwrap_or_default(),
        "CLIENT_ENVIRONMENT": {
            "APPLICATION": CLIENT_APP_ID,
            "OS": std::env::consts::OS,
        },
    });
    if let (Some(target), Some(fields)) = (data.as_object_mut(), extra.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    json!({ "data": data })
}

fn login_params(config: &DatabaseConfig) -> Vec<(&'static str, String)> {
    let mut params = vec![("request_id", uuid::Uuid::new_v4().to_string())];
    let optional = [
        ("databaseName", config.database.as_deref()),
        ("schemaName", config.schema.as_deref()),
        ("warehouse", config.warehouse.as_deref()),
        ("roleName", config.role.as_deref()),
    ];
    for (key, value) in optional {
        if let Some(value) = non_blank(value) {
            params.push((key, value.to_string()));
        }
    }
    params
}

async fn post_login(
    http: &reqwest::Client,
    base_url: &str,
    config: &DatabaseConfig,
    body: &JsonValue,
) -> Result<Zeroizing<String>> {
    let response: ApiResponse<LoginData> = http
        .post(format!("{}/session/v1/login-request", base_url))
        .query(&login_params(config))
        .header(reqwest::header::ACCEPT, "application/json")
        .json(body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| DbContextError::connection_failed("Snowflake", "login request failed", e))?
        .json()
        .await
        .map_err(|e| DbContextError::connection_failed("Snowflake", "invalid login response", e))?;

    let data = response
        .into_data()
        .map_err(|e| DbContextError::connection_failed("Snowflake", "login rejected", e))?;
    Ok(Zeroizing::new(data.token))
}

async fn password_login(
    http: &reqwest::Client,
    base_url: &str,
    config: &DatabaseConfig,
) -> Result<Zeroizing<String>> {
    let password = config.password().ok_or_else(|| {
        DbContextError::configuration("Snowflake password authentication requires a password")
    })?;
    let body = login_body(config, json!({ "PASSWORD": password }));
    post_login(http, base_url, config, &body).await
}

async fn external_browser_login(
    http: &reqwest::Client,
    base_url: &str,
    config: &DatabaseConfig,
) -> Result<Zeroizing<String>> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| DbContextError::io("Failed to bind SSO redirect listener", e))?;
    let port = listener
        .local_addr()
        .map_err(|e| DbContextError::io("Failed to read SSO redirect port", e))?
        .port();

    let body = login_body(
        config,
        json!({
            "AUTHENTICATOR": EXTERNAL_BROWSER_AUTHENTICATOR.to_uppercase(),
            "BROWSER_MODE_REDIRECT_PORT": port.to_string(),
        }),
    );
    let response: ApiResponse<AuthenticatorData> = http
        .post(format!("{}/session/authenticator-request", base_url))
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            DbContextError::connection_failed("Snowflake", "authenticator request failed", e)
        })?
        .json()
        .await
        .map_err(|e| {
            DbContextError::connection_failed("Snowflake", "invalid authenticator response", e)
        })?;
    let auth = response.into_data().map_err(|e| {
        DbContextError::connection_failed("Snowflake", "authenticator request rejected", e)
    })?;

    open_browser(&auth.sso_url);
    let token = Zeroizing::new(receive_redirect_token(&listener).await?);

    let body = login_body(
        config,
        json!({
            "AUTHENTICATOR": EXTERNAL_BROWSER_AUTHENTICATOR.to_uppercase(),
            "TOKEN": token.as_str(),
            "PROOF_KEY": auth.proof_key,
        }),
    );
    post_login(http, base_url, config, &body).await
}

fn open_browser(url: &str) {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        std::process::Command::new("xdg-open")
    };

    tracing::info!("Opening browser for Snowflake SSO: {}", url);
    if let Err(e) = command.arg(url).spawn() {
        tracing::warn!(
            "Could not open a browser ({}); open this URL manually: {}",
            e,
            url
        );
    }
}

/// Waits for the identity provider's redirect and returns its token.
async fn receive_redirect_token(listener: &TcpListener) -> Result<String> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| DbContextError::io("Failed to accept SSO redirect", e))?;

        let mut request = Vec::new();
        let mut buf = [0_u8; 4096];
        loop {
            let read = stream
                .read(&mut buf)
                .await
                .map_err(|e| DbContextError::io("Failed to read SSO redirect", e))?;
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
            if request_complete(&request) || request.len() > REDIRECT_REQUEST_LIMIT {
                break;
            }
        }

        let request = String::from_utf8_lossy(&request);
        if let Some(token) = extract_token(&request) {
            if let Err(e) = stream.write_all(SSO_SUCCESS_PAGE.as_bytes()).await {
                tracing::debug!("Failed to answer SSO redirect: {}", e);
            }
            return Ok(token);
        }
        tracing::debug!("Ignoring SSO redirect request without token from {}", peer);
    }
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    text.len() >= header_end + 4 + content_length
}

/// Pulls `token` out of a redirect request, from the query string of the
/// request line or from a form-encoded body.
pub(crate) fn extract_token(request: &str) -> Option<String> {
    let request_line = request.lines().next()?;
    let target = request_line.split_whitespace().nth(1)?;
    let query = target.split_once('?').map(|(_, q)| q);
    let body = request.split_once("\r\n\r\n").map(|(_, b)| b);

    [query, body]
        .into_iter()
        .flatten()
        .flat_map(|part| url::form_urlencoded::parse(part.trim().as_bytes()))
        .find(|(key, value)| key == "token" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

//! MySQL connection setup.

use super::MySqlAdapter;
use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::adapters::config::non_blank;
use crate::deadline::{CONNECT_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use std::str::FromStr;

/// Port used when the config has none.
pub const DEFAULT_PORT: u16 = 3306;
/// TLS when the server offers it, plaintext otherwise.
pub const DEFAULT_SSL_MODE: &str = "PREFERRED";

/// The port to connect to.
pub fn effective_port(config: &DatabaseConfig) -> u16 {
    config.port.unwrap_or(DEFAULT_PORT)
}

/// The ssl mode to connect with, upper-cased with `-` spelled as `_`.
pub fn effective_ssl_mode(config: &DatabaseConfig) -> String {
    non_blank(config.ssl_mode.as_deref())
        .unwrap_or(DEFAULT_SSL_MODE)
        .to_uppercase()
        .replace('-', "_")
}

/// Builds sqlx connect options.
///
/// # Errors
/// Returns a configuration error for an unknown ssl mode.
pub fn connect_options(config: &DatabaseConfig) -> Result<MySqlConnectOptions> {
    let ssl_mode = effective_ssl_mode(config);
    let parsed = MySqlSslMode::from_str(&ssl_mode.to_lowercase()).map_err(|_| {
        DbContextError::configuration(format!("Invalid MySQL ssl mode '{}'", ssl_mode))
    })?;

    let mut options = MySqlConnectOptions::new()
        .host(non_blank(config.host.as_deref()).unwrap_or("localhost"))
        .port(effective_port(config))
        .ssl_mode(parsed)
        .charset("utf8mb4");

    if let Some(user) = non_blank(config.user.as_deref()) {
        options = options.username(user);
    }
    if let Some(password) = config.password() {
        options = options.password(password);
    }
    if let Some(database) = non_blank(config.database.as_deref()) {
        options = options.database(database);
    }
    Ok(options)
}

impl MySqlAdapter {
    /// Connects and pings under the connect deadline.
    ///
    /// # Errors
    /// Returns a `Connection` error naming MySQL, or `Timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = connect_options(config)?;
        let database = non_blank(config.database.as_deref()).map(str::to_string);
        let target = format!(
            "{}:{}",
            non_blank(config.host.as_deref()).unwrap_or("localhost"),
            effective_port(config)
        );

        let pool = with_deadline(CONNECT_TIMEOUT, "MySQL connect", async {
            let pool = create_pool(options).await.map_err(|e| {
                DbContextError::connection_failed(
                    "MySQL",
                    format!("failed to connect to {}", target),
                    e,
                )
            })?;
            let result: i64 = sqlx::query_scalar("SELECT CAST(1 AS SIGNED)")
                .fetch_one(&pool)
                .await
                .map_err(|e| DbContextError::connection_failed("MySQL", "ping failed", e))?;
            if result != 1 {
                return Err(DbContextError::configuration(
                    "Basic connectivity test failed: unexpected result",
                ));
            }
            Ok(pool)
        })
        .await?;

        tracing::info!(
            "Connected to MySQL at {}{}",
            target,
            database
                .as_deref()
                .map(|d| format!("/{}", d))
                .unwrap_or_default()
        );
        Ok(Self { pool, database })
    }
}

async fn create_pool(options: MySqlConnectOptions) -> std::result::Result<MySqlPool, sqlx::Error> {
    use sqlx::Executor;

    let max_execution_ms = TABLE_DETAIL_TIMEOUT.as_millis();

    MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(CONNECT_TIMEOUT)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                conn.execute("SET time_zone = '+00:00'").await?;
                conn.execute(
                    format!("SET SESSION max_execution_time = {}", max_execution_ms).as_str(),
                )
                .await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

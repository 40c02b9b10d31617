//! Redshift connection setup.

use super::RedshiftAdapter;
use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::adapters::config::non_blank;
use crate::deadline::{CONNECT_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::str::FromStr;

/// Port used when the config has none.
pub const DEFAULT_PORT: u16 = 5439;
/// Redshift clusters require TLS unless told otherwise.
pub const DEFAULT_SSL_MODE: &str = "require";
/// Database every cluster is created with.
pub const DEFAULT_DATABASE: &str = "dev";

/// The port to connect to.
pub fn effective_port(config: &DatabaseConfig) -> u16 {
    config.port.unwrap_or(DEFAULT_PORT)
}

/// The `sslmode` to connect with, lower-cased.
pub fn effective_ssl_mode(config: &DatabaseConfig) -> String {
    non_blank(config.ssl_mode.as_deref())
        .unwrap_or(DEFAULT_SSL_MODE)
        .to_lowercase()
}

/// The database to connect to.
pub fn effective_database(config: &DatabaseConfig) -> String {
    non_blank(config.database.as_deref())
        .unwrap_or(DEFAULT_DATABASE)
        .to_string()
}

/// Builds sqlx connect options for a Redshift endpoint.
///
/// # Errors
/// Returns a configuration error for an unknown `sslmode`.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let ssl_mode = effective_ssl_mode(config);
    let ssl_mode = PgSslMode::from_str(&ssl_mode).map_err(|_| {
        DbContextError::configuration(format!("Invalid Redshift sslmode '{}'", ssl_mode))
    })?;

    // Redshift rejects the extra_float_digits startup parameter sqlx sends by default
    let mut options = PgConnectOptions::new()
        .host(non_blank(config.host.as_deref()).unwrap_or("localhost"))
        .port(effective_port(config))
        .database(&effective_database(config))
        .ssl_mode(ssl_mode)
        .extra_float_digits(Option::<i8>::None);

    if let Some(user) = non_blank(config.user.as_deref()) {
        options = options.username(user);
    }
    if let Some(password) = config.password() {
        options = options.password(password);
    }
    Ok(options)
}

impl RedshiftAdapter {
    /// Connects and pings under the connect deadline.
    ///
    /// # Errors
    /// Returns a `Connection` error naming Redshift, or `Timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = connect_options(config)?;
        let database = effective_database(config);
        let target = format!(
            "{}:{}/{}",
            non_blank(config.host.as_deref()).unwrap_or("localhost"),
            effective_port(config),
            database
        );

        let pool = with_deadline(CONNECT_TIMEOUT, "Redshift connect", async {
            let pool = create_pool(options).await.map_err(|e| {
                DbContextError::connection_failed(
                    "Redshift",
                    format!("failed to connect to {}", target),
                    e,
                )
            })?;
            let result: i32 = sqlx::query_scalar("SELECT 1")
                .fetch_one(&pool)
                .await
                .map_err(|e| DbContextError::connection_failed("Redshift", "ping failed", e))?;
            if result != 1 {
                return Err(DbContextError::configuration(
                    "Basic connectivity test failed: unexpected result",
                ));
            }
            Ok(pool)
        })
        .await?;

        tracing::info!("Connected to Redshift at {}", target);
        Ok(Self { pool, database })
    }
}

async fn create_pool(options: PgConnectOptions) -> std::result::Result<PgPool, sqlx::Error> {
    use sqlx::Executor;

    let statement_timeout_ms = TABLE_DETAIL_TIMEOUT.as_millis();

    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(CONNECT_TIMEOUT)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout TO {}", statement_timeout_ms).as_str())
                    .await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

//! PostgreSQL connection setup.
//!
//! Defaulting is kept in small pure functions over the full config so the
//! effective values can be tested without a server.

use super::PostgresAdapter;
use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::adapters::config::non_blank;
use crate::deadline::{CONNECT_TIMEOUT, TABLE_DETAIL_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::str::FromStr;

/// Port used when the config has none.
pub const DEFAULT_PORT: u16 = 5432;
/// TLS mode used when the config has none.
pub const DEFAULT_SSL_MODE: &str = "disable";
/// Maintenance database used when no database is configured.
pub const DEFAULT_DATABASE: &str = "postgres";

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

/// Builds sqlx connect options from the config.
///
/// # Errors
/// Returns a configuration error for an unknown `sslmode`.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let ssl_mode = effective_ssl_mode(config);
    let ssl_mode = PgSslMode::from_str(&ssl_mode).map_err(|_| {
        DbContextError::configuration(format!("Invalid PostgreSQL sslmode '{}'", ssl_mode))
    })?;

    let mut options = PgConnectOptions::new()
        .host(non_blank(config.host.as_deref()).unwrap_or("localhost"))
        .port(effective_port(config))
        .database(&effective_database(config))
        .ssl_mode(ssl_mode)
        .application_name(concat!("dbcontext-", env!("CARGO_PKG_VERSION")));

    if let Some(user) = non_blank(config.user.as_deref()) {
        options = options.username(user);
    }
    if let Some(password) = config.password() {
        options = options.password(password);
    }
    Ok(options)
}

impl PostgresAdapter {
    /// Connects and pings under the connect deadline.
    ///
    /// # Errors
    /// Returns a `Connection` error naming PostgreSQL, or `Timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = connect_options(config)?;
        let database = effective_database(config);
        let target = format!(
            "{}:{}/{}",
            non_blank(config.host.as_deref()).unwrap_or("localhost"),
            effective_port(config),
            database
        );

        let pool = with_deadline(CONNECT_TIMEOUT, "PostgreSQL connect", async {
            let pool = create_pool(options)
                .await
                .map_err(|e| {
                    DbContextError::connection_failed(
                        "PostgreSQL",
                        format!("failed to connect to {}", target),
                        e,
                    )
                })?;
            ping(&pool).await?;
            Ok(pool)
        })
        .await?;

        tracing::info!("Connected to PostgreSQL at {}", target);
        Ok(Self { pool, database })
    }
}

async fn create_pool(options: PgConnectOptions) -> std::result::Result<PgPool, sqlx::Error> {
    use sqlx::Executor;

    let statement_timeout_secs = TABLE_DETAIL_TIMEOUT.as_secs();

    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(CONNECT_TIMEOUT)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(
                    format!("SET statement_timeout = '{}s'", statement_timeout_secs).as_str(),
                )
                .await?;
                conn.execute("SET default_transaction_read_only = on")
                    .await?;
                conn.execute("SET timezone = 'UTC'").await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

async fn ping(pool: &PgPool) -> Result<()> {
    let result: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbContextError::connection_failed("PostgreSQL", "ping failed", e))?;

    if result != 1 {
        return Err(DbContextError::configuration(
            "Basic connectivity test failed: unexpected result",
        ));
    }
    Ok(())
}

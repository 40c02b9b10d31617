//! SQLite connection handling.
//!
//! The file is opened read-only and must already exist; a missing path is
//! a connection error, not an empty database.

use super::SqliteAdapter;
use crate::Result;
use crate::adapters::DatabaseConfig;
use crate::deadline::{CONNECT_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

impl SqliteAdapter {
    /// Opens the configured database file and verifies it responds.
    ///
    /// # Errors
    /// Returns a configuration error without a path, otherwise a
    /// `Connection` error if the file cannot be opened.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| DbContextError::configuration("SQLite connections require a path"))?;

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .create_if_missing(false);

        let shown = path.display().to_string();
        let pool = with_deadline(CONNECT_TIMEOUT, "SQLite connect", async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(CONNECT_TIMEOUT)
                .connect_with(options)
                .await
                .map_err(|e| {
                    DbContextError::connection_failed(
                        "SQLite",
                        format!("failed to open {}", shown),
                        e,
                    )
                })?;
            ping(&pool).await?;
            Ok(pool)
        })
        .await?;

        tracing::info!("Opened SQLite database {}", shown);
        Ok(Self { pool, path })
    }
}

async fn ping(pool: &SqlitePool) -> Result<()> {
    let result: i64 = sqlx::query_scalar("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbContextError::connection_failed("SQLite", "ping failed", e))?;

    if result != 1 {
        return Err(DbContextError::configuration(
            "Basic connectivity test failed: unexpected result",
        ));
    }
    Ok(())
}

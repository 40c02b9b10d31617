//! Operation deadlines.
//!
//! Every network-bound call runs under one of these budgets. Expiry is an
//! ordinary [`DbContextError::Timeout`], never a panic.

use crate::{Result, error::DbContextError};
use std::future::Future;
use std::time::Duration;

/// Connectivity checks (open + ping).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Catalog-level discovery and database listing.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);
/// Column listing and row sampling for one table.
pub const TABLE_DETAIL_TIMEOUT: Duration = Duration::from_secs(120);
/// Profiling of a single column.
pub const COLUMN_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(120);
/// Interactive external-browser login.
pub const SSO_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs `future` under `duration`, mapping expiry to a `Timeout` error.
///
/// # Errors
/// Returns the future's own error, or `Timeout` naming `operation`.
pub async fn with_deadline<T, F>(duration: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} exceeded its {}s deadline", operation, duration.as_secs());
            Err(DbContextError::timeout(operation, duration))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_a_timeout_error() {
        let result: Result<()> = with_deadline(Duration::from_secs(5), "slow ping", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        match result {
            Err(DbContextError::Timeout { operation, timeout }) => {
                assert_eq!(operation, "slow ping");
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_deadline(CONNECT_TIMEOUT, "fast", async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<()> = with_deadline(CONNECT_TIMEOUT, "failing", async {
            Err(DbContextError::configuration("nope"))
        })
        .await;
        assert!(err.unwrap_err().is_configuration_error());
    }
}

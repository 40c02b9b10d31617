//! Elapsed-time feedback for long blocking calls.
//!
//! The ticker is the only background task in a run. It shares nothing with
//! the operation it decorates apart from a cancellation token.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default interval between progress reports.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// A periodic elapsed-time reporter.
///
/// Stops when [`ProgressTicker::stop`] is awaited or when the ticker is
/// dropped.
#[derive(Debug)]
pub struct ProgressTicker {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Starts a ticker that logs `label` with the elapsed time at every tick.
    pub fn start(label: impl Into<String>, interval: Duration) -> Self {
        let label = label.into();
        Self::start_with(interval, move |elapsed| {
            tracing::info!("{}... {}s elapsed", label, elapsed.as_secs());
        })
    }

    /// Starts a ticker that calls `on_tick` with the elapsed time.
    ///
    /// The first report fires after one full interval.
    pub fn start_with<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(Duration) + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.child_token();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    _ = ticker.tick() => on_tick(started.elapsed()),
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Stops the ticker and waits for its task to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::debug!("Progress ticker task ended abnormally: {}", e);
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Awaits `operation` while a ticker reports progress under `label`.
pub async fn run_with_progress<T, F>(label: &str, interval: Duration, operation: F) -> T
where
    F: Future<Output = T>,
{
    let ticker = ProgressTicker::start(label, interval);
    let output = operation.await;
    ticker.stop().await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_ticker_reports_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = ProgressTicker::start_with(Duration::from_secs(1), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        ticker.stop().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert!((2..=3).contains(&seen), "unexpected tick count {seen}");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_ticker() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = ProgressTicker::start_with(Duration::from_secs(1), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(ticker);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_progress_returns_operation_output() {
        let value = run_with_progress("discovering", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            42
        })
        .await;
        assert_eq!(value, 42);
    }
}

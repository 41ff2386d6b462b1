//! Snapshot fetching with retry.
//!
//! A single [`Transport::get_order_book`] call is cheap to repeat and has no
//! side effects, so a failure is simply retried after a delay. The loop
//! watches the session's stop signal at every wait so a stopping session is
//! never held up by an unreachable server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::Transport;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::types::{Sequence, Snapshot};

/// Fetches snapshots for one pair, retrying per a [`RetryConfig`]
#[derive(Debug)]
pub struct SnapshotFetcher<T> {
    transport: Arc<T>,
    pair: String,
    retry: RetryConfig,
}

impl<T: Transport> SnapshotFetcher<T> {
    /// Create a fetcher
    pub fn new(transport: Arc<T>, pair: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            transport,
            pair: pair.into(),
            retry,
        }
    }

    /// Get the pair
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Get the retry policy
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Make a single attempt, bounded by the per-attempt timeout if set.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, or [`Error::Timeout`] when the attempt
    /// runs past `attempt_timeout`.
    pub async fn fetch_once(&self) -> Result<Snapshot, Error> {
        let request = self.transport.get_order_book(&self.pair);
        match self.retry.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| Error::Timeout)?,
            None => request.await,
        }
    }

    /// Fetch a snapshot, retrying until it succeeds, attempts run out or
    /// `stop` turns true.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if stopped and
    /// [`Error::RetriesExhausted`] once `max_attempts` attempts have failed.
    pub async fn fetch(&self, stop: &mut watch::Receiver<bool>) -> Result<Snapshot, Error> {
        self.fetch_since(stop, 0).await
    }

    /// Like [`SnapshotFetcher::fetch`], but a snapshot older than `current`
    /// counts as a failed attempt, so a resync never moves the book back.
    ///
    /// # Errors
    ///
    /// As for [`SnapshotFetcher::fetch`].
    pub async fn fetch_since(
        &self,
        stop: &mut watch::Receiver<bool>,
        current: Sequence,
    ) -> Result<Snapshot, Error> {
        let mut attempts: u32 = 0;

        loop {
            let stopping = *stop.borrow();
            if stopping {
                return Err(Error::Cancelled);
            }

            attempts = attempts.saturating_add(1);
            let result = tokio::select! {
                biased;
                _ = stopped(stop) => return Err(Error::Cancelled),
                result = self.fetch_once() => result,
            };
            let result = result.and_then(|snapshot| {
                if snapshot.sequence < current {
                    Err(Error::StaleSnapshot {
                        sequence: snapshot.sequence,
                        current,
                    })
                } else {
                    Ok(snapshot)
                }
            });

            let error = match result {
                Ok(snapshot) => {
                    info!(
                        pair = %self.pair,
                        sequence = snapshot.sequence,
                        orders = snapshot.len(),
                        attempts,
                        "Snapshot fetched"
                    );
                    return Ok(snapshot);
                }
                Err(e) => e,
            };

            if !self.retry.allows_attempt(attempts) {
                warn!(pair = %self.pair, attempts, error = %error, "Giving up on snapshot");
                return Err(Error::RetriesExhausted { attempts });
            }

            let delay = self.delay_after(attempts - 1, &error);
            warn!(
                pair = %self.pair,
                attempt = attempts,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Snapshot fetch failed, retrying"
            );

            tokio::select! {
                biased;
                _ = stopped(stop) => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Back-off before the next attempt; a server-supplied Retry-After wins
    /// when it is longer, still capped at `max_delay`.
    fn delay_after(&self, attempt: u32, error: &Error) -> Duration {
        let delay = self.retry.delay_for_attempt(attempt);
        match error {
            Error::RateLimited {
                retry_after_ms: Some(ms),
            } => delay
                .max(Duration::from_millis(*ms))
                .min(self.retry.max_delay.max(delay)),
            _ => delay,
        }
    }
}

/// Resolve once the stop flag is set.
///
/// Never resolves if the sender is gone, since nobody can ask for a stop.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    let signalled = stop.wait_for(|s| *s).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}

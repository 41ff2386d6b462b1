//! Configuration for a replication session.
//!
//! This module provides the [`Config`] struct for the server address, the
//! pair to replicate, and client settings, plus the [`RetryConfig`] used for
//! snapshot fetches.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Default pair when none is configured
pub const DEFAULT_PAIR: &str = "XBTZAR";

/// Default path prefix for the streamer endpoints
pub const DEFAULT_API_PREFIX: &str = "/api/1";

/// Configuration for a replication session
///
/// # Example
///
/// ```rust
/// use bookstream::Config;
/// use bookstream::config::RetryConfig;
/// use std::time::Duration;
///
/// let config = Config::new("localhost:8080", "XBTZAR")
///     .with_timeout(Duration::from_secs(5))
///     .with_retry(RetryConfig::new().max_attempts(10))
///     .with_queue_capacity(Some(10_000));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.websocket_url().unwrap().as_str(), "ws://localhost:8080/api/1/stream");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Server address as `host:port`
    address: String,

    /// Pair to replicate, e.g. "XBTZAR"
    pair: String,

    /// HTTP request timeout
    timeout: Duration,

    /// Snapshot fetch retry policy
    retry: RetryConfig,

    /// Update queue bound (None = unbounded)
    queue_capacity: Option<usize>,

    /// Path prefix for the REST and WebSocket endpoints
    api_prefix: String,
}

impl Config {
    /// Create a new configuration for a server and pair
    ///
    /// # Arguments
    ///
    /// * `address` - Server address as `host:port`
    /// * `pair` - Pair to replicate
    pub fn new(address: impl Into<String>, pair: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            pair: pair.into(),
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            queue_capacity: None,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }

    /// Load configuration from `STREAMER_ADDRESS` and `STREAMER_PAIR`.
    ///
    /// The pair defaults to [`DEFAULT_PAIR`]. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the address is missing or
    /// either value is malformed.
    pub fn from_env() -> Result<Self, Error> {
        let address = std::env::var("STREAMER_ADDRESS").unwrap_or_default();
        let pair = std::env::var("STREAMER_PAIR").unwrap_or_else(|_| DEFAULT_PAIR.to_string());
        let config = Self::new(address.trim(), pair.trim().to_uppercase());
        config.validate()?;
        Ok(config)
    }

    /// Set the HTTP request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the snapshot retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bound the update queue (None = unbounded)
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the endpoint path prefix
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Get the server address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the pair
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Get the timeout duration
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the retry policy
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Get the queue bound
    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    /// Get the endpoint path prefix
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Check the address and pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the address is empty or not
    /// a `host:port` pair, or if the pair is empty or not alphanumeric.
    pub fn validate(&self) -> Result<(), Error> {
        if self.address.is_empty() {
            return Err(Error::InvalidConfiguration("address is empty".into()));
        }

        let not_host_port =
            || Error::InvalidConfiguration(format!("address {:?} is not host:port", self.address));
        let (host, port) = self.address.rsplit_once(':').ok_or_else(not_host_port)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(not_host_port());
        }
        self.base_url("http")?;

        if self.pair.is_empty() {
            return Err(Error::InvalidConfiguration("pair is empty".into()));
        }
        if !self.pair.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfiguration(format!(
                "pair {:?} must be alphanumeric",
                self.pair
            )));
        }

        Ok(())
    }

    /// URL of a REST endpoint under the API prefix
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the address does not form a URL.
    pub fn rest_url(&self, path: &str) -> Result<Url, Error> {
        self.endpoint("http", path)
    }

    /// URL of the update stream
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the address does not form a URL.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        self.endpoint("ws", "stream")
    }

    fn base_url(&self, scheme: &str) -> Result<Url, Error> {
        // Anything with a path, query or credentials is not a bare host:port
        if self.address.contains(['/', '?', '#', '@']) {
            return Err(Error::InvalidConfiguration(format!(
                "address {:?} is not host:port",
                self.address
            )));
        }
        Url::parse(&format!("{}://{}", scheme, self.address)).map_err(|e| {
            Error::InvalidConfiguration(format!("address {:?}: {}", self.address, e))
        })
    }

    fn endpoint(&self, scheme: &str, path: &str) -> Result<Url, Error> {
        let mut url = self.base_url(scheme)?;
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            url.set_path(path);
        } else {
            url.set_path(&format!("{}/{}", prefix, path));
        }
        Ok(url)
    }
}

/// Retry policy for snapshot fetches
///
/// The default retries forever with a fixed one-second delay. Set
/// `max_attempts` to bound it and `backoff_multiplier` above 1.0 for
/// exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = infinite)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
    /// Time limit for a single attempt (None = only the HTTP timeout applies)
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.0,
            attempt_timeout: None,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts (0 = infinite)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the per-attempt time limit
    pub fn attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        self.max_attempts == 0 || attempts < self.max_attempts
    }

    /// Calculate the delay after the given failed attempt (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(64) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

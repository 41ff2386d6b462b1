//! Transport to the streamer server.
//!
//! The session talks to the server only through two traits:
//!
//! - [`Transport`] - single-shot snapshot requests and opening the stream
//! - [`UpdateStream`] - the long-lived, ordered stream of updates
//!
//! [`StreamerClient`] implements them over plain HTTP ([`rest`]) and a
//! WebSocket ([`websocket`]). Tests and simulations can plug in their own.

pub mod rest;
pub mod websocket;

use std::future::Future;

use crate::config::Config;
use crate::error::Error;
use crate::types::{Snapshot, Update};

pub use rest::RestClient;
pub use websocket::WebSocketClient;

/// Connection to a server that serves snapshots and update streams
pub trait Transport: Send + Sync + 'static {
    /// Stream type returned by [`Transport::stream_updates`]
    type Stream: UpdateStream;

    /// Fetch the full current book for a pair.
    ///
    /// Single-shot and idempotent; a failed call has no side effects.
    fn get_order_book(&self, pair: &str) -> impl Future<Output = Result<Snapshot, Error>> + Send;

    /// Open the update stream for a pair.
    fn stream_updates(&self, pair: &str)
        -> impl Future<Output = Result<Self::Stream, Error>> + Send;
}

/// Ordered stream of updates for one pair
pub trait UpdateStream: Send + 'static {
    /// Receive the next update.
    ///
    /// Returns `None` at a clean end of stream and `Some(Err(_))` when the
    /// stream broke.
    fn next(&mut self) -> impl Future<Output = Option<Result<Update, Error>>> + Send;

    /// Release the connection
    fn close(&mut self) -> impl Future<Output = Result<(), Error>> + Send {
        async { Ok(()) }
    }
}

/// HTTP + WebSocket client for the streamer server
///
/// # Example
///
/// ```rust,no_run
/// use bookstream::client::{StreamerClient, Transport, UpdateStream};
/// use bookstream::Config;
///
/// # async fn example() -> bookstream::Result<()> {
/// let config = Config::new("localhost:8080", "XBTZAR");
/// let client = StreamerClient::new(&config)?;
///
/// let snapshot = client.get_order_book("XBTZAR").await?;
/// println!("{} orders at sequence {}", snapshot.len(), snapshot.sequence);
///
/// let mut stream = client.stream_updates("XBTZAR").await?;
/// while let Some(update) = stream.next().await {
///     println!("update {}", update?.sequence);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StreamerClient {
    config: Config,
    rest: RestClient,
}

impl StreamerClient {
    /// Create a client for the configured server
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            rest: RestClient::new(config)?,
        })
    }

    /// Get a reference to the REST client
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Transport for StreamerClient {
    type Stream = WebSocketClient;

    async fn get_order_book(&self, pair: &str) -> Result<Snapshot, Error> {
        self.rest.get_order_book(pair).await
    }

    async fn stream_updates(&self, pair: &str) -> Result<WebSocketClient, Error> {
        let mut ws = WebSocketClient::connect(&self.config).await?;
        ws.stream_updates(pair).await?;
        Ok(ws)
    }
}

impl UpdateStream for WebSocketClient {
    async fn next(&mut self) -> Option<Result<Update, Error>> {
        WebSocketClient::next(self).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        WebSocketClient::close(self).await
    }
}

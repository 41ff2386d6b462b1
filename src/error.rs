//! Error types for the bookstream crate.
//!
//! This module defines the errors that can occur while replicating an order
//! book: transport failures on the snapshot and stream connections, invalid
//! configuration, and the apply-time errors that signal the local replica has
//! diverged from the server and must be resynchronized.

use std::fmt;

use thiserror::Error;

use crate::types::OrderId;

/// The main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration (empty or malformed address or pair)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Server returned an error response
    #[error("API error {0}")]
    Api(ApiError),

    /// Rate limit exceeded
    #[error("Rate limited{}", retry_suffix(.retry_after_ms))]
    RateLimited {
        /// Retry after this many milliseconds
        retry_after_ms: Option<u64>,
    },

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Update sequence is not contiguous with the book (missed messages)
    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap {
        /// Expected sequence number
        expected: u64,
        /// Actual sequence number received
        got: u64,
    },

    /// A trade referenced an order that is on neither side of the book
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// A trade carried a volume that cannot be applied (non-positive or
    /// overflowing the order's remaining volume)
    #[error("Invalid trade volume {base_e8} for order {order_id}")]
    InvalidTrade {
        /// Order the trade referenced
        order_id: OrderId,
        /// Traded volume from the wire
        base_e8: i64,
    },

    /// A create referenced an order whose type is neither bid nor ask
    #[error("Unknown order type for order {0}")]
    UnknownOrderType(OrderId),

    /// An update arrived before the book received its first snapshot
    #[error("Order book is not synchronized")]
    NotSynchronized,

    /// Snapshot fetch gave up after the configured number of attempts
    #[error("Snapshot fetch failed after {attempts} attempt(s)")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// A resync snapshot was older than the book it would replace
    #[error("Snapshot at sequence {sequence} is older than the book at {current}")]
    StaleSnapshot {
        /// Sequence of the snapshot
        sequence: u64,
        /// Sequence of the book
        current: u64,
    },

    /// The operation was abandoned because the session is stopping
    #[error("Operation cancelled")]
    Cancelled,

    /// A session task panicked or exited without reporting how it ended
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

/// Error returned by the streamer server
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code (0 for errors delivered over the WebSocket)
    pub status: u16,
    /// Error code from the server (if provided)
    pub code: Option<String>,
    /// Error message
    pub message: String,
}

fn retry_suffix(retry_after_ms: &Option<u64>) -> String {
    match retry_after_ms {
        Some(ms) => format!(", retry after {}ms", ms),
        None => String::new(),
    }
}

impl Error {
    /// Whether this error means the local book no longer matches the server.
    ///
    /// The session answers all of these with a resync.
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            Error::SequenceGap { .. }
                | Error::OrderNotFound(_)
                | Error::InvalidTrade { .. }
                | Error::UnknownOrderType(_)
                | Error::NotSynchronized
        )
    }

    /// Whether this error came from the connection rather than the data.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::WebSocket(_)
                | Error::Json(_)
                | Error::Api(_)
                | Error::RateLimited { .. }
                | Error::ConnectionClosed
                | Error::Timeout
        )
    }
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Create an API error with an error code
    pub fn with_code(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}): {}", self.status, self.message)
    }
}

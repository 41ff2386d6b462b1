//! # bookstream
//!
//! A low-latency, in-memory replica of an exchange order book, built from a
//! point-in-time snapshot plus a sequenced stream of incremental updates.
//!
//! ## Features
//!
//! - **Order-level book** - every resting order by id, trades reduce volume in place
//! - **Gap detection** - non-contiguous updates are caught before they touch the book
//! - **Automatic resync** - a fresh snapshot replaces the book whenever it diverges
//! - **Async/Await** - ingestion and processing run as separate Tokio tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bookstream::client::StreamerClient;
//! use bookstream::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bookstream::Error> {
//!     let config = Config::new("localhost:8080", "XBTZAR");
//!     let client = Arc::new(StreamerClient::new(&config)?);
//!
//!     let session = Session::start(config, client)?;
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!
//!     // Consistent view of the whole book
//!     let book = session.current_book();
//!     println!("{} bids, {} asks at {}", book.bids.len(), book.asks.len(), book.sequence);
//!
//!     session.stop();
//!     session.done().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Price Representation
//!
//! Prices and volumes are fixed-point integers scaled by 1e8
//! ([`types::SCALE`]):
//! - `100_000_000` = 1.0
//! - `150_000_000` = 1.5
//! - `1` = 0.00000001
//!
//! ## Architecture
//!
//! This crate is organized into several modules:
//!
//! - [`types`] - Orders, snapshots, updates and wire messages
//! - [`orderbook`] - The book state machine and its thread-safe wrapper
//! - [`queue`] - FIFO between stream ingestion and book processing
//! - [`fetcher`] - Snapshot requests with retry and cancellation
//! - [`client`] - Transport traits and the HTTP/WebSocket client
//! - [`session`] - Ties it all together for one pair
//! - [`config`] - Configuration
//! - [`error`] - Error types for the crate
//!
//! ## Performance
//!
//! - Integer prices and volumes instead of floating point
//! - `FxHashMap` for faster hashing of integer order ids
//! - `parking_lot` mutexes, never held across an `.await`
//! - The stream reader never waits on the book lock

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod orderbook;
pub mod queue;
pub mod session;
pub mod types;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use error::Error;
pub use session::{Session, SessionEnd, SessionHandle};

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

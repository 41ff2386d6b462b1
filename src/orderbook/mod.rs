//! Order book replica.
//!
//! This module provides the order-level book that the session keeps in sync
//! with the server:
//!
//! - Snapshot initialization (wholesale replacement)
//! - Sequence-checked, all-or-nothing application of updates
//! - Consistent reads for display under a single lock
//!
//! # Example
//!
//! ```rust
//! use bookstream::orderbook::OrderBook;
//! use bookstream::types::{Order, Snapshot, Update, SCALE};
//!
//! let mut book = OrderBook::from_snapshot(&Snapshot::new(
//!     10,
//!     vec![Order::bid(1, 100 * SCALE, 5 * SCALE)],
//!     vec![],
//! ));
//!
//! // A trade for the full volume removes the order
//! book.apply(&Update::new(11).with_trade(1, 5 * SCALE)).unwrap();
//! assert!(book.is_empty());
//!
//! // Skipping a sequence number is a gap
//! assert!(book.apply(&Update::new(13)).is_err());
//! assert_eq!(book.sequence(), 11);
//! ```

pub mod book;
pub mod shared;

pub use book::{ApplyOutcome, OrderBook};
pub use shared::{BookState, SharedOrderBook};

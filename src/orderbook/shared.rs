//! Thread-safe order book with synchronization state.
//!
//! [`SharedOrderBook`] puts a single `parking_lot::Mutex` around an
//! [`OrderBook`] and its [`BookState`]. The lock is held for the whole of an
//! apply, an initialize, or a read, so readers never observe a partially
//! applied update and a resync replaces the book atomically.
//!
//! # State tracking
//!
//! The book starts out waiting for a snapshot. Any apply error that means the
//! replica has diverged moves it to `NeedsResync`, and further updates are
//! refused until a fresh snapshot is loaded.

use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Error;
use crate::types::{Price, Sequence, Side, Snapshot, Update, Volume};

use super::{ApplyOutcome, OrderBook};

/// State of the replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// Book has not received its initial snapshot
    WaitingForSnapshot,
    /// Book is consistent with the update stream
    Synchronized,
    /// Book has diverged and must be reloaded from a snapshot
    NeedsResync,
}

#[derive(Debug)]
struct Entry {
    book: OrderBook,
    state: BookState,
}

/// Order book for one pair, safe to share via `Arc<SharedOrderBook>`.
///
/// # Example
///
/// ```rust
/// use bookstream::orderbook::{BookState, SharedOrderBook};
/// use bookstream::types::{Order, Snapshot, Update};
///
/// let book = SharedOrderBook::new("XBTZAR");
/// assert_eq!(book.state(), BookState::WaitingForSnapshot);
///
/// book.initialize(&Snapshot::new(10, vec![Order::bid(1, 100, 5)], vec![]));
/// book.apply(&Update::new(11).with_trade(1, 2)).unwrap();
///
/// let view = book.snapshot();
/// assert_eq!(view.sequence, 11);
/// assert_eq!(view.bids[0].volume, 3);
/// ```
#[derive(Debug)]
pub struct SharedOrderBook {
    pair: String,
    inner: Mutex<Entry>,
}

impl SharedOrderBook {
    /// Create an empty book in `WaitingForSnapshot` state
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            inner: Mutex::new(Entry {
                book: OrderBook::new(),
                state: BookState::WaitingForSnapshot,
            }),
        }
    }

    /// Get the pair this book replicates
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Get the synchronization state
    pub fn state(&self) -> BookState {
        self.inner.lock().state
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> Sequence {
        self.inner.lock().book.sequence()
    }

    /// Replace the whole book with a snapshot and mark it synchronized
    pub fn initialize(&self, snapshot: &Snapshot) {
        let mut entry = self.inner.lock();
        entry.book.initialize(snapshot);
        entry.state = BookState::Synchronized;
        debug!(
            pair = %self.pair,
            sequence = snapshot.sequence,
            orders = entry.book.len(),
            "Order book initialized"
        );
    }

    /// Apply an update under the book lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSynchronized`] while a snapshot is pending, or any
    /// error from [`OrderBook::apply`]. Errors that mean the replica diverged
    /// also move the book to [`BookState::NeedsResync`].
    pub fn apply(&self, update: &Update) -> Result<ApplyOutcome, Error> {
        let mut entry = self.inner.lock();

        if entry.state != BookState::Synchronized {
            return Err(Error::NotSynchronized);
        }

        match entry.book.apply(update) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if e.needs_resync() {
                    entry.state = BookState::NeedsResync;
                }
                warn!(
                    pair = %self.pair,
                    book_sequence = entry.book.sequence(),
                    update_sequence = update.sequence,
                    error = %e,
                    "Update rejected"
                );
                Err(e)
            }
        }
    }

    /// Mark the book as needing a resync
    pub fn mark_needs_resync(&self) {
        self.inner.lock().state = BookState::NeedsResync;
    }

    /// Consistent copy of the current bids, asks, and sequence
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().book.to_snapshot()
    }

    /// Get a cloned copy of the book for reading without holding the lock
    pub fn get_orderbook(&self) -> OrderBook {
        self.inner.lock().book.clone()
    }

    /// Run a read-only closure against the book under the lock
    pub fn read<R>(&self, f: impl FnOnce(&OrderBook) -> R) -> R {
        f(&self.inner.lock().book)
    }

    /// Get the best bid level
    pub fn best_bid(&self) -> Option<(Price, Volume)> {
        self.read(OrderBook::best_bid)
    }

    /// Get the best ask level
    pub fn best_ask(&self) -> Option<(Price, Volume)> {
        self.read(OrderBook::best_ask)
    }

    /// Get the spread
    pub fn spread(&self) -> Option<Price> {
        self.read(OrderBook::spread)
    }

    /// Get the top `n` aggregated levels of one side
    pub fn depth(&self, side: Side, n: usize) -> Vec<(Price, Volume)> {
        self.read(|book| book.depth(side, n))
    }

    /// Number of live orders
    pub fn len(&self) -> usize {
        self.read(OrderBook::len)
    }

    /// Check if the book has no live orders
    pub fn is_empty(&self) -> bool {
        self.read(OrderBook::is_empty)
    }
}

impl fmt::Display for SharedOrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = self.inner.lock();
        write!(f, "{}", entry.book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Order;

    fn synced_book() -> SharedOrderBook {
        let book = SharedOrderBook::new("XBTZAR");
        book.initialize(&Snapshot::new(10, vec![Order::bid(1, 100, 5)], vec![]));
        book
    }

    #[test]
    fn test_new_book_waits_for_snapshot() {
        let book = SharedOrderBook::new("XBTZAR");
        assert_eq!(book.pair(), "XBTZAR");
        assert_eq!(book.state(), BookState::WaitingForSnapshot);
        assert!(matches!(
            book.apply(&Update::new(1)),
            Err(Error::NotSynchronized)
        ));
    }

    #[test]
    fn test_initialize_synchronizes() {
        let book = synced_book();
        assert_eq!(book.state(), BookState::Synchronized);
        assert_eq!(book.sequence(), 10);
        assert_eq!(book.best_bid(), Some((100, 5)));
    }

    #[test]
    fn test_gap_marks_needs_resync() {
        let book = synced_book();
        let result = book.apply(&Update::new(13));

        assert!(matches!(result, Err(Error::SequenceGap { .. })));
        assert_eq!(book.state(), BookState::NeedsResync);
        assert!(matches!(
            book.apply(&Update::new(11)),
            Err(Error::NotSynchronized)
        ));

        book.initialize(&Snapshot::new(12, vec![], vec![]));
        assert_eq!(book.state(), BookState::Synchronized);
        book.apply(&Update::new(13)).unwrap();
        assert_eq!(book.sequence(), 13);
    }

    #[test]
    fn test_order_not_found_marks_needs_resync() {
        let book = synced_book();
        let result = book.apply(&Update::new(11).with_trade(2, 1));
        assert!(matches!(result, Err(Error::OrderNotFound(2))));
        assert_eq!(book.state(), BookState::NeedsResync);
    }

    #[test]
    fn test_snapshot_read() {
        let book = synced_book();
        book.apply(&Update::new(11).with_create(Order::ask(2, 110, 1)))
            .unwrap();

        let view = book.snapshot();
        assert_eq!(view.sequence, 11);
        assert_eq!(view.bids, vec![Order::bid(1, 100, 5)]);
        assert_eq!(view.asks, vec![Order::ask(2, 110, 1)]);
        assert_eq!(book.spread(), Some(10));
        assert_eq!(book.len(), 2);
        assert_eq!(book.get_orderbook().sequence(), 11);
    }

    #[test]
    fn test_concurrent_readers_see_whole_updates() {
        use std::sync::Arc;
        use std::thread;

        let book = Arc::new(synced_book());
        let writer = {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                for seq in 11..=1000u64 {
                    // each update moves volume between two orders atomically
                    let update = if seq % 2 == 1 {
                        Update::new(seq).with_create(Order::ask(2, 110, seq as i64))
                    } else {
                        Update::new(seq).with_delete(2)
                    };
                    book.apply(&update).unwrap();
                }
            })
        };

        for _ in 0..1000 {
            let view = book.snapshot();
            let has_ask = !view.asks.is_empty();
            assert_eq!(has_ask, view.sequence % 2 == 1);
        }
        writer.join().unwrap();
        assert_eq!(book.sequence(), 1000);
    }
}

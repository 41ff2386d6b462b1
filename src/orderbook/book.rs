//! Core order book data structure.
//!
//! Orders are keyed by id in one `FxHashMap` per side, which is what the
//! update stream addresses: trades and deletes name an order id, never a
//! price. Price-ordered views are built on demand for display and for
//! top-of-book queries.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::types::{format_e8, Order, OrderId, Price, Sequence, Side, Snapshot, Update, Volume};

/// Result of a successful [`OrderBook::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was contiguous and is now reflected in the book
    Applied,
    /// The update was at or below the book's sequence and was ignored
    Stale,
}

/// Order-level book for a single pair.
///
/// # Apply rules
///
/// An update is applied only when its sequence is exactly one above the
/// book's. Older updates are ignored. Anything further ahead is a gap.
/// A contiguous update is validated in full before any order is touched,
/// so every error leaves the book exactly as it was.
///
/// # Thread Safety
///
/// This struct is not internally synchronized. Concurrent users go through
/// [`super::SharedOrderBook`].
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    /// Sequence of the last applied update (or of the snapshot)
    sequence: Sequence,

    /// Whether a snapshot has been loaded
    initialized: bool,

    /// Bid orders by id
    bids: FxHashMap<OrderId, Order>,

    /// Ask orders by id
    asks: FxHashMap<OrderId, Order>,
}

impl OrderBook {
    /// Create a new empty book that has not seen a snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a book initialized from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut book = Self::new();
        book.initialize(snapshot);
        book
    }

    /// Get the current sequence number
    #[must_use]
    pub const fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Whether a snapshot has been loaded
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replace the entire book state with a snapshot.
    ///
    /// Orders with non-positive volume are not live and are skipped.
    pub fn initialize(&mut self, snapshot: &Snapshot) {
        self.bids.clear();
        self.asks.clear();

        for order in snapshot.bids.iter().chain(&snapshot.asks) {
            if order.volume > 0 {
                self.insert(*order);
            }
        }

        self.sequence = snapshot.sequence;
        self.initialized = true;
    }

    /// Apply an incremental update.
    ///
    /// # Errors
    ///
    /// - [`Error::NotSynchronized`] before the first snapshot
    /// - [`Error::SequenceGap`] if the update is not contiguous
    /// - [`Error::OrderNotFound`] if a trade names an order that is not live
    /// - [`Error::InvalidTrade`] if a trade volume is not positive
    /// - [`Error::UnknownOrderType`] if a create is neither bid nor ask
    ///
    /// In every error case the book, including its sequence, is unchanged.
    pub fn apply(&mut self, update: &Update) -> Result<ApplyOutcome, Error> {
        if !self.initialized {
            return Err(Error::NotSynchronized);
        }

        if update.sequence <= self.sequence {
            return Ok(ApplyOutcome::Stale);
        }

        let expected = self.sequence + 1;
        if update.sequence != expected {
            return Err(Error::SequenceGap {
                expected,
                got: update.sequence,
            });
        }

        self.validate(update)?;

        // Trades only hit orders that were resting before this update, and a
        // delete must win over anything earlier in the same update.
        for trade in &update.trade_updates {
            self.fill(trade.order_id, trade.base_e8);
        }

        if let Some(create) = &update.create_update {
            if let Ok(order) = Order::from_wire(&create.order) {
                if order.volume > 0 {
                    self.insert(order);
                }
            }
        }

        if let Some(delete) = &update.delete_update {
            self.remove(delete.order_id);
        }

        self.sequence = update.sequence;
        Ok(ApplyOutcome::Applied)
    }

    /// Check that every sub-change of a contiguous update can be applied.
    fn validate(&self, update: &Update) -> Result<(), Error> {
        // Volumes as they evolve through this update's trades
        let mut remaining: Vec<(OrderId, Volume)> = Vec::new();

        for trade in &update.trade_updates {
            let index = match remaining.iter().position(|(id, _)| *id == trade.order_id) {
                Some(index) => index,
                None => {
                    let order = self
                        .get(trade.order_id)
                        .ok_or(Error::OrderNotFound(trade.order_id))?;
                    remaining.push((order.id, order.volume));
                    remaining.len() - 1
                }
            };

            let volume = &mut remaining[index].1;
            if *volume <= 0 {
                return Err(Error::OrderNotFound(trade.order_id));
            }
            let invalid = || Error::InvalidTrade {
                order_id: trade.order_id,
                base_e8: trade.base_e8,
            };
            if trade.base_e8 <= 0 {
                return Err(invalid());
            }
            *volume = volume.checked_sub(trade.base_e8).ok_or_else(invalid)?;
        }

        if let Some(create) = &update.create_update {
            if create.order.order_type.side().is_none() {
                return Err(Error::UnknownOrderType(create.order.order_id));
            }
        }

        Ok(())
    }

    /// Reduce an order's volume, removing it once nothing is left.
    fn fill(&mut self, id: OrderId, base: Volume) {
        let book = if self.asks.contains_key(&id) {
            &mut self.asks
        } else {
            &mut self.bids
        };

        if let Some(order) = book.get_mut(&id) {
            order.volume = order.volume.saturating_sub(base);
            if order.volume <= 0 {
                book.remove(&id);
            }
        }
    }

    /// Insert an order on its side, evicting the id from the other side.
    fn insert(&mut self, order: Order) {
        let (book, other) = match order.side {
            Side::Bid => (&mut self.bids, &mut self.asks),
            Side::Ask => (&mut self.asks, &mut self.bids),
        };
        other.remove(&order.id);
        book.insert(order.id, order);
    }

    /// Remove an order from whichever side holds it.
    fn remove(&mut self, id: OrderId) -> Option<Order> {
        self.asks.remove(&id).or_else(|| self.bids.remove(&id))
    }

    /// Look up a live order by id
    #[must_use]
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.asks.get(&id).or_else(|| self.bids.get(&id))
    }

    /// Whether an order is live on either side
    #[must_use]
    pub fn contains(&self, id: OrderId) -> bool {
        self.get(id).is_some()
    }

    /// All bids, best first (highest price, then lowest id)
    #[must_use]
    pub fn sorted_bids(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.bids.values().copied().collect();
        orders.sort_unstable_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id)));
        orders
    }

    /// All asks, best first (lowest price, then lowest id)
    #[must_use]
    pub fn sorted_asks(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.asks.values().copied().collect();
        orders.sort_unstable_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
        orders
    }

    /// Copy the full state out as a snapshot
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(self.sequence, self.sorted_bids(), self.sorted_asks())
    }

    /// Aggregate the top `n` price levels of one side, best first.
    ///
    /// Returns `(price, total volume)` pairs.
    #[must_use]
    pub fn depth(&self, side: Side, n: usize) -> Vec<(Price, Volume)> {
        let orders = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };

        let mut levels: BTreeMap<Price, Volume> = BTreeMap::new();
        for order in orders.values() {
            *levels.entry(order.price).or_insert(0) += order.volume;
        }

        match side {
            Side::Bid => levels.into_iter().rev().take(n).collect(),
            Side::Ask => levels.into_iter().take(n).collect(),
        }
    }

    /// Get the best bid level as `(price, total volume)`
    #[must_use]
    pub fn best_bid(&self) -> Option<(Price, Volume)> {
        self.depth(Side::Bid, 1).into_iter().next()
    }

    /// Get the best ask level as `(price, total volume)`
    #[must_use]
    pub fn best_ask(&self) -> Option<(Price, Volume)> {
        self.depth(Side::Ask, 1).into_iter().next()
    }

    /// Get the spread (best ask minus best bid)
    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get the mid price, truncated to the fixed-point unit
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(bid + (ask - bid) / 2),
            _ => None,
        }
    }

    /// Check if the book is crossed (best bid >= best ask)
    ///
    /// This shouldn't happen in a healthy replica but is useful for validation.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Get the number of live orders per side as `(bids, asks)`
    #[must_use]
    pub fn num_orders(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// Total number of live orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Check if the book has no live orders
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Drop all orders and return to the uninitialized state
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.sequence = 0;
        self.initialized = false;
    }
}

impl fmt::Display for OrderBook {
    /// Asks then bids, each from highest to lowest price.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for order in self.sorted_asks().iter().rev() {
            writeln!(f, "{} {}", format_e8(order.price, 2), format_e8(order.volume, 6))?;
        }
        writeln!(f)?;
        for order in self.sorted_bids() {
            writeln!(f, "{} {}", format_e8(order.price, 2), format_e8(order.volume, 6))?;
        }
        Ok(())
    }
}

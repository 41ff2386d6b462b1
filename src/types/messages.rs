//! Streamer wire messages.
//!
//! This module contains the JSON bodies returned by the snapshot endpoint,
//! the commands sent over the update WebSocket, and the messages received
//! from it.

use serde::{Deserialize, Serialize};

use super::order::{Order, OrderType};
use super::{OrderId, Price, Sequence, Volume};

/// An order as the server describes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOrder {
    /// Bid, ask, or something this client does not know
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Order ID
    pub order_id: OrderId,
    /// Price (1e-8 units)
    pub price_e8: Price,
    /// Volume (1e-8 units)
    pub volume_e8: Volume,
}

/// Response body of the order book snapshot endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookResponse {
    /// Sequence of the last update reflected in the book
    pub sequence: Sequence,
    /// Bid orders
    #[serde(default)]
    pub bids: Vec<WireOrder>,
    /// Ask orders
    #[serde(default)]
    pub asks: Vec<WireOrder>,
}

/// A trade against a resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// The resting order that was hit
    pub order_id: OrderId,
    /// Base amount traded (1e-8 units)
    pub base_e8: Volume,
}

/// A new resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEvent {
    /// The order that was placed
    pub order: WireOrder,
}

/// A cancelled or otherwise removed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEvent {
    /// The order to remove
    pub order_id: OrderId,
}

/// Incremental, sequence-numbered change to the book
///
/// One update may carry any combination of trades, a create and a delete.
/// The book applies them in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Position in the update stream
    pub sequence: Sequence,
    /// Trades against resting orders
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trade_updates: Vec<TradeEvent>,
    /// Order creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_update: Option<CreateEvent>,
    /// Order deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_update: Option<DeleteEvent>,
}

impl Update {
    /// Create an update carrying no changes
    pub fn new(sequence: Sequence) -> Self {
        Self {
            sequence,
            ..Self::default()
        }
    }

    /// Add a trade
    #[must_use]
    pub fn with_trade(mut self, order_id: OrderId, base_e8: Volume) -> Self {
        self.trade_updates.push(TradeEvent { order_id, base_e8 });
        self
    }

    /// Set the created order
    #[must_use]
    pub fn with_create(mut self, order: Order) -> Self {
        self.create_update = Some(CreateEvent {
            order: order.to_wire(),
        });
        self
    }

    /// Set the created order from its wire form
    #[must_use]
    pub fn with_create_wire(mut self, order: WireOrder) -> Self {
        self.create_update = Some(CreateEvent { order });
        self
    }

    /// Set the deleted order
    #[must_use]
    pub fn with_delete(mut self, order_id: OrderId) -> Self {
        self.delete_update = Some(DeleteEvent { order_id });
        self
    }

    /// Whether this update changes nothing but the sequence
    pub fn is_empty(&self) -> bool {
        self.trade_updates.is_empty() && self.create_update.is_none() && self.delete_update.is_none()
    }
}

/// WebSocket command sent to the server
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum WsCommand {
    /// Start streaming updates for a pair
    StreamUpdates {
        /// Message ID
        id: u64,
        /// Stream parameters
        params: StreamParams,
    },
}

/// Parameters for the stream command
#[derive(Debug, Clone, Serialize)]
pub struct StreamParams {
    /// Pair to stream, e.g. "XBTZAR"
    pub pair: String,
}

/// WebSocket message received from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Stream confirmed
    Subscribed(SubscribedMsg),
    /// Order book update
    Update(Update),
    /// Error response; the server closes the stream after sending it
    Error(ErrorMsg),
}

/// Stream confirmed message
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedMsg {
    /// Message ID (matches the request)
    pub id: Option<u64>,
    /// Pair being streamed
    pub pair: String,
}

/// Error message
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMsg {
    /// Message ID
    pub id: Option<u64>,
    /// Error code
    pub code: Option<String>,
    /// Error message
    pub message: String,
}

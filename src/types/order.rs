//! Order and snapshot types.
//!
//! [`Order`] is the validated form held by the book; its side is always bid
//! or ask. The looser [`OrderType`] is what arrives on the wire and may carry
//! a value this client does not understand.

use serde::{Deserialize, Serialize};

use super::messages::{OrderBookResponse, WireOrder};
use super::{OrderId, Price, Sequence, Volume};

/// Side of the book an order rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    Bid,
    /// Sell order
    Ask,
}

/// Order type as sent by the server
///
/// Any value other than `BID` or `ASK` decodes as [`OrderType::Unknown`] so
/// that a single odd create event is rejected by the book rather than
/// breaking the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Buy order
    Bid,
    /// Sell order
    Ask,
    /// Anything else
    #[serde(other)]
    Unknown,
}

impl OrderType {
    /// The book side for this type, if it has one
    pub fn side(self) -> Option<Side> {
        match self {
            OrderType::Bid => Some(Side::Bid),
            OrderType::Ask => Some(Side::Ask),
            OrderType::Unknown => None,
        }
    }
}

impl From<Side> for OrderType {
    fn from(side: Side) -> Self {
        match side {
            Side::Bid => OrderType::Bid,
            Side::Ask => OrderType::Ask,
        }
    }
}

/// A live order on one side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Order {
    /// Side of the book
    pub side: Side,
    /// Order ID
    pub id: OrderId,
    /// Limit price (1e-8 units)
    pub price: Price,
    /// Remaining volume (1e-8 units)
    pub volume: Volume,
}

impl Order {
    /// Create a new order
    pub fn new(side: Side, id: OrderId, price: Price, volume: Volume) -> Self {
        Self {
            side,
            id,
            price,
            volume,
        }
    }

    /// Create a bid
    pub fn bid(id: OrderId, price: Price, volume: Volume) -> Self {
        Self::new(Side::Bid, id, price, volume)
    }

    /// Create an ask
    pub fn ask(id: OrderId, price: Price, volume: Volume) -> Self {
        Self::new(Side::Ask, id, price, volume)
    }

    /// Convert a wire order, failing with its id if the type is unknown.
    pub fn from_wire(wire: &WireOrder) -> Result<Self, OrderId> {
        wire.order_type
            .side()
            .map(|side| Self::new(side, wire.order_id, wire.price_e8, wire.volume_e8))
            .ok_or(wire.order_id)
    }

    /// Convert back to the wire form
    pub fn to_wire(&self) -> WireOrder {
        WireOrder {
            order_type: self.side.into(),
            order_id: self.id,
            price_e8: self.price,
            volume_e8: self.volume,
        }
    }
}

/// Full point-in-time state of the book
///
/// Produced by the snapshot fetcher to (re)initialize a book, and by
/// [`crate::orderbook::SharedOrderBook::snapshot`] as a consistent read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Sequence of the last update reflected in this state
    pub sequence: Sequence,
    /// Bid orders
    pub bids: Vec<Order>,
    /// Ask orders
    pub asks: Vec<Order>,
}

impl Snapshot {
    /// Create a snapshot from its parts
    pub fn new(sequence: Sequence, bids: Vec<Order>, asks: Vec<Order>) -> Self {
        Self {
            sequence,
            bids,
            asks,
        }
    }

    /// Total number of orders
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Whether both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

impl From<OrderBookResponse> for Snapshot {
    /// The side of each order is taken from the list it appears in; the
    /// server's per-order type field is not trusted here.
    fn from(response: OrderBookResponse) -> Self {
        let convert = |side: Side, orders: Vec<WireOrder>| -> Vec<Order> {
            orders
                .into_iter()
                .map(|o| Order::new(side, o.order_id, o.price_e8, o.volume_e8))
                .collect()
        };
        Self {
            sequence: response.sequence,
            bids: convert(Side::Bid, response.bids),
            asks: convert(Side::Ask, response.asks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_order_type() {
        let json = serde_json::to_string(&OrderType::Bid).unwrap();
        assert_eq!(json, "\"BID\"");

        let t: OrderType = serde_json::from_str("\"ASK\"").unwrap();
        assert_eq!(t, OrderType::Ask);

        let t: OrderType = serde_json::from_str("\"STOP\"").unwrap();
        assert_eq!(t, OrderType::Unknown);
        assert_eq!(t.side(), None);
    }

    #[test]
    fn test_from_wire() {
        let wire = WireOrder {
            order_type: OrderType::Ask,
            order_id: 9,
            price_e8: 42,
            volume_e8: 7,
        };
        assert_eq!(Order::from_wire(&wire), Ok(Order::ask(9, 42, 7)));
        assert_eq!(Order::ask(9, 42, 7).to_wire(), wire);

        let bad = WireOrder {
            order_type: OrderType::Unknown,
            ..wire
        };
        assert_eq!(Order::from_wire(&bad), Err(9));
    }

    #[test]
    fn test_snapshot_from_response_uses_list_side() {
        let response = OrderBookResponse {
            sequence: 50,
            bids: vec![WireOrder {
                order_type: OrderType::Unknown,
                order_id: 1,
                price_e8: 100,
                volume_e8: 5,
            }],
            asks: vec![],
        };
        let snapshot = Snapshot::from(response);
        assert_eq!(snapshot.sequence, 50);
        assert_eq!(snapshot.bids, vec![Order::bid(1, 100, 5)]);
        assert_eq!(snapshot.len(), 1);
    }
}

//! Order book value types and wire messages.
//!
//! - [`order`] - Order, side, and snapshot types held by the book
//! - [`messages`] - JSON messages exchanged with the streamer server

pub mod messages;
pub mod order;

pub use messages::{CreateEvent, DeleteEvent, TradeEvent, Update, WireOrder, WsMessage};
pub use order::{Order, OrderType, Side, Snapshot};

/// Exchange-assigned order identifier
pub type OrderId = i64;

/// Price in fixed-point units of 1e-8 (1 ZAR = 100_000_000)
///
/// Integer prices keep comparisons exact and sums free of rounding.
pub type Price = i64;

/// Volume in fixed-point units of 1e-8
///
/// Signed, because a trade larger than the resting volume drives it below
/// zero before the order is removed.
pub type Volume = i64;

/// Position of an update in the server's update stream
pub type Sequence = u64;

/// Fixed-point scale for [`Price`] and [`Volume`]
pub const SCALE: i64 = 100_000_000;

/// Format a fixed-point amount as a decimal string with `decimals` places.
///
/// Extra precision is truncated, not rounded.
///
/// ```rust
/// use bookstream::types::format_e8;
///
/// assert_eq!(format_e8(123_456_789_000, 2), "1234.56");
/// assert_eq!(format_e8(-50_000_000, 6), "-0.500000");
/// ```
pub fn format_e8(value: i64, decimals: u32) -> String {
    let decimals = decimals.min(8);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let whole = abs / SCALE as u64;
    if decimals == 0 {
        return format!("{}{}", sign, whole);
    }
    let frac = (abs % SCALE as u64) / 10u64.pow(8 - decimals);
    format!("{}{}.{:0width$}", sign, whole, frac, width = decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_e8() {
        assert_eq!(format_e8(100 * SCALE, 2), "100.00");
        assert_eq!(format_e8(1, 8), "0.00000001");
        assert_eq!(format_e8(1, 6), "0.000000");
        assert_eq!(format_e8(5 * SCALE + 25_000_000, 0), "5");
        assert_eq!(format_e8(-SCALE / 4, 2), "-0.25");
    }
}

//! Integration tests against a running streamer server.
//!
//! # Setup
//!
//! Set environment variables:
//! - STREAMER_ADDRESS: Server address as `host:port`
//! - STREAMER_PAIR: Pair to stream (defaults to XBTZAR)
//!
//! # Running
//!
//! ```bash
//! STREAMER_ADDRESS=localhost:8080 cargo test --test integration_stream -- --nocapture
//! ```

use std::sync::Arc;
use std::time::Duration;

use bookstream::client::{StreamerClient, Transport, UpdateStream};
use bookstream::orderbook::{BookState, OrderBook};
use bookstream::{Config, Session};
use tokio::time::timeout;

/// Helper to create a client from environment variables
fn create_client() -> Option<(Config, StreamerClient)> {
    std::env::var("STREAMER_ADDRESS").ok()?;
    let config = Config::from_env().ok()?;
    let client = StreamerClient::new(&config).ok()?;
    Some((config, client))
}

/// Skip test if no server is configured
macro_rules! require_client {
    () => {
        match create_client() {
            Some(c) => c,
            None => {
                eprintln!("Skipping test: STREAMER_ADDRESS not set");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_get_order_book() {
    let (config, client) = require_client!();

    let snapshot = client.get_order_book(config.pair()).await;
    assert!(snapshot.is_ok(), "Failed to get order book: {:?}", snapshot);

    let snapshot = snapshot.unwrap();
    println!(
        "Snapshot at {}: {} bids, {} asks",
        snapshot.sequence,
        snapshot.bids.len(),
        snapshot.asks.len()
    );

    let book = OrderBook::from_snapshot(&snapshot);
    println!("{}", book);
}

#[tokio::test]
async fn test_stream_updates_are_sequenced() {
    let (config, client) = require_client!();

    let mut stream = match client.stream_updates(config.pair()).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Failed to open stream: {}", e);
            return;
        }
    };

    let mut last = None;
    for _ in 0..5 {
        match timeout(Duration::from_secs(30), stream.next()).await {
            Ok(Some(Ok(update))) => {
                println!("Update {}", update.sequence);
                if let Some(prev) = last {
                    assert!(update.sequence > prev, "sequence went backwards");
                }
                last = Some(update.sequence);
            }
            Ok(Some(Err(e))) => panic!("Stream error: {}", e),
            Ok(None) => break,
            Err(_) => {
                println!("No update within 30s");
                break;
            }
        }
    }

    let close_result = UpdateStream::close(&mut stream).await;
    assert!(close_result.is_ok(), "Failed to close: {:?}", close_result);
}

#[tokio::test]
async fn test_session_synchronizes() {
    let (config, client) = require_client!();

    let handle = Session::start(config, Arc::new(client)).unwrap();
    let book = handle.book();

    let synced = timeout(Duration::from_secs(30), async {
        while book.state() != BookState::Synchronized {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(synced.is_ok(), "Book did not synchronize within 30s");

    tokio::time::sleep(Duration::from_secs(2)).await;
    let view = handle.current_book();
    println!("Book at {} with {} orders", view.sequence, view.len());
    assert!(!book.read(OrderBook::is_crossed), "book is crossed");

    handle.stop();
    let end = timeout(Duration::from_secs(5), handle.done()).await;
    assert!(end.is_ok(), "Session did not stop");
}

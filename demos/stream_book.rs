//! Replicate one pair's order book and print the top of book.
//!
//! ```bash
//! STREAMER_ADDRESS=localhost:8080 STREAMER_PAIR=XBTZAR RUST_LOG=bookstream=info \
//!     cargo run --example stream_book
//! ```
//!
//! Press Ctrl-C to stop.

use std::sync::Arc;
use std::time::Duration;

use bookstream::client::StreamerClient;
use bookstream::orderbook::BookState;
use bookstream::types::{format_e8, Side};
use bookstream::{Config, Session, SessionEnd};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bookstream=info")),
        )
        .init();

    let config = Config::from_env()?;
    println!("Streaming {} from {}", config.pair(), config.address());

    let client = Arc::new(StreamerClient::new(&config)?);
    let session = Session::start(config, client)?;
    let book = session.book();

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                session.stop();
                break;
            }
            end = session.done() => {
                println!("Session ended on its own: {:?}", end);
                break;
            }
            _ = ticker.tick() => {
                if book.state() != BookState::Synchronized {
                    println!("Waiting for snapshot ({} updates queued)", session.queue_len());
                    continue;
                }

                let fmt_level = |level: Option<(i64, i64)>| match level {
                    Some((price, volume)) => format!("{} x {}", format_e8(price, 2), format_e8(volume, 6)),
                    None => "-".to_string(),
                };
                println!(
                    "seq {:>10}  bid {:>24}  ask {:>24}  spread {}",
                    book.sequence(),
                    fmt_level(book.best_bid()),
                    fmt_level(book.best_ask()),
                    book.spread().map(|s| format_e8(s, 2)).unwrap_or_else(|| "-".into()),
                );

                for (price, volume) in book.depth(Side::Ask, 5).iter().rev() {
                    println!("    ask {:>14} {:>16}", format_e8(*price, 2), format_e8(*volume, 6));
                }
                for (price, volume) in book.depth(Side::Bid, 5) {
                    println!("    bid {:>14} {:>16}", format_e8(price, 2), format_e8(volume, 6));
                }
            }
        }
    }

    match session.done().await {
        SessionEnd::Failed(e) => {
            eprintln!("Session failed: {}", e);
            std::process::exit(1);
        }
        end => println!("Session ended: {:?}", end),
    }

    // Final full book
    println!("{}", book);
    Ok(())
}

//! In-memory transport for driving sessions from tests.
//!
//! Snapshot requests are answered from a script pushed by the test; a request
//! with nothing scripted waits until something is. Updates are fed through an
//! mpsc channel, and dropping the [`Feed`] ends the stream cleanly.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bookstream::client::{Transport, UpdateStream};
use bookstream::types::{Snapshot, Update};
use bookstream::Error;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

/// Transport backed by in-memory scripts
#[derive(Debug)]
pub struct MemoryTransport {
    snapshots: Mutex<VecDeque<Result<Snapshot, Error>>>,
    scripted: Notify,
    stream: Mutex<Option<mpsc::UnboundedReceiver<Result<Update, Error>>>>,
    refuse_stream: AtomicBool,
    fetches: AtomicUsize,
}

/// Sending side of the update stream
#[derive(Debug, Clone)]
pub struct Feed {
    tx: mpsc::UnboundedSender<Result<Update, Error>>,
}

impl Feed {
    /// Deliver an update
    pub fn send(&self, update: Update) {
        self.tx.send(Ok(update)).expect("stream receiver dropped");
    }

    /// Deliver updates in order
    pub fn send_all(&self, updates: impl IntoIterator<Item = Update>) {
        for update in updates {
            self.send(update);
        }
    }

    /// Whether the session has dropped its end of the stream
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Break the stream with an error
    pub fn fail(&self, error: Error) {
        self.tx.send(Err(error)).expect("stream receiver dropped");
    }
}

impl MemoryTransport {
    /// Create a transport and the feed for its update stream
    pub fn new() -> (Arc<Self>, Feed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            snapshots: Mutex::new(VecDeque::new()),
            scripted: Notify::new(),
            stream: Mutex::new(Some(rx)),
            refuse_stream: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        });
        (transport, Feed { tx })
    }

    /// Queue the answer to a future snapshot request
    pub fn push_snapshot(&self, snapshot: Snapshot) {
        self.push_response(Ok(snapshot));
    }

    /// Queue a failed snapshot request
    pub fn push_error(&self, error: Error) {
        self.push_response(Err(error));
    }

    fn push_response(&self, response: Result<Snapshot, Error>) {
        self.snapshots.lock().push_back(response);
        self.scripted.notify_one();
    }

    /// Make `stream_updates` fail
    pub fn refuse_stream(&self) {
        self.refuse_stream.store(true, Ordering::SeqCst);
    }

    /// Number of snapshot requests made so far
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    type Stream = MemoryStream;

    async fn get_order_book(&self, _pair: &str) -> Result<Snapshot, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        loop {
            let next = self.snapshots.lock().pop_front();
            if let Some(response) = next {
                return response;
            }
            self.scripted.notified().await;
        }
    }

    async fn stream_updates(&self, _pair: &str) -> Result<MemoryStream, Error> {
        if self.refuse_stream.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.stream
            .lock()
            .take()
            .map(|rx| MemoryStream { rx })
            .ok_or(Error::ConnectionClosed)
    }
}

/// Receiving side of the update stream
#[derive(Debug)]
pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Result<Update, Error>>,
}

impl UpdateStream for MemoryStream {
    async fn next(&mut self) -> Option<Result<Update, Error>> {
        self.rx.recv().await
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Await `future`, failing the test after five seconds
pub async fn within<F: Future>(what: &str, future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

/// Install a test subscriber once; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

//! Replication session for one pair.
//!
//! A session runs two activities on the Tokio runtime:
//!
//! - **ingestion** reads the update stream and appends to the [`UpdateQueue`]
//! - **processing** loads a snapshot, then drains the queue into the
//!   [`SharedOrderBook`], resynchronizing whenever the book diverges
//!
//! The stream is opened before the first snapshot is requested, so no update
//! published between the two is lost; queued updates the snapshot already
//! covers are discarded once it is loaded.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bookstream::client::StreamerClient;
//! use bookstream::{Config, Session};
//!
//! # async fn example() -> bookstream::Result<()> {
//! let config = Config::new("localhost:8080", "XBTZAR");
//! let client = Arc::new(StreamerClient::new(&config)?);
//! let handle = Session::start(config, client)?;
//!
//! let book = handle.current_book();
//! println!("{} orders at sequence {}", book.len(), book.sequence);
//!
//! handle.stop();
//! println!("session ended: {:?}", handle.done().await);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::client::{Transport, UpdateStream};
use crate::config::Config;
use crate::error::Error;
use crate::fetcher::{stopped, SnapshotFetcher};
use crate::orderbook::{ApplyOutcome, BookState, SharedOrderBook};
use crate::queue::UpdateQueue;
use crate::types::Snapshot;

/// Longest we wait for the stream to close politely during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a session ended
#[derive(Debug, Clone)]
pub enum SessionEnd {
    /// [`SessionHandle::stop`] was called
    Stopped,
    /// The server ended the update stream cleanly
    StreamEnded,
    /// The stream broke, could not be opened, or snapshots kept failing
    Failed(Arc<Error>),
}

impl SessionEnd {
    /// Whether the session ended because of an error
    pub fn is_failure(&self) -> bool {
        matches!(self, SessionEnd::Failed(_))
    }

    /// The error that ended the session, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            SessionEnd::Failed(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    fn failed(error: Error) -> Self {
        SessionEnd::Failed(Arc::new(error))
    }

    fn unreported() -> Self {
        SessionEnd::failed(Error::TaskFailed("session exited without reporting".into()))
    }

    fn from_join(result: Result<SessionEnd, JoinError>) -> Self {
        result.unwrap_or_else(|e| SessionEnd::failed(Error::TaskFailed(e.to_string())))
    }
}

/// Starts replication sessions
#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
}

impl Session {
    /// Create a session for a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the address or pair is
    /// malformed.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Validate `config` and start replicating over `transport`.
    ///
    /// Returns as soon as the session is running; the book fills in the
    /// background. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the address or pair is
    /// malformed. Everything after that is reported through
    /// [`SessionHandle::done`].
    pub fn start<T: Transport>(config: Config, transport: Arc<T>) -> Result<SessionHandle, Error> {
        Ok(Self::new(config)?.spawn(transport))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start replicating over `transport`
    pub fn spawn<T: Transport>(&self, transport: Arc<T>) -> SessionHandle {
        let pair = self.config.pair().to_string();
        let book = Arc::new(SharedOrderBook::new(pair.clone()));
        let queue = Arc::new(UpdateQueue::with_capacity(self.config.queue_capacity()));
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let (done_tx, done_rx) = watch::channel(None);

        let core = Arc::new(Core {
            fetcher: SnapshotFetcher::new(
                Arc::clone(&transport),
                pair.clone(),
                self.config.retry().clone(),
            ),
            transport,
            book: Arc::clone(&book),
            queue: Arc::clone(&queue),
        });

        info!(pair = %pair, queue_capacity = ?queue.capacity(), "Session starting");
        let task = tokio::spawn(run(core, Arc::clone(&stop_tx), stop_rx, done_tx));

        SessionHandle {
            pair,
            book,
            queue,
            stop_tx,
            done_rx,
            task: Some(task),
        }
    }
}

/// Handle to a running session
///
/// Dropping the handle stops the session. Readers holding the
/// [`SharedOrderBook`] from [`SessionHandle::book`] keep the last state.
#[derive(Debug)]
pub struct SessionHandle {
    pair: String,
    book: Arc<SharedOrderBook>,
    queue: Arc<UpdateQueue>,
    stop_tx: Arc<watch::Sender<bool>>,
    done_rx: watch::Receiver<Option<SessionEnd>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Consistent copy of the replicated book
    pub fn current_book(&self) -> Snapshot {
        self.book.snapshot()
    }

    /// Shared book, for the richer read helpers
    pub fn book(&self) -> Arc<SharedOrderBook> {
        Arc::clone(&self.book)
    }

    /// Synchronization state of the book
    pub fn state(&self) -> BookState {
        self.book.state()
    }

    /// Number of received updates not yet applied
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Pair being replicated
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Ask the session to stop.
    ///
    /// Returns immediately; await [`SessionHandle::done`] to know it has.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait until the session has ended and both activities have exited
    pub async fn done(&self) -> SessionEnd {
        let mut done_rx = self.done_rx.clone();
        let end = done_rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|end| (*end).clone());

        end.unwrap_or_else(SessionEnd::unreported)
    }

    /// Whether the session has ended
    pub fn is_done(&self) -> bool {
        self.done_rx.borrow().is_some()
    }

    /// Wait for the session task to finish and return how it ended
    pub async fn join(mut self) -> SessionEnd {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                return SessionEnd::failed(Error::TaskFailed(e.to_string()));
            }
        }
        let end = self.done_rx.borrow().clone();
        end.unwrap_or_else(SessionEnd::unreported)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

/// State shared by the session's tasks
struct Core<T: Transport> {
    transport: Arc<T>,
    fetcher: SnapshotFetcher<T>,
    book: Arc<SharedOrderBook>,
    queue: Arc<UpdateQueue>,
}

impl<T: Transport> Core<T> {
    fn pair(&self) -> &str {
        self.book.pair()
    }

    /// Load a fresh snapshot and drop the queued updates it covers
    ///
    /// A snapshot older than the book is refetched rather than loaded.
    async fn synchronize(&self, stop: &mut watch::Receiver<bool>) -> Result<(), SessionEnd> {
        let current = self.book.sequence();
        let snapshot = match self.fetcher.fetch_since(stop, current).await {
            Ok(snapshot) => snapshot,
            Err(Error::Cancelled) => return Err(SessionEnd::Stopped),
            Err(e) => return Err(SessionEnd::failed(e)),
        };

        self.book.initialize(&snapshot);
        let discarded = self.queue.discard_through(snapshot.sequence);
        info!(
            pair = %self.pair(),
            sequence = snapshot.sequence,
            orders = snapshot.len(),
            discarded,
            "Order book synchronized"
        );
        Ok(())
    }
}

/// Which activity finished first
enum First {
    Stop,
    Ingest(SessionEnd),
    Process(SessionEnd),
}

async fn run<T: Transport>(
    core: Arc<Core<T>>,
    stop_tx: Arc<watch::Sender<bool>>,
    mut stop_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<Option<SessionEnd>>,
) {
    let end = supervise(&core, &stop_tx, &mut stop_rx).await;
    match &end {
        SessionEnd::Failed(e) => warn!(pair = %core.pair(), error = %e, "Session failed"),
        end => info!(pair = %core.pair(), ?end, "Session ended"),
    }
    done_tx.send_replace(Some(end));
}

async fn supervise<T: Transport>(
    core: &Arc<Core<T>>,
    stop_tx: &watch::Sender<bool>,
    stop_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let stream = tokio::select! {
        biased;
        _ = stopped(stop_rx) => return SessionEnd::Stopped,
        stream = core.transport.stream_updates(core.pair()) => stream,
    };
    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => return SessionEnd::failed(e),
    };
    info!(pair = %core.pair(), "Update stream opened");

    let mut ingest_task = tokio::spawn(ingest(
        stream,
        Arc::clone(&core.queue),
        stop_rx.clone(),
    ));
    let mut process_task = tokio::spawn(process(Arc::clone(core), stop_rx.clone()));

    let first = tokio::select! {
        _ = stopped(stop_rx) => First::Stop,
        result = &mut ingest_task => First::Ingest(SessionEnd::from_join(result)),
        result = &mut process_task => First::Process(SessionEnd::from_join(result)),
    };

    // Whatever ended first, the other activity has to go too
    stop_tx.send_replace(true);

    match first {
        First::Stop => {
            let _ = ingest_task.await;
            let _ = process_task.await;
            SessionEnd::Stopped
        }
        First::Ingest(end) => {
            let _ = process_task.await;
            end
        }
        First::Process(end) => {
            let _ = ingest_task.await;
            end
        }
    }
}

/// Stream to queue, until stop, end of stream or a stream error
async fn ingest<S: UpdateStream>(
    mut stream: S,
    queue: Arc<UpdateQueue>,
    mut stop: watch::Receiver<bool>,
) -> SessionEnd {
    let end = loop {
        let next = tokio::select! {
            biased;
            _ = stopped(&mut stop) => break SessionEnd::Stopped,
            next = stream.next() => next,
        };

        let update = match next {
            Some(Ok(update)) => update,
            Some(Err(e)) => {
                warn!(error = %e, "Update stream failed");
                break SessionEnd::failed(e);
            }
            None => {
                info!("Update stream ended");
                break SessionEnd::StreamEnded;
            }
        };

        let sequence = update.sequence;
        tokio::select! {
            biased;
            _ = stopped(&mut stop) => break SessionEnd::Stopped,
            _ = queue.enqueue(update) => {}
        }
        debug!(sequence, queue_len = queue.len(), "Update received");
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, stream.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Error closing update stream"),
        Err(_) => debug!("Timed out closing update stream"),
    }
    end
}

/// Queue to book: initial sync, then apply with resync on divergence
async fn process<T: Transport>(core: Arc<Core<T>>, mut stop: watch::Receiver<bool>) -> SessionEnd {
    if let Err(end) = core.synchronize(&mut stop).await {
        return end;
    }

    loop {
        let update = tokio::select! {
            biased;
            _ = stopped(&mut stop) => return SessionEnd::Stopped,
            update = core.queue.dequeue() => update,
        };

        match core.book.apply(&update) {
            Ok(ApplyOutcome::Applied) => {
                debug!(
                    sequence = update.sequence,
                    queue_len = core.queue.len(),
                    "Update applied"
                );
            }
            Ok(ApplyOutcome::Stale) => {
                debug!(sequence = update.sequence, "Stale update skipped");
            }
            Err(e) => {
                // Any rejected update means the replica can no longer be trusted
                warn!(
                    pair = %core.pair(),
                    sequence = update.sequence,
                    error = %e,
                    "Order book diverged, resynchronizing"
                );
                core.book.mark_needs_resync();
                if let Err(end) = core.synchronize(&mut stop).await {
                    return end;
                }
            }
        }
    }
}

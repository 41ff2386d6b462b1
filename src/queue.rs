//! FIFO buffer between the update stream and the order book.
//!
//! The ingestion task only ever touches the queue, never the book, so a slow
//! apply or a long resync cannot hold up reading from the socket. The queue
//! has its own lock, which is never held across a book operation or an
//! `.await`.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::{Sequence, Update};

/// Thread-safe FIFO of updates with polling and waiting dequeue.
///
/// Unbounded by default. With a capacity, [`UpdateQueue::enqueue`] waits for
/// space (backpressure) and [`UpdateQueue::try_enqueue`] hands the update
/// back instead.
///
/// Intended for one producer and one consumer; extra waiters on either side
/// are woken one at a time.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    items: Mutex<VecDeque<Update>>,
    capacity: Option<usize>,
    available: Notify,
    space: Notify,
}

impl UpdateQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding at most `capacity` updates (minimum 1)
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Create a queue from an optional capacity
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::new(),
        }
    }

    /// Get the configured capacity
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Append an update without waiting.
    ///
    /// # Errors
    ///
    /// Returns the update if the queue is bounded and full.
    pub fn try_enqueue(&self, update: Update) -> Result<(), Update> {
        {
            let mut items = self.items.lock();
            if self.capacity.is_some_and(|cap| items.len() >= cap) {
                return Err(update);
            }
            items.push_back(update);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Append an update, waiting for space if the queue is bounded and full
    pub async fn enqueue(&self, update: Update) {
        let mut update = update;
        loop {
            match self.try_enqueue(update) {
                Ok(()) => return,
                Err(rejected) => {
                    update = rejected;
                    self.space.notified().await;
                }
            }
        }
    }

    /// Remove the oldest update, or `None` if the queue is empty
    pub fn try_dequeue(&self) -> Option<Update> {
        let update = self.items.lock().pop_front();
        if update.is_some() {
            self.space.notify_one();
        }
        update
    }

    /// Remove the oldest update, waiting until one is available
    pub async fn dequeue(&self) -> Update {
        loop {
            if let Some(update) = self.try_dequeue() {
                return update;
            }
            // notify_one stores a permit when nobody is waiting yet, so an
            // enqueue between the check above and this await is not lost
            self.available.notified().await;
        }
    }

    /// Drop every queued update with `sequence <= through`.
    ///
    /// The remaining updates keep their order. Returns how many were dropped.
    pub fn discard_through(&self, through: Sequence) -> usize {
        let dropped = {
            let mut items = self.items.lock();
            let before = items.len();
            items.retain(|u| u.sequence > through);
            before - items.len()
        };
        if dropped > 0 {
            self.space.notify_one();
        }
        dropped
    }

    /// Drop everything, returning how many updates were removed
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut items = self.items.lock();
            let n = items.len();
            items.clear();
            n
        };
        if dropped > 0 {
            self.space.notify_one();
        }
        dropped
    }

    /// Number of queued updates
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Sequence of the oldest queued update
    pub fn front_sequence(&self) -> Option<Sequence> {
        self.items.lock().front().map(|u| u.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    fn sequences(queue: &UpdateQueue) -> Vec<Sequence> {
        std::iter::from_fn(|| queue.try_dequeue())
            .map(|u| u.sequence)
            .collect()
    }

    #[test]
    fn test_fifo() {
        let queue = UpdateQueue::new();
        assert_eq!(queue.len(), 0);

        queue.try_enqueue(Update::new(1)).unwrap();
        assert_eq!(queue.len(), 1);
        queue.try_enqueue(Update::new(2)).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_dequeue().map(|u| u.sequence), Some(1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_dequeue().map(|u| u.sequence), Some(2));
        assert_eq!(queue.len(), 0);
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_bounded_rejects_when_full() {
        let queue = UpdateQueue::bounded(2);
        assert_eq!(queue.capacity(), Some(2));

        queue.try_enqueue(Update::new(1)).unwrap();
        queue.try_enqueue(Update::new(2)).unwrap();
        let rejected = queue.try_enqueue(Update::new(3)).unwrap_err();
        assert_eq!(rejected.sequence, 3);

        queue.try_dequeue();
        queue.try_enqueue(Update::new(3)).unwrap();
        assert_eq!(sequences(&queue), vec![2, 3]);
    }

    #[test]
    fn test_dequeue_waits_for_enqueue() {
        let queue = UpdateQueue::new();
        let mut dequeue = task::spawn(queue.dequeue());

        assert_pending!(dequeue.poll());

        queue.try_enqueue(Update::new(7)).unwrap();
        assert!(dequeue.is_woken());
        let update = assert_ready!(dequeue.poll());
        assert_eq!(update.sequence, 7);
    }

    #[test]
    fn test_enqueue_waits_for_space() {
        let queue = UpdateQueue::bounded(1);
        queue.try_enqueue(Update::new(1)).unwrap();

        let mut enqueue = task::spawn(queue.enqueue(Update::new(2)));
        assert_pending!(enqueue.poll());

        assert_eq!(queue.try_dequeue().map(|u| u.sequence), Some(1));
        assert!(enqueue.is_woken());
        assert_ready!(enqueue.poll());
        drop(enqueue);

        assert_eq!(sequences(&queue), vec![2]);
    }

    #[test]
    fn test_discard_through() {
        let queue = UpdateQueue::new();
        for seq in [48, 49, 50, 51, 52] {
            queue.try_enqueue(Update::new(seq)).unwrap();
        }

        assert_eq!(queue.discard_through(50), 3);
        assert_eq!(queue.front_sequence(), Some(51));
        assert_eq!(sequences(&queue), vec![51, 52]);
    }

    #[test]
    fn test_discard_keeps_order_of_out_of_order_updates() {
        let queue = UpdateQueue::new();
        for seq in [55, 40, 53, 50] {
            queue.try_enqueue(Update::new(seq)).unwrap();
        }

        assert_eq!(queue.discard_through(50), 2);
        assert_eq!(sequences(&queue), vec![55, 53]);
    }

    #[test]
    fn test_clear() {
        let queue = UpdateQueue::new();
        queue.try_enqueue(Update::new(1)).unwrap();
        queue.try_enqueue(Update::new(2)).unwrap();

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_producer_consumer_keeps_order() {
        use std::sync::Arc;

        let queue = Arc::new(UpdateQueue::bounded(8));
        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for seq in 1..=500 {
                    queue.enqueue(Update::new(seq)).await;
                }
            })
        };

        for expected in 1..=500 {
            assert_eq!(queue.dequeue().await.sequence, expected);
        }
        producer.await.unwrap();
        assert!(queue.is_empty());
    }
}

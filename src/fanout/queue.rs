//! Bounded job queue shared by the worker pool.

use crate::types::Job;
use tokio::sync::{Mutex, mpsc};

/// Ordered queue of pending jobs, closed once every index has been enqueued.
///
/// The producer side is used exactly once by [`JobQueue::enqueue_all`]; consumers
/// share the receiver through [`JobQueue::dequeue`]. Capacity equals the batch size,
/// so the producer never waits on a full queue.
pub struct JobQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: Mutex<mpsc::Receiver<Job>>,
    capacity: usize,
}

impl JobQueue {
    /// Create a queue able to hold `capacity` jobs without blocking the producer
    pub fn new(capacity: usize) -> Self {
        // mpsc channels require a non-zero bound; an empty batch still gets a queue
        let bound = capacity.max(1);
        let (sender, receiver) = mpsc::channel(bound);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
            capacity: bound,
        }
    }

    /// Number of jobs the queue holds without back-pressure
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue jobs for indices `0..n` in ascending order, then close the queue.
    ///
    /// Returns the number of jobs enqueued. Calling this a second time is a no-op
    /// returning 0: the queue is already closed.
    pub async fn enqueue_all(&self, n: usize) -> usize {
        let Some(sender) = self.sender.lock().await.take() else {
            tracing::warn!("job queue already closed, ignoring enqueue_all");
            return 0;
        };

        let mut enqueued = 0;
        for index in 0..n {
            if sender.send(Job::new(index)).await.is_err() {
                break;
            }
            enqueued += 1;
        }

        drop(sender);
        enqueued
    }

    /// Take the next job, waiting while the queue is empty but still open.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }

    /// Close the queue without enqueuing anything further.
    ///
    /// Jobs already buffered are still handed out; waiting consumers see `None`
    /// once those are gone.
    pub async fn close(&self) {
        // The queue owns the only sender, so dropping it closes the channel
        self.sender.lock().await.take();
    }
}

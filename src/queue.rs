use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{timeout, Duration};

/// Default number of encoded lines the queue holds before dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Counters shared by every clone of a [`LogQueue`].
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Lines offered to the queue.
    pub total: AtomicU64,
    /// Lines accepted into the queue.
    pub enqueued: AtomicU64,
    /// Lines dropped because the queue was full or closed.
    pub dropped: AtomicU64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer side of the bounded line queue.
#[derive(Clone, Debug)]
pub struct LogQueue {
    sender: mpsc::Sender<String>,
    stats: Arc<QueueStats>,
}

/// Consumer side of the bounded line queue, owned by the writer.
#[derive(Debug)]
pub struct LogReceiver {
    receiver: mpsc::Receiver<String>,
}

/// Outcome of [`LogReceiver::dequeue`].
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    Line(String),
    Timeout,
    Closed,
}

/// Create a queue holding at most `capacity` lines (at least one).
pub fn bounded(capacity: usize) -> (LogQueue, LogReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        LogQueue {
            sender,
            stats: Arc::new(QueueStats::default()),
        },
        LogReceiver { receiver },
    )
}

impl LogQueue {
    /// Offer a line without waiting.
    ///
    /// Returns `false` when the line was dropped because the queue is full
    /// or the writer has shut down.
    pub fn enqueue(&self, line: String) -> bool {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(line) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }
}

impl LogReceiver {
    /// Wait up to `wait` for the next line.
    pub async fn dequeue(&mut self, wait: Duration) -> Dequeued {
        match timeout(wait, self.receiver.recv()).await {
            Ok(Some(line)) => Dequeued::Line(line),
            Ok(None) => Dequeued::Closed,
            Err(_) => Dequeued::Timeout,
        }
    }

    /// Take the next line only if one is already buffered.
    pub fn try_dequeue(&mut self) -> Option<String> {
        match self.receiver.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Refuse further lines; already-buffered ones stay readable.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

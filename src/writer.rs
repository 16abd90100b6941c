use crate::encoder::internal_error_line;
use crate::queue::{Dequeued, LogReceiver};
use crate::sink::LineSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::error;

/// Queue consumer plus its sink. Lives behind a mutex so the lifecycle
/// controller can drain it once the background task is gone.
pub struct LogWriter {
    receiver: LogReceiver,
    sink: Box<dyn LineSink>,
    written: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl LogWriter {
    pub fn new(receiver: LogReceiver, sink: Box<dyn LineSink>) -> Self {
        Self {
            receiver,
            sink,
            written: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Lines successfully handed to the sink.
    pub fn written(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.written)
    }

    /// Lines the sink rejected.
    pub fn failed(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failed)
    }

    /// Write one line; a failure is reported and swallowed.
    pub async fn write(&mut self, line: &str) {
        match self.sink.write_line(line).await {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(target: crate::INTERNAL_TARGET, error = %e, "failed to write log line");
                // Best effort: if the sink is still broken this fails too.
                let entry = internal_error_line("Failed to write log line", &e.to_string());
                let _ = self.sink.write_line(&entry).await;
            }
        }
    }

    /// Write every line already buffered in the queue. Returns how many were taken.
    pub async fn drain(&mut self) -> usize {
        let mut taken = 0;
        while let Some(line) = self.receiver.try_dequeue() {
            self.write(&line).await;
            taken += 1;
        }
        taken
    }

    /// Stop accepting new lines, then drain and flush what is left.
    pub async fn finish(&mut self) -> usize {
        self.receiver.close();
        let taken = self.drain().await;
        if let Err(e) = self.sink.flush().await {
            error!(target: crate::INTERNAL_TARGET, error = %e, "failed to flush log sink");
        }
        taken
    }
}

/// Spawn the background loop that moves lines from the queue to the sink.
///
/// The loop waits at most `poll_interval` per dequeue, then checks `stop`.
/// Once `stop` is set it drains whatever is still queued and exits.
pub fn spawn_writer(
    writer: Arc<Mutex<LogWriter>>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut writer = writer.lock().await;
        loop {
            match writer.receiver.dequeue(poll_interval).await {
                Dequeued::Line(line) => writer.write(&line).await,
                Dequeued::Timeout => {}
                Dequeued::Closed => break,
            }

            if stop.load(Ordering::Acquire) {
                writer.drain().await;
                break;
            }
        }
    })
}

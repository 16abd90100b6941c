use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for encoded JSON lines.
///
/// The writer task is the only caller, so implementations may keep
/// mutable state (active file, current date) without locking.
#[async_trait]
pub trait LineSink: Send {
    /// Append a single encoded line.
    ///
    /// **Parameters**
    /// - `line`: one JSON object without a trailing newline.
    ///
    /// **Returns**
    /// - `Ok(())` once the line is durable at the destination.
    /// - `Err(..)` if the write failed. The writer reports the failure and
    ///   moves on to the next line; it never retries.
    async fn write_line(&mut self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush anything the sink buffers. Default implementation is a no-op.
    async fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

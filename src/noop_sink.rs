use crate::sink::LineSink;
use async_trait::async_trait;
use std::error::Error;

/// A sink that simply drops all lines.
///
/// Useful for measuring the overhead of encoding and queueing without any
/// disk I/O.
#[derive(Clone, Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl LineSink for NoopSink {
    async fn write_line(&mut self, _line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

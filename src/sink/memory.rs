//! In-process sinks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::probe::Sample;
use crate::sink::{Sink, SinkError};

/// Captures samples in memory, in the order they were written.
///
/// Clones share the same buffer. Once [`close`](MemorySink::close) is called
/// every write fails with [`SinkError::Closed`].
#[derive(Clone, Default)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<Sample>>>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink")
            .field("len", &self.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of captured samples.
    pub fn samples(&self) -> Vec<Sample> {
        self.lock().clone()
    }

    /// Number of captured samples.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Reject all further writes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sample>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, sample: &Sample) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SinkError::Closed);
        }
        self.lock().push(sample.clone());
        Ok(())
    }
}

/// Logs every sample at info level and stores nothing.
#[derive(Debug, Default)]
pub struct LogSink {
    written: AtomicU64,
}

impl LogSink {
    /// Create a log-only sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples logged so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn write(&self, sample: &Sample) -> Result<(), SinkError> {
        self.written.fetch_add(1, Ordering::Relaxed);
        match &sample.latency {
            Some(latency) => tracing::info!(
                host = %sample.host,
                sent = sample.packets_sent,
                received = sample.packets_received,
                loss = sample.loss_percent,
                min_ms = latency.min,
                avg_ms = latency.avg,
                max_ms = latency.max,
                "Sample"
            ),
            None => tracing::info!(
                host = %sample.host,
                sent = sample.packets_sent,
                received = sample.packets_received,
                loss = sample.loss_percent,
                "Sample"
            ),
        }
        Ok(())
    }
}

//! Core sink trait.

use crate::probe::Sample;
use crate::sink::SinkError;

/// Receives samples from measurement pipelines.
///
/// Implementations are shared by all pipelines and must tolerate concurrent
/// calls. A returned error is fatal to the calling pipeline; no retry is
/// attempted by the caller.
#[async_trait::async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Persist one sample.
    async fn write(&self, sample: &Sample) -> Result<(), SinkError>;
}

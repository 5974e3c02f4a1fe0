//! Probe and pipeline error types.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::sink::SinkError;

/// Errors starting the fping process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The binary does not exist.
    #[error("probe binary not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The process could not be started.
    #[error("failed to start probe '{}': {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No hosts to probe.
    #[error("no hosts configured")]
    NoHosts,

    /// A requested stdio pipe was not available.
    #[error("probe {0} pipe unavailable")]
    MissingPipe(&'static str),
}

/// Errors ending a measurement pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Probe could not be launched.
    #[error("launch failed: {0}")]
    Launch(#[from] LaunchError),

    /// Sink rejected a sample.
    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),

    /// The report stream closed because the probe exited.
    #[error("probe exited unexpectedly ({})", describe_status(.status))]
    ProbeExited { status: Option<ExitStatus> },

    /// The report stream could not be read.
    #[error("report stream failed: {0}")]
    Stream(#[source] std::io::Error),
}

fn describe_status(status: &Option<ExitStatus>) -> String {
    match status {
        Some(s) => s.to_string(),
        None => "exit status unknown".to_string(),
    }
}

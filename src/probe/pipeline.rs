//! Measurement pipeline for one address family.
//!
//! Starts fping, drains its primary output, and runs a [`ReportReader`] over
//! its diagnostic stream until the stream closes, the sink fails, or a stop
//! is requested. The probe is never restarted here.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use strum_macros::{AsRefStr, Display};
use tokio::process::Child;
use tokio::sync::watch;

use crate::probe::error::PipelineError;
use crate::probe::launcher::{DEFAULT_REPORT_INTERVAL, ProbeCommand, ProbeProcess};
use crate::probe::reader::{ReaderExit, ReaderStats, ReportReader, drain_output};
use crate::probe::types::AddressFamily;
use crate::sink::Sink;

/// How long to wait for fping to exit after its report stream closed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Pipeline lifecycle: `Starting → Running → (Failed | Stopped)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PipelineState {
    /// Launching the probe.
    Starting,
    /// Reading reports and forwarding samples.
    Running,
    /// Ended by an error or an unexpected probe exit.
    Failed,
    /// Ended on request.
    Stopped,
}

impl PipelineState {
    /// True for `Failed` and `Stopped`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}

/// Settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Address family probed.
    pub family: AddressFamily,
    /// fping binary.
    pub fping_path: PathBuf,
    /// Hosts, in probe order.
    pub hosts: Vec<String>,
    /// Report aggregation window.
    pub report_interval: Duration,
}

impl PipelineConfig {
    /// Create a pipeline configuration with the default report interval.
    pub fn new(family: AddressFamily, fping_path: impl Into<PathBuf>, hosts: Vec<String>) -> Self {
        Self {
            family,
            fping_path: fping_path.into(),
            hosts,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    /// Set the report aggregation window.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// fping invocation for this pipeline.
    pub fn command(&self) -> ProbeCommand {
        ProbeCommand::new(&self.fping_path, self.family, self.hosts.clone())
            .with_report_interval(self.report_interval)
    }
}

/// Summary returned by a pipeline that was stopped on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub family: AddressFamily,
    pub stats: ReaderStats,
    /// Lines drained from the probe's primary output.
    pub output_lines: u64,
}

/// fping → parser → sink for one address family.
pub struct Pipeline {
    config: PipelineConfig,
    sink: Arc<dyn Sink>,
    state: watch::Sender<PipelineState>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("sink", &self.sink.name())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline writing to `sink`.
    pub fn new(config: PipelineConfig, sink: Arc<dyn Sink>) -> Self {
        let (state, _) = watch::channel(PipelineState::Starting);
        Self {
            config,
            sink,
            state,
        }
    }

    /// Address family of this pipeline.
    pub fn family(&self) -> AddressFamily {
        self.config.family
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Run until the probe exits, the sink fails, or `stop` turns true.
    ///
    /// # Returns
    ///
    /// - `Ok(PipelineReport)`: stopped on request (state `Stopped`)
    /// - `Err(PipelineError::Launch)`: fping could not be started
    /// - `Err(PipelineError::ProbeExited)`: report stream closed
    /// - `Err(PipelineError::Sink)`: a sample could not be written
    ///
    /// Every error leaves the pipeline in state `Failed`.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> Result<PipelineReport, PipelineError> {
        let family = self.config.family;
        self.transition(PipelineState::Starting);

        let ProbeProcess {
            mut child,
            reports,
            output,
        } = match self.config.command().spawn() {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(family = %family, error = %e, "Failed to launch probe");
                self.transition(PipelineState::Failed);
                return Err(e.into());
            }
        };

        let drain = tokio::spawn(drain_output(family, output));
        self.transition(PipelineState::Running);

        let mut reader = ReportReader::new(family, Arc::clone(&self.sink));
        let result = reader.run(reports, &mut stop).await;
        let stats = reader.stats();

        let outcome = match result {
            Ok(ReaderExit::Stopped) => {
                terminate(&mut child, family).await;
                Ok(())
            }
            Ok(ReaderExit::EndOfStream) => {
                let status = wait_for_exit(&mut child, family).await;
                tracing::error!(family = %family, status = ?status, "Probe report stream closed");
                Err(PipelineError::ProbeExited { status })
            }
            Err(e) => {
                terminate(&mut child, family).await;
                Err(e)
            }
        };

        let output_lines = drain.await.unwrap_or_default();
        tracing::info!(
            family = %family,
            lines = stats.lines,
            samples = stats.samples,
            skipped = stats.skipped,
            read_errors = stats.read_errors,
            output_lines,
            "Pipeline finished"
        );

        match outcome {
            Ok(()) => {
                self.transition(PipelineState::Stopped);
                Ok(PipelineReport {
                    family,
                    stats,
                    output_lines,
                })
            }
            Err(e) => {
                self.transition(PipelineState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&self, next: PipelineState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(
            family = %self.config.family,
            from = %previous,
            to = %next,
            "Pipeline state changed"
        );
    }
}

/// Kill the probe and reap it.
async fn terminate(child: &mut Child, family: AddressFamily) {
    if let Err(e) = child.start_kill() {
        // Already exited.
        tracing::debug!(family = %family, error = %e, "Probe kill skipped");
    }
    match child.wait().await {
        Ok(status) => tracing::debug!(family = %family, status = %status, "Probe terminated"),
        Err(e) => tracing::warn!(family = %family, error = %e, "Failed to reap probe"),
    }
}

/// Wait briefly for the probe to exit on its own, killing it otherwise.
async fn wait_for_exit(child: &mut Child, family: AddressFamily) -> Option<ExitStatus> {
    match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::warn!(family = %family, error = %e, "Failed to collect probe exit status");
            None
        }
        Err(_) => {
            tracing::warn!(family = %family, "Probe still running after closing its report stream");
            terminate(child, family).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::error::LaunchError;
    use crate::sink::MemorySink;

    #[test]
    fn test_pipeline_config_command() {
        let config = PipelineConfig::new(AddressFamily::V6, "/opt/fping", vec!["c".into(), "d".into()])
            .with_report_interval(Duration::from_secs(5));
        let cmd = config.command();
        assert_eq!(cmd.family(), AddressFamily::V6);
        assert_eq!(cmd.hosts(), &["c".to_string(), "d".to_string()]);
        assert_eq!(cmd.path(), std::path::Path::new("/opt/fping"));
        assert!(cmd.args().windows(2).any(|w| w == ["-Q", "5"]));
    }

    #[test]
    fn test_state_terminal() {
        assert!(!PipelineState::Starting.is_terminal());
        assert!(!PipelineState::Running.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(PipelineState::Stopped.is_terminal());
        assert_eq!(PipelineState::Running.to_string(), "running");
    }

    #[tokio::test]
    async fn test_launch_failure_marks_failed() {
        let config = PipelineConfig::new(
            AddressFamily::V4,
            "/nonexistent/fping",
            vec!["a".into()],
        );
        let pipeline = Pipeline::new(config, Arc::new(MemorySink::new()));
        let state = pipeline.subscribe();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let err = pipeline.run(stop_rx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Launch(LaunchError::NotFound(_))));
        assert_eq!(*state.borrow(), PipelineState::Failed);
    }
}

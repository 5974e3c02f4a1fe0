//! fping process launcher.
//!
//! Builds the fixed argument set for one address family and starts fping in
//! loop mode with periodic summary reports on stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::probe::error::LaunchError;
use crate::probe::types::AddressFamily;

/// Default fping location.
pub const DEFAULT_FPING_PATH: &str = "/usr/bin/fping";

/// Default aggregation window per report (10 seconds).
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Fixed flags placed between the family selector and the report window.
///
/// - `-B 1`: backoff factor 1, probes keep a fixed interval
/// - `-D`: timestamp each reply
/// - `-r 0`: no retries
/// - `-O 0`: type of service 0
const FIXED_ARGS: [&str; 7] = ["-B", "1", "-D", "-r", "0", "-O", "0"];

/// Loop forever instead of stopping after a count.
const LOOP_FLAG: &str = "-l";

/// Summary report interval flag (seconds).
const REPORT_FLAG: &str = "-Q";

/// Invocation of fping for one address family.
#[derive(Debug, Clone)]
pub struct ProbeCommand {
    path: PathBuf,
    family: AddressFamily,
    hosts: Vec<String>,
    report_interval: Duration,
}

impl ProbeCommand {
    /// Create a command for the given binary, family and hosts.
    pub fn new(path: impl Into<PathBuf>, family: AddressFamily, hosts: Vec<String>) -> Self {
        Self {
            path: path.into(),
            family,
            hosts,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    /// Set the report aggregation window. Sub-second parts are dropped, minimum 1s.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Binary path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address family.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Hosts in probe order.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Full argument list, hosts last.
    pub fn args(&self) -> Vec<String> {
        let report_secs = self.report_interval.as_secs().max(1);

        let mut args = Vec::with_capacity(FIXED_ARGS.len() + self.hosts.len() + 4);
        args.push(self.family.flag().to_string());
        args.extend(FIXED_ARGS.iter().map(|a| a.to_string()));
        args.push(REPORT_FLAG.to_string());
        args.push(report_secs.to_string());
        args.push(LOOP_FLAG.to_string());
        args.extend(self.hosts.iter().cloned());
        args
    }

    /// Start fping with piped stdout/stderr.
    ///
    /// The child is killed when its handle is dropped.
    ///
    /// # Errors
    /// - `LaunchError::NoHosts` if the host list is empty
    /// - `LaunchError::NotFound` if the binary does not exist
    /// - `LaunchError::Spawn` for any other start failure
    pub fn spawn(&self) -> Result<ProbeProcess, LaunchError> {
        if self.hosts.is_empty() {
            return Err(LaunchError::NoHosts);
        }

        let args = self.args();
        tracing::info!(
            family = %self.family,
            path = %self.path.display(),
            hosts = ?self.hosts,
            "Starting probe"
        );
        tracing::debug!(family = %self.family, args = ?args, "Probe arguments");

        let mut child = Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LaunchError::NotFound(self.path.clone()),
                _ => LaunchError::Spawn {
                    path: self.path.clone(),
                    source: e,
                },
            })?;

        let reports = child.stderr.take().ok_or(LaunchError::MissingPipe("stderr"))?;
        let output = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"))?;

        tracing::debug!(family = %self.family, pid = ?child.id(), "Probe started");

        Ok(ProbeProcess {
            child,
            reports,
            output,
        })
    }
}

/// A running fping process with its output streams detached.
#[derive(Debug)]
pub struct ProbeProcess {
    /// Process handle.
    pub child: Child,
    /// Diagnostic stream carrying the summary reports.
    pub reports: ChildStderr,
    /// Primary output, informational only.
    pub output: ChildStdout,
}

//! Pipeline supervisor.
//!
//! Owns one Tokio task per address family, reports the first pipeline that
//! ends, and stops the rest on shutdown. Failed pipelines are not restarted.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};

use crate::probe::{AddressFamily, Pipeline, PipelineError, PipelineReport, PipelineState};

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors reported by the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The pipeline ended with an error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The pipeline task panicked or was aborted.
    #[error("pipeline task failed: {0}")]
    Task(#[from] JoinError),

    /// A pipeline for this family is already running.
    #[error("pipeline for {0} already running")]
    Duplicate(AddressFamily),
}

/// A pipeline that has ended.
#[derive(Debug)]
pub struct PipelineExit {
    pub family: AddressFamily,
    pub outcome: Result<PipelineReport, SupervisorError>,
}

impl PipelineExit {
    /// True if the pipeline stopped on request.
    pub fn is_clean(&self) -> bool {
        self.outcome.is_ok()
    }
}

type TaskOutput = (AddressFamily, Result<PipelineReport, PipelineError>);

/// Runs measurement pipelines as supervised tasks.
pub struct Supervisor {
    tasks: JoinSet<TaskOutput>,
    families: HashMap<Id, AddressFamily>,
    states: HashMap<AddressFamily, watch::Receiver<PipelineState>>,
    stop: watch::Sender<bool>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("running", &self.tasks.len())
            .field("states", &self.states())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create an empty supervisor.
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            tasks: JoinSet::new(),
            families: HashMap::new(),
            states: HashMap::new(),
            stop,
        }
    }

    /// Spawn a pipeline onto the runtime.
    ///
    /// # Errors
    /// Returns `SupervisorError::Duplicate` if a pipeline for the same family
    /// was already spawned and has not ended yet.
    pub fn spawn(&mut self, pipeline: Pipeline) -> Result<(), SupervisorError> {
        let family = pipeline.family();
        if self.families.values().any(|f| *f == family) {
            return Err(SupervisorError::Duplicate(family));
        }

        self.states.insert(family, pipeline.subscribe());
        let stop = self.stop.subscribe();
        let handle = self
            .tasks
            .spawn(async move { (family, pipeline.run(stop).await) });
        self.families.insert(handle.id(), family);

        tracing::info!(family = %family, "Pipeline spawned");
        Ok(())
    }

    /// Number of pipelines still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if no pipeline is running.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Last known state of a family's pipeline.
    pub fn state(&self, family: AddressFamily) -> Option<PipelineState> {
        self.states.get(&family).map(|rx| *rx.borrow())
    }

    /// Last known state of every spawned pipeline.
    pub fn states(&self) -> Vec<(AddressFamily, PipelineState)> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|(family, rx)| (*family, *rx.borrow()))
            .collect();
        states.sort_by_key(|(family, _)| *family);
        states
    }

    /// Wait for the next pipeline to end.
    ///
    /// Returns `None` when nothing is running.
    pub async fn next_exit(&mut self) -> Option<PipelineExit> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            if let Some(exit) = self.record_exit(joined) {
                return Some(exit);
            }
        }
        None
    }

    /// Stop all pipelines with the default timeout.
    pub async fn shutdown(self) -> Vec<PipelineExit> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Signal every pipeline to stop and wait up to `timeout` for them.
    ///
    /// Pipelines still running afterwards are aborted. Their child processes
    /// are killed when the aborted tasks drop them.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Vec<PipelineExit> {
        let running = self.tasks.len();
        self.stop.send_replace(true);
        tracing::info!(running, "Stopping pipelines");

        let mut exits = Vec::with_capacity(running);
        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = self.tasks.join_next_with_id().await {
                exits.extend(self.record_exit(joined));
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Pipeline shutdown timed out, aborting"
            );
            self.tasks.abort_all();
            while let Some(joined) = self.tasks.join_next_with_id().await {
                exits.extend(self.record_exit(joined));
            }
        } else {
            tracing::info!("Pipeline shutdown complete");
        }

        exits
    }

    fn record_exit(&mut self, joined: Result<(Id, TaskOutput), JoinError>) -> Option<PipelineExit> {
        let exit = match joined {
            Ok((id, (family, result))) => {
                self.families.remove(&id);
                PipelineExit {
                    family,
                    outcome: result.map_err(SupervisorError::from),
                }
            }
            Err(e) => {
                let Some(family) = self.families.remove(&e.id()) else {
                    tracing::error!(error = %e, "Untracked pipeline task ended");
                    return None;
                };
                PipelineExit {
                    family,
                    outcome: Err(SupervisorError::Task(e)),
                }
            }
        };

        match &exit.outcome {
            Ok(report) => tracing::info!(
                family = %exit.family,
                samples = report.stats.samples,
                "Pipeline stopped"
            ),
            Err(e) => tracing::error!(family = %exit.family, error = %e, "Pipeline failed"),
        }
        Some(exit)
    }
}

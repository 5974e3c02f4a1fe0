//! infping - fping to InfluxDB bridge
//!
//! Runs one long-lived `fping` process per address family, parses the
//! periodic per-host summaries it prints, and writes each one to InfluxDB as
//! a line-protocol point. It can be used as a library, or run as a standalone
//! binary with the `infping` executable.
//!
//! # Architecture
//!
//! - **Config**: YAML file with InfluxDB settings, fping settings and host lists
//! - **Probe**: fping launcher, report reader and position-based line parser
//! - **Sink**: InfluxDB HTTP writer plus in-memory and logging sinks
//! - **Supervisor**: Runs one pipeline per address family and stops them together
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infping::{AppConfig, InfluxSink, Pipeline, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("config.yaml")?;
//!     let sink = Arc::new(InfluxSink::connect(config.influx_sink_config()?).await?);
//!
//!     let mut supervisor = Supervisor::new();
//!     for pipeline in config.pipeline_configs() {
//!         supervisor.spawn(Pipeline::new(pipeline, sink.clone()))?;
//!     }
//!
//!     if let Some(exit) = supervisor.next_exit().await {
//!         eprintln!("{} pipeline ended", exit.family);
//!     }
//!     supervisor.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod probe;
pub mod sink;
pub mod supervisor;

pub use config::{AppConfig, ConfigError};
pub use probe::{
    AddressFamily, Latency, LaunchError, Pipeline, PipelineConfig, PipelineError, PipelineState,
    Sample, parse_report_line,
};
pub use sink::{InfluxSink, InfluxSinkConfig, LogSink, MemorySink, Sink, SinkError};
pub use supervisor::{PipelineExit, Supervisor, SupervisorError};

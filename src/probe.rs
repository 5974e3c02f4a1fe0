//! Probe Layer
//!
//! Drives fping and turns its periodic summary reports into [`Sample`]s.
//!
//! # Architecture
//!
//! ```text
//! ProbeCommand --spawn--> stderr --> ReportReader --> parse_report_line --> Sink
//!                         stdout --> drain_output (logged only)
//! ```
//!
//! - [`ProbeCommand`]: Argument set and process start for one address family
//! - [`ReportReader`]: Line loop with back-pressure toward the sink
//! - [`parse_report_line`]: Pure, position-based report parser
//! - [`Pipeline`]: Owns one probe + reader pair and its lifecycle state

mod error;
pub mod launcher;
pub mod parser;
pub mod pipeline;
pub mod reader;
mod types;

pub use error::{LaunchError, PipelineError};
pub use launcher::{DEFAULT_FPING_PATH, DEFAULT_REPORT_INTERVAL, ProbeCommand, ProbeProcess};
pub use parser::{LineError, ParseOutcome, parse_report_line, parse_report_line_at};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, PipelineState};
pub use reader::{ReaderExit, ReaderStats, ReportReader, drain_output};
pub use types::{AddressFamily, Latency, Sample};

//! Sink Layer
//!
//! Destination for parsed samples. Pipelines hold an `Arc<dyn Sink>` and await
//! every write before reading the next report line, so a slow store slows the
//! pipeline instead of dropping data.
//!
//! # Components
//!
//! - [`Sink`]: Async write trait shared by all backends
//! - [`InfluxSink`]: InfluxDB 1.x HTTP API writer (line protocol)
//! - [`MemorySink`]: In-process capture, in arrival order
//! - [`LogSink`]: Logs samples instead of storing them (dry runs)

mod error;
mod influx;
pub mod line_protocol;
mod memory;
mod traits;

pub use error::SinkError;
pub use influx::{DEFAULT_RETENTION_POLICY, DEFAULT_TIMEOUT, InfluxSink, InfluxSinkConfig};
pub use memory::{LogSink, MemorySink};
pub use traits::Sink;

//! Configuration module for infping.
//!
//! Provides YAML-based configuration loading and validation for:
//! - InfluxDB connection (url, credentials, database, measurement)
//! - fping binary path and report interval
//! - Hosts to probe per address family

mod app;
mod hosts;
mod validation;

pub use app::{AppConfig, FpingConfig, InfluxConfig};
pub use hosts::HostsConfig;
pub use validation::{ConfigError, expand_env_vars, validate_host};

// Re-export constants
pub use app::{DEFAULT_MEASUREMENT, MIN_REPORT_INTERVAL};

//! Application configuration structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::probe::{DEFAULT_FPING_PATH, DEFAULT_REPORT_INTERVAL, PipelineConfig};
use crate::sink::{DEFAULT_RETENTION_POLICY, DEFAULT_TIMEOUT, InfluxSinkConfig};

use super::hosts::HostsConfig;
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default measurement name.
pub const DEFAULT_MEASUREMENT: &str = "ping";

/// Shortest accepted report interval (1 second).
pub const MIN_REPORT_INTERVAL: Duration = Duration::from_secs(1);

fn default_measurement() -> String {
    DEFAULT_MEASUREMENT.to_string()
}

fn default_retention_policy() -> String {
    DEFAULT_RETENTION_POLICY.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_fping_path() -> PathBuf {
    PathBuf::from(DEFAULT_FPING_PATH)
}

fn default_report_interval() -> Duration {
    DEFAULT_REPORT_INTERVAL
}

// =============================================================================
// InfluxDB Configuration
// =============================================================================

/// InfluxDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Server base URL. Supports `${VAR}` expansion.
    pub url: String,

    /// Username (default: none). Supports `${VAR}` expansion.
    #[serde(default)]
    pub user: String,

    /// Password (default: none). Supports `${VAR}` expansion.
    #[serde(default)]
    pub pass: String,

    /// Target database.
    pub db: String,

    /// Measurement name (default: "ping").
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Retention policy (default: "autogen").
    #[serde(default = "default_retention_policy")]
    pub retention_policy: String,

    /// Per-request timeout (default: 10s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl InfluxConfig {
    fn validate(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| {
            ConfigError::ValidationError(format!("invalid influxdb url '{}': {}", self.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "influxdb url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        for (field, value) in [
            ("db", &self.db),
            ("measurement", &self.measurement),
            ("retention_policy", &self.retention_policy),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "influxdb {} cannot be empty",
                    field
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "influxdb timeout must be positive".to_string(),
            ));
        }

        Ok(url)
    }
}

// =============================================================================
// fping Configuration
// =============================================================================

/// Probe binary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FpingConfig {
    /// fping binary (default: "/usr/bin/fping").
    pub path: PathBuf,

    /// Report aggregation window (default: 10s, whole seconds).
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for FpingConfig {
    fn default() -> Self {
        Self {
            path: default_fping_path(),
            report_interval: default_report_interval(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// InfluxDB configuration.
    pub influxdb: InfluxConfig,

    /// Probe configuration.
    #[serde(default)]
    pub fping: FpingConfig,

    /// Hosts grouped by address family.
    #[serde(default)]
    pub hosts: HostsConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse, expand and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.expand_env();
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR}` references in connection settings.
    fn expand_env(&mut self) {
        self.influxdb.url = expand_env_vars(&self.influxdb.url);
        self.influxdb.user = expand_env_vars(&self.influxdb.user);
        self.influxdb.pass = expand_env_vars(&self.influxdb.pass);
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.influxdb.validate()?;

        if self.fping.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "fping path cannot be empty".to_string(),
            ));
        }

        // fping -Q takes whole seconds
        let interval = self.fping.report_interval;
        if interval < MIN_REPORT_INTERVAL || interval.subsec_nanos() != 0 {
            return Err(ConfigError::ValidationError(format!(
                "fping report_interval must be a whole number of seconds >= 1, got {}",
                humantime::format_duration(interval)
            )));
        }

        self.hosts.validate()?;

        Ok(())
    }

    /// Replace the fping binary path.
    pub fn with_fping_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fping.path = path.into();
        self
    }

    /// Sink settings for the configured InfluxDB server.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if the URL does not parse.
    pub fn influx_sink_config(&self) -> Result<InfluxSinkConfig, ConfigError> {
        let url = self.influxdb.validate()?;
        Ok(
            InfluxSinkConfig::new(url, &self.influxdb.db, &self.influxdb.measurement)
                .with_credentials(&self.influxdb.user, &self.influxdb.pass)
                .with_retention_policy(&self.influxdb.retention_policy)
                .with_timeout(self.influxdb.timeout),
        )
    }

    /// One pipeline per address family that has hosts.
    pub fn pipeline_configs(&self) -> Vec<PipelineConfig> {
        self.hosts
            .active_families()
            .into_iter()
            .map(|family| {
                PipelineConfig::new(
                    family,
                    &self.fping.path,
                    self.hosts.for_family(family).to_vec(),
                )
                .with_report_interval(self.fping.report_interval)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::AddressFamily;

    const FULL: &str = r#"
influxdb:
  url: http://127.0.0.1:8086
  user: writer
  pass: secret
  db: infping
  measurement: latency
  retention_policy: one_week
  timeout: 3s
fping:
  path: /opt/fping/bin/fping
  report_interval: 30s
hosts:
  v4: [192.0.2.1, example.com]
  v6: ["2001:db8::1"]
"#;

    const MINIMAL: &str = r#"
influxdb:
  url: http://influx:8086
  db: infping
hosts:
  v4hosts: [a]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_yaml(FULL).unwrap();
        assert_eq!(config.influxdb.user, "writer");
        assert_eq!(config.influxdb.measurement, "latency");
        assert_eq!(config.influxdb.timeout, Duration::from_secs(3));
        assert_eq!(config.fping.path, PathBuf::from("/opt/fping/bin/fping"));
        assert_eq!(config.fping.report_interval, Duration::from_secs(30));
        assert_eq!(config.hosts.total(), 3);
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.influxdb.measurement, DEFAULT_MEASUREMENT);
        assert_eq!(config.influxdb.retention_policy, "autogen");
        assert_eq!(config.influxdb.timeout, DEFAULT_TIMEOUT);
        assert!(config.influxdb.user.is_empty());
        assert_eq!(config.fping.path, PathBuf::from(DEFAULT_FPING_PATH));
        assert_eq!(config.fping.report_interval, DEFAULT_REPORT_INTERVAL);
    }

    #[test]
    fn test_env_expansion() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("INFPING_APP_TEST_PASS", "from-env");
        }
        let yaml = r#"
influxdb:
  url: ${INFPING_APP_TEST_URL_UNSET:-http://localhost:8086}
  user: ${INFPING_APP_TEST_USER_UNSET}
  pass: ${INFPING_APP_TEST_PASS}
  db: infping
hosts:
  v6: [c]
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.influxdb.url, "http://localhost:8086");
        assert_eq!(config.influxdb.user, "");
        assert_eq!(config.influxdb.pass, "from-env");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("INFPING_APP_TEST_PASS");
        }
    }

    #[test]
    fn test_pipeline_configs() {
        let config = AppConfig::from_yaml(FULL).unwrap();
        let pipelines = config.pipeline_configs();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].family, AddressFamily::V4);
        assert_eq!(pipelines[0].hosts, vec!["192.0.2.1", "example.com"]);
        assert_eq!(pipelines[1].family, AddressFamily::V6);
        assert_eq!(pipelines[1].report_interval, Duration::from_secs(30));
        assert_eq!(pipelines[1].fping_path, PathBuf::from("/opt/fping/bin/fping"));
    }

    #[test]
    fn test_pipeline_configs_skip_empty_family() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        let pipelines = config.pipeline_configs();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].family, AddressFamily::V4);
    }

    #[test]
    fn test_fping_path_override() {
        let config = AppConfig::from_yaml(MINIMAL)
            .unwrap()
            .with_fping_path("/usr/local/sbin/fping");
        assert_eq!(
            config.pipeline_configs()[0].fping_path,
            PathBuf::from("/usr/local/sbin/fping")
        );
    }

    #[test]
    fn test_influx_sink_config() {
        let config = AppConfig::from_yaml(FULL).unwrap();
        let sink = config.influx_sink_config().unwrap();
        assert_eq!(sink.url.as_str(), "http://127.0.0.1:8086/");
        assert_eq!(sink.database, "infping");
        assert_eq!(sink.measurement, "latency");
        assert_eq!(sink.retention_policy, "one_week");
        assert_eq!(sink.username, "writer");
        assert_eq!(sink.password, "secret");
        assert_eq!(sink.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validation_invalid_url() {
        let yaml = MINIMAL.replace("http://influx:8086", "not a url");
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("invalid influxdb url"));

        let yaml = MINIMAL.replace("http://influx:8086", "udp://influx:8089");
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_validation_empty_db() {
        let yaml = MINIMAL.replace("db: infping", "db: \"\"");
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("influxdb db cannot be empty"));
    }

    #[test]
    fn test_validation_report_interval() {
        let yaml = format!("{}fping:\n  report_interval: 1500ms\n", MINIMAL);
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("report_interval"));

        let yaml = format!("{}fping:\n  report_interval: 500ms\n", MINIMAL);
        assert!(AppConfig::from_yaml(&yaml).is_err());

        let yaml = format!("{}fping:\n  report_interval: 1m\n", MINIMAL);
        assert!(AppConfig::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn test_validation_no_hosts() {
        let yaml = r#"
influxdb:
  url: http://influx:8086
  db: infping
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("no hosts configured"));
    }

    #[test]
    fn test_parse_error() {
        let err = AppConfig::from_yaml("influxdb: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/infping.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}

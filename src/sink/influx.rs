//! InfluxDB 1.x HTTP sink.
//!
//! Writes each sample as one line-protocol point to `/write` and checks
//! reachability through `/ping` at connect time.

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::probe::Sample;
use crate::sink::line_protocol::encode_point;
use crate::sink::{Sink, SinkError};

/// Default request timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retention policy.
pub const DEFAULT_RETENTION_POLICY: &str = "autogen";

/// Response header carrying the server version.
const VERSION_HEADER: &str = "X-Influxdb-Version";

/// Longest error body kept in [`SinkError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Connection and naming parameters for [`InfluxSink`].
#[derive(Debug, Clone)]
pub struct InfluxSinkConfig {
    /// Server base URL, e.g. `http://127.0.0.1:8086`.
    pub url: Url,
    /// Username; basic auth is skipped when empty.
    pub username: String,
    /// Password.
    pub password: String,
    /// Target database.
    pub database: String,
    /// Target retention policy.
    pub retention_policy: String,
    /// Measurement name for all points.
    pub measurement: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl InfluxSinkConfig {
    /// Create a configuration with default retention policy and timeout.
    pub fn new(url: Url, database: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self {
            url,
            username: String::new(),
            password: String::new(),
            database: database.into(),
            retention_policy: DEFAULT_RETENTION_POLICY.to_string(),
            measurement: measurement.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the retention policy.
    pub fn with_retention_policy(mut self, policy: impl Into<String>) -> Self {
        self.retention_policy = policy.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// InfluxDB writer.
pub struct InfluxSink {
    client: Client,
    ping_url: Url,
    write_url: Url,
    config: InfluxSinkConfig,
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("write_url", &self.write_url.as_str())
            .field("measurement", &self.config.measurement)
            .finish_non_exhaustive()
    }
}

impl InfluxSink {
    /// Build the sink without contacting the server.
    ///
    /// # Errors
    /// Returns `SinkError::Config` if the URL cannot be extended or the HTTP
    /// client cannot be built.
    pub fn new(config: InfluxSinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Config(format!("failed to build HTTP client: {e}")))?;

        let base = base_url(&config.url);
        let ping_url = join(&base, "ping")?;
        let mut write_url = join(&base, "write")?;
        write_url
            .query_pairs_mut()
            .append_pair("db", &config.database)
            .append_pair("rp", &config.retention_policy)
            .append_pair("precision", "ns");

        Ok(Self {
            client,
            ping_url,
            write_url,
            config,
        })
    }

    /// Build the sink and verify the server answers `/ping`.
    pub async fn connect(config: InfluxSinkConfig) -> Result<Self, SinkError> {
        let sink = Self::new(config)?;
        let started = std::time::Instant::now();
        let version = sink.ping().await?;
        tracing::info!(
            url = %sink.config.url,
            version = version.as_deref().unwrap_or("unknown"),
            rtt_ms = started.elapsed().as_millis(),
            "Connected to InfluxDB"
        );
        Ok(sink)
    }

    /// Ping the server, returning its reported version.
    pub async fn ping(&self) -> Result<Option<String>, SinkError> {
        let response = self
            .authorize(self.client.get(self.ping_url.clone()))
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    /// Measurement name used for all points.
    pub fn measurement(&self) -> &str {
        &self.config.measurement
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.config.username, Some(&self.config.password))
        }
    }
}

#[async_trait::async_trait]
impl Sink for InfluxSink {
    fn name(&self) -> &str {
        "influxdb"
    }

    async fn write(&self, sample: &Sample) -> Result<(), SinkError> {
        let body = encode_point(&self.config.measurement, sample);
        let response = self
            .authorize(self.client.post(self.write_url.clone()))
            .body(body)
            .send()
            .await?;
        check_status(response).await?;

        tracing::trace!(host = %sample.host, loss = sample.loss_percent, "Point written");
        Ok(())
    }
}

/// Base URL with a trailing slash so relative joins keep any path prefix.
fn base_url(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn join(base: &Url, endpoint: &str) -> Result<Url, SinkError> {
    base.join(endpoint)
        .map_err(|e| SinkError::Config(format!("invalid InfluxDB URL '{base}': {e}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(SinkError::Rejected {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

use crate::{
    error::{CoreError, Result},
    model::ResourceName,
};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::PathBuf, time::Duration};
use tracing::{debug, warn};

/// Project id shipped in sample configs; never a real project
pub const PLACEHOLDER_PROJECT_ID: &str = "your-project-id";

/// Upper bound for the instance-metadata probe
pub const MAX_METADATA_TIMEOUT_MS: u64 = 2000;

/// Inline service-account key. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialPayload(String);

impl CredentialPayload {
    pub fn new<S: Into<String>>(payload: S) -> Self {
        Self(payload.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialPayload(<{} bytes>)", self.0.len())
    }
}

/// Run configuration, built once and passed to every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Google Cloud project to probe
    pub project_id: String,

    /// Comma-separated topic names
    pub topics: String,

    /// Comma-separated subscription names
    pub subscriptions: String,

    /// Service-account key file
    pub credentials_file: Option<PathBuf>,

    /// Service-account key contents, used when no key file is present
    pub credentials_json: Option<CredentialPayload>,

    /// Leading segments of every metric name
    pub metric_prefix: String,

    /// Log written by the derived-metric producer
    pub custom_log_path: PathBuf,

    /// `gcloud` executable
    pub gcloud_path: PathBuf,

    /// Filesystem whose free space is reported
    pub disk_path: PathBuf,

    /// Instance-metadata endpoint used for environment detection
    pub metadata_url: String,

    /// Bound for the metadata request, at most 2000ms
    pub metadata_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: PLACEHOLDER_PROJECT_ID.to_string(),
            topics: String::new(),
            subscriptions: String::new(),
            credentials_file: None,
            credentials_json: None,
            metric_prefix: "Custom Metrics|PubSub".to_string(),
            custom_log_path: PathBuf::from("/tmp/pubsub_custom_metrics.log"),
            gcloud_path: PathBuf::from("gcloud"),
            disk_path: PathBuf::from("/"),
            metadata_url: "http://metadata.google.internal/computeMetadata/v1/".to_string(),
            metadata_timeout_ms: MAX_METADATA_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in order of preference:
    /// 1. CLI arguments and environment override everything
    /// 2. JSON config file if specified
    /// 3. Default config file locations
    /// 4. Built-in defaults
    ///
    /// The result is not validated; the collector does that as its first step
    /// so an invalid configuration can still be reported as a metric.
    pub fn load(cli_config: Option<&CliConfig>, json_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(default_config) = Self::load_default_config()? {
            config.merge(default_config);
        }

        if let Some(path) = json_path {
            let file_config = Self::load_from_file(path)?;
            config.merge(file_config);
        }

        if let Some(cli) = cli_config {
            config.apply_cli_overrides(cli);
        }

        Ok(config)
    }

    /// Load configuration from a specific JSON file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            CoreError::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    fn load_default_config() -> Result<Option<Self>> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(Some(config)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping config file");
                        continue;
                    }
                }
            }
        }

        Ok(None)
    }

    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pubmon").join("config.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".pubmon.json"));
        }

        paths.push(PathBuf::from("pubmon.json"));

        paths
    }

    /// Merge another configuration into this one, keeping only values that
    /// differ from the built-in defaults
    fn merge(&mut self, other: Self) {
        let defaults = Self::default();

        if other.project_id != defaults.project_id {
            self.project_id = other.project_id;
        }
        if !other.topics.is_empty() {
            self.topics = other.topics;
        }
        if !other.subscriptions.is_empty() {
            self.subscriptions = other.subscriptions;
        }
        if other.credentials_file.is_some() {
            self.credentials_file = other.credentials_file;
        }
        if other.credentials_json.is_some() {
            self.credentials_json = other.credentials_json;
        }
        if other.metric_prefix != defaults.metric_prefix {
            self.metric_prefix = other.metric_prefix;
        }
        if other.custom_log_path != defaults.custom_log_path {
            self.custom_log_path = other.custom_log_path;
        }
        if other.gcloud_path != defaults.gcloud_path {
            self.gcloud_path = other.gcloud_path;
        }
        if other.disk_path != defaults.disk_path {
            self.disk_path = other.disk_path;
        }
        if other.metadata_url != defaults.metadata_url {
            self.metadata_url = other.metadata_url;
        }
        if other.metadata_timeout_ms != defaults.metadata_timeout_ms {
            self.metadata_timeout_ms = other.metadata_timeout_ms;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &CliConfig) {
        if let Some(project) = &cli.project_id {
            self.project_id = project.clone();
        }
        if let Some(topics) = &cli.topics {
            self.topics = topics.clone();
        }
        if let Some(subscriptions) = &cli.subscriptions {
            self.subscriptions = subscriptions.clone();
        }
        if let Some(path) = &cli.credentials_file {
            self.credentials_file = Some(path.clone());
        }
        if let Some(payload) = &cli.credentials_json {
            self.credentials_json = Some(payload.clone());
        }
        if let Some(prefix) = &cli.metric_prefix {
            self.metric_prefix = prefix.clone();
        }
        if let Some(path) = &cli.custom_log_path {
            self.custom_log_path = path.clone();
        }
        if let Some(path) = &cli.gcloud_path {
            self.gcloud_path = path.clone();
        }
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        let project = self.project_id.trim();
        if project.is_empty() || project == PLACEHOLDER_PROJECT_ID {
            return Err(CoreError::config("GCP project id is not set"));
        }

        if !self.has_credential_source() {
            return Err(CoreError::config(
                "No credential source configured (key file or inline key)",
            ));
        }

        if self.metric_prefix.trim().is_empty() {
            return Err(CoreError::config("Metric prefix must not be empty"));
        }

        let prefix_ok = self
            .metric_prefix
            .trim_end_matches('|')
            .split('|')
            .all(|segment| {
                !segment.trim().is_empty()
                    && !segment.contains([',', '=', '\n', '\r'])
            });
        if !prefix_ok {
            return Err(CoreError::config(format!(
                "Metric prefix {:?} must be non-empty `|`-separated segments without `,` or `=`",
                self.metric_prefix
            )));
        }

        if self.metadata_timeout_ms == 0 || self.metadata_timeout_ms > MAX_METADATA_TIMEOUT_MS {
            return Err(CoreError::config(format!(
                "Metadata timeout must be between 1 and {}ms",
                MAX_METADATA_TIMEOUT_MS
            )));
        }

        Ok(())
    }

    fn has_credential_source(&self) -> bool {
        let file = self
            .credentials_file
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty());
        let inline = self
            .credentials_json
            .as_ref()
            .is_some_and(|p| !p.expose().trim().is_empty());
        file || inline
    }

    pub fn topic_names(&self) -> Vec<ResourceName> {
        ResourceName::parse_list(&self.topics)
    }

    pub fn subscription_names(&self) -> Vec<ResourceName> {
        ResourceName::parse_list(&self.subscriptions)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

/// CLI and environment overrides
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub project_id: Option<String>,
    pub topics: Option<String>,
    pub subscriptions: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub credentials_json: Option<CredentialPayload>,
    pub metric_prefix: Option<String>,
    pub custom_log_path: Option<PathBuf>,
    pub gcloud_path: Option<PathBuf>,
}

// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::CodecKind;
use crate::config::consts::*;
use crate::errors::ConfigError;
use crate::model::{BatchMetadata, MergePolicy, Partition, QueueSpec};
use crate::observability::messages::config::ConfigurationWarning;
use crate::observability::messages::StructuredLog;

/// Complete configuration of one pipeline deployment.
///
/// Every process of a deployment (all workers and the aggregator) loads the
/// same file, which is what keeps queue names, the codec and the expected
/// worker count in agreement.
///
/// # Example
/// ```yaml
/// broker:
///   host: rabbitmq
///   port: 5672
/// retry:
///   max_attempts: 5
///   retry_delay_ms: 5000
/// codec: json
/// completion_queue: completion_queue
/// dead_letter_queue: dead_letter_queue
/// barrier:
///   expected: 4
///   timeout_secs: 3600
/// categories:
///   - name: data
///     queue: data_queue
///   - name: signal
///     queue: signal_data_queue
///     color: "#00cdff"
///     label: "Signal ($m_H$ = 125 GeV)"
/// workers:
///   - id: data-worker
///     category: data
///     sources: ["partitions/data_A.json", "partitions/data_B.json"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub codec: CodecKind,
    #[serde(default = "default_completion_queue")]
    pub completion_queue: String,
    #[serde(default)]
    pub dead_letter_queue: Option<String>,
    #[serde(default)]
    pub barrier: BarrierConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

fn default_completion_queue() -> String {
    DEFAULT_COMPLETION_QUEUE.to_string()
}

impl Config {
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn worker(&self, id: &str) -> Result<&WorkerConfig, ConfigError> {
        self.workers
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| ConfigError::UnknownWorker(id.to_string()))
    }

    /// Completion signals the barrier waits for. Defaults to one per configured worker.
    pub fn expected_completions(&self) -> usize {
        self.barrier.expected.unwrap_or(self.workers.len())
    }

    pub fn completion_queue_spec(&self) -> QueueSpec {
        QueueSpec::durable(&self.completion_queue)
    }

    pub fn dead_letter_queue_spec(&self) -> Option<QueueSpec> {
        self.dead_letter_queue.as_deref().map(QueueSpec::durable)
    }

    /// Override broker settings from the `RABBITMQ_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.broker
            .apply_overrides(|name| std::env::var(name).ok())
    }
}

/// Which broker implementation to connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    /// RabbitMQ or any AMQP 0-9-1 broker
    #[default]
    Amqp,
    /// In-process broker; only meaningful when every component runs in one process
    Memory,
}

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub host: String,
    pub port: u16,
    pub virtual_host: String,
    pub username: String,
    pub password: String,
    pub socket_timeout_ms: u64,
    pub prefetch: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            virtual_host: DEFAULT_VIRTUAL_HOST.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            prefetch: DEFAULT_PREFETCH,
        }
    }
}

impl BrokerConfig {
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_BROKER_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_BROKER_PORT) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_BROKER_PORT.to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(virtual_host) = lookup(ENV_VIRTUAL_HOST) {
            self.virtual_host = virtual_host;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = password;
        }
        Ok(())
    }
}

/// Reconnect policy for broker connections.
///
/// `backoff_multiplier: 1.0` with `jitter: 0.0` gives a fixed delay between
/// attempts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of each delay (0.0..=1.0) that may be added at random
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

/// Completion barrier settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    /// Distinct workers to wait for; defaults to the number of configured workers
    pub expected: Option<usize>,
    /// Give up after this long; without it the barrier waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl BarrierConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Aggregator and renderer settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub merge_policy: MergePolicy,
    /// Per-category drain deadline; without it the drain waits indefinitely
    pub drain_timeout_secs: Option<u64>,
    pub output_dir: PathBuf,
    pub histogram: HistogramConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            drain_timeout_secs: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            histogram: HistogramConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }
}

/// Binning of the rendered histogram.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub min: f64,
    pub max: f64,
    pub bin_width: f64,
    pub file_name: String,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_HISTOGRAM_MIN,
            max: DEFAULT_HISTOGRAM_MAX,
            bin_width: DEFAULT_HISTOGRAM_BIN_WIDTH,
            file_name: DEFAULT_HISTOGRAM_FILE.to_string(),
        }
    }
}

/// One output category and the queue its batches travel on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub queue: String,
    /// Batches to drain before the category is complete (one per producing worker)
    #[serde(default = "default_expected_batches")]
    pub expected_batches: usize,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_expected_batches() -> usize {
    1
}

impl CategoryConfig {
    pub fn queue_spec(&self) -> QueueSpec {
        QueueSpec::durable(&self.queue)
    }

    pub fn metadata(&self) -> BatchMetadata {
        BatchMetadata::new(self.color.clone(), self.label.clone())
    }
}

/// One dataset worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerConfig {
    /// Identity sent in the completion signal
    pub id: String,
    pub category: String,
    /// Partition sources handed to the transform
    #[serde(default)]
    pub sources: Vec<String>,
}

impl WorkerConfig {
    pub fn partition(&self, category: &CategoryConfig) -> Partition {
        Partition {
            name: self.id.clone(),
            sources: self.sources.clone(),
            metadata: category.metadata(),
        }
    }
}

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let cfg = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(cfg)
}

/// Load a config file and apply `RABBITMQ_*` environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut cfg = parse_config(&content, ConfigFormat::from_path(path))?;
    cfg.apply_env_overrides()?;
    Ok(cfg)
}

/// Load a config file and validate it.
///
/// Warnings are logged; any other finding fails the load with every problem
/// listed at once.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;

    let (warnings, errors): (Vec<_>, Vec<_>) = crate::config::validate_config(&cfg)
        .into_iter()
        .partition(|finding| finding.is_warning());

    for warning in &warnings {
        ConfigurationWarning { warning }.log();
    }
    if !errors.is_empty() {
        return Err(ConfigError::Invalid(errors));
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
categories:
  - name: data
    queue: data_queue
"#;

    #[test]
    fn parse_minimal_config_uses_deployment_defaults() {
        let cfg = parse_config(MINIMAL, ConfigFormat::Yaml).unwrap();

        assert_eq!(cfg.broker, BrokerConfig::default());
        assert_eq!(cfg.broker.host, "rabbitmq");
        assert_eq!(cfg.broker.port, 5672);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.codec, CodecKind::Json);
        assert_eq!(cfg.completion_queue, "completion_queue");
        assert!(cfg.dead_letter_queue.is_none());
        assert_eq!(cfg.categories[0].expected_batches, 1);
        assert_eq!(cfg.aggregator.merge_policy, MergePolicy::Reject);
        assert_eq!(cfg.expected_completions(), 0);
    }

    #[test]
    fn test_expected_completions_defaults_to_worker_count() {
        let yaml = r#"
categories:
  - name: data
    queue: data_queue
  - name: signal
    queue: signal_queue
workers:
  - id: w-data
    category: data
  - id: w-signal
    category: signal
"#;
        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.expected_completions(), 2);

        let explicit = parse_config(
            &format!("{}\nbarrier:\n  expected: 5\n", yaml),
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(explicit.expected_completions(), 5);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r##"
codec = "protobuf"
completion_queue = "done"

[broker]
host = "localhost"
kind = "memory"

[barrier]
expected = 2
timeout_secs = 30

[[categories]]
name = "signal"
queue = "signal_queue"
color = "#00cdff"
"##;
        let cfg = parse_config(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.codec, CodecKind::Protobuf);
        assert_eq!(cfg.broker.kind, BrokerKind::Memory);
        assert_eq!(cfg.broker.host, "localhost");
        assert_eq!(cfg.broker.port, 5672);
        assert_eq!(cfg.barrier.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.categories[0].color.as_deref(), Some("#00cdff"));
    }

    #[test]
    fn test_env_overrides_replace_broker_settings() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RABBITMQ_HOST", "broker.internal"),
            ("RABBITMQ_PORT", "5673"),
            ("RABBITMQ_DEFAULT_USER", "analysis"),
            ("RABBITMQ_DEFAULT_PASS", "s3cret"),
        ]);
        let mut broker = BrokerConfig::default();
        broker
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(broker.host, "broker.internal");
        assert_eq!(broker.port, 5673);
        assert_eq!(broker.username, "analysis");
        assert_eq!(broker.password, "s3cret");
        assert_eq!(broker.virtual_host, "/");
    }

    #[test]
    fn test_invalid_port_override_is_reported() {
        let mut broker = BrokerConfig::default();
        let err = broker
            .apply_overrides(|name| (name == "RABBITMQ_PORT").then(|| "amqp".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name, .. } if name == "RABBITMQ_PORT"));
    }

    #[test]
    fn test_config_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("cfg.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("cfg.TOML")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("cfg.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("cfg")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_unknown_worker_lookup() {
        let cfg = parse_config(MINIMAL, ConfigFormat::Yaml).unwrap();
        assert!(matches!(cfg.worker("ghost"), Err(ConfigError::UnknownWorker(id)) if id == "ghost"));
    }
}

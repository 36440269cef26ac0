/// Broker host used by the container deployments
pub const DEFAULT_BROKER_HOST: &str = "rabbitmq";
/// Standard AMQP port
pub const DEFAULT_BROKER_PORT: u16 = 5672;
pub const DEFAULT_VIRTUAL_HOST: &str = "/";
pub const DEFAULT_USERNAME: &str = "user";
pub const DEFAULT_PASSWORD: &str = "password";
/// Upper bound for a single connection attempt
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 5_000;
/// Unacknowledged deliveries a consumer may hold at once
pub const DEFAULT_PREFETCH: u16 = 1;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Delay before the second attempt; later delays grow by the backoff multiplier
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 60_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Up to 20% of each delay is added at random
pub const DEFAULT_JITTER: f64 = 0.2;

pub const DEFAULT_COMPLETION_QUEUE: &str = "completion_queue";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Histogram range of the four-lepton mass plot, in GeV
pub const DEFAULT_HISTOGRAM_MIN: f64 = 80.0;
pub const DEFAULT_HISTOGRAM_MAX: f64 = 250.0;
pub const DEFAULT_HISTOGRAM_BIN_WIDTH: f64 = 5.0;
pub const DEFAULT_HISTOGRAM_FILE: &str = "histogram.json";

pub const ENV_BROKER_HOST: &str = "RABBITMQ_HOST";
pub const ENV_BROKER_PORT: &str = "RABBITMQ_PORT";
pub const ENV_VIRTUAL_HOST: &str = "RABBITMQ_VHOST";
pub const ENV_USERNAME: &str = "RABBITMQ_DEFAULT_USER";
pub const ENV_PASSWORD: &str = "RABBITMQ_DEFAULT_PASS";

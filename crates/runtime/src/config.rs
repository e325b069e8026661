//! Configuration for the control plane, assembled from defaults and
//! environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Top-level configuration, one sub-struct per concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub approval: ApprovalConfig,
    pub sse: SseConfig,
    pub circuit_breaker: CircuitBreakerDefaults,
    pub heartbeat: HeartbeatConfig,
    pub crash_loop: CrashLoopConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            approval: ApprovalConfig::default(),
            sse: SseConfig::default(),
            circuit_breaker: CircuitBreakerDefaults::default(),
            heartbeat: HeartbeatConfig::default(),
            crash_loop: CrashLoopConfig::default(),
        }
    }
}

/// HTTP API configuration (the API layer itself is out of scope; these
/// parameters are consumed by the thin `api` module under `http-api`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

/// Relational store connection parameters. The store itself is an
/// external collaborator; only the connection string is owned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None }
    }
}

/// Logging/tracing configuration.
///
/// Tracing defaults to enabled (Design Notes open question, resolved in
/// `DESIGN.md`): matches the teacher's `HttpApiConfig::enable_tracing: true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub enable_tracing: bool,
    pub filter: String,
    pub otel_sample_rate: f64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_tracing: true,
            filter: "info".to_string(),
            otel_sample_rate: 1.0,
        }
    }
}

/// Approval service defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub default_ttl_seconds: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 24 * 60 * 60,
        }
    }
}

/// SSE connection manager defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    pub ring_buffer_size: usize,
    pub heartbeat_interval_seconds: u64,
    pub queue_high_water_mark: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size: 1000,
            heartbeat_interval_seconds: 60,
            queue_high_water_mark: 256,
        }
    }
}

/// Circuit breaker defaults, overridable per backend registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerDefaults {
    pub failure_threshold: u32,
    pub window_ms: u64,
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerDefaults {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 60_000,
            cooldown_ms: 30_000,
        }
    }
}

impl CircuitBreakerDefaults {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Heartbeat receiver constants (spec §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 15,
            timeout_seconds: 45,
        }
    }
}

/// Crash-loop detector constants (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CrashLoopConfig {
    pub window_seconds: u64,
    pub base_cooldown_seconds: u64,
    pub max_cooldown_seconds: u64,
}

impl Default for CrashLoopConfig {
    fn default() -> Self {
        Self {
            window_seconds: 30 * 60,
            base_cooldown_seconds: 60,
            max_cooldown_seconds: 15 * 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables layered on defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(port) = env::var("API_PORT") {
            config.api.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                reason: "not a valid port number".to_string(),
            })?;
        }
        if let Ok(host) = env::var("API_HOST") {
            config.api.host = host;
        }
        if let Ok(db_url) = env::var("DATABASE_URL") {
            config.database.url = Some(db_url);
        }
        if let Ok(filter) = env::var("RUST_LOG") {
            config.logging.filter = filter;
        }

        match env::var("OTEL_TRACES_SAMPLE_RATE") {
            Ok(rate) => {
                config.logging.otel_sample_rate =
                    rate.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "OTEL_TRACES_SAMPLE_RATE".to_string(),
                        reason: "not a valid float".to_string(),
                    })?;
            }
            Err(_) => {
                if let Ok(rate) = env::var("OTEL_SAMPLE_RATE") {
                    tracing::warn!(
                        "OTEL_SAMPLE_RATE is deprecated, use OTEL_TRACES_SAMPLE_RATE instead"
                    );
                    config.logging.otel_sample_rate =
                        rate.parse().map_err(|_| ConfigError::InvalidValue {
                            key: "OTEL_SAMPLE_RATE".to_string(),
                            reason: "not a valid float".to_string(),
                        })?;
                }
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.port".to_string(),
                reason: "port cannot be 0".to_string(),
            });
        }
        if self.sse.ring_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sse.ring_buffer_size".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backoff::BackoffPolicy;
use crate::elasticsearch::DEFAULT_EXTERNAL_IP_CHECK_ADDRESS;
use crate::error::ConfigError;

const DEFAULT_FLUSH_TRIGGER_SIZE: usize = 256;
const DEFAULT_ON_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_RETRY_SEED_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(5 * 60);

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Tuning knobs of a shipping pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum number of buffered records; `0` means unbounded
    pub rolling_buffer_size: usize,
    /// Batch size that forces a flush
    pub flush_trigger_size: usize,
    /// How long stopping waits for the buffer to drain
    pub on_close_timeout: Duration,
    /// Total number of send attempts per batch
    pub max_retries: u32,
    /// Lower bound of every retry delay
    pub retry_seed_delay: Duration,
    /// Upper bound of every retry delay
    pub retry_max_delay: Duration,
    /// Fixed seed for retry jitter, drawn from entropy when unset
    pub retry_rng_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rolling_buffer_size: 0,
            flush_trigger_size: DEFAULT_FLUSH_TRIGGER_SIZE,
            on_close_timeout: DEFAULT_ON_CLOSE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_seed_delay: DEFAULT_RETRY_SEED_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            retry_rng_seed: None,
        }
    }
}

impl PipelineConfig {
    /// Create configuration from `LOG_SHIPPER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            rolling_buffer_size: parse_env("LOG_SHIPPER_ROLLING_BUFFER_SIZE")?
                .unwrap_or(defaults.rolling_buffer_size),
            flush_trigger_size: parse_env("LOG_SHIPPER_FLUSH_TRIGGER_SIZE")?
                .unwrap_or(defaults.flush_trigger_size),
            on_close_timeout: parse_env("LOG_SHIPPER_ON_CLOSE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.on_close_timeout),
            max_retries: parse_env("LOG_SHIPPER_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_seed_delay: parse_env("LOG_SHIPPER_RETRY_SEED_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_seed_delay),
            retry_max_delay: parse_env("LOG_SHIPPER_RETRY_MAX_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_max_delay),
            retry_rng_seed: parse_env("LOG_SHIPPER_RETRY_RNG_SEED")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_trigger_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Flush trigger size must be greater than 0".to_string(),
            ));
        }

        if self.retry_seed_delay > self.retry_max_delay {
            return Err(ConfigError::InvalidConfig(format!(
                "Retry seed delay {:?} exceeds retry max delay {:?}",
                self.retry_seed_delay, self.retry_max_delay
            )));
        }

        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_retries: self.max_retries,
            seed_delay: self.retry_seed_delay,
            max_delay: self.retry_max_delay,
        }
    }

    /// Random source for retry jitter.
    pub fn rng(&self) -> StdRng {
        match self.retry_rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Configuration of the stdin shipping agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub pipeline: PipelineConfig,
    /// Elasticsearch connection string, see [`crate::elasticsearch::ConnectionString`]
    pub connection_string: String,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// Remote address whose route picks the reported machine IP
    pub external_ip_check_address: String,
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let connection_string = env::var("LOG_SHIPPER_CONNECTION_STRING").map_err(|_| {
            ConfigError::InvalidConfig("LOG_SHIPPER_CONNECTION_STRING must be set".to_string())
        })?;
        let log_level = env::var("LOG_SHIPPER_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());
        let external_ip_check_address = env::var("LOG_SHIPPER_EXTERNAL_IP_CHECK_ADDRESS")
            .map(|val| val.trim().to_string())
            .unwrap_or_else(|_| DEFAULT_EXTERNAL_IP_CHECK_ADDRESS.to_string());

        let config = Self {
            pipeline: PipelineConfig::from_env()?,
            connection_string,
            log_level,
            external_ip_check_address,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;

        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "LOG_SHIPPER_CONNECTION_STRING cannot be empty".to_string(),
            ));
        }

        if self.external_ip_check_address.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "LOG_SHIPPER_EXTERNAL_IP_CHECK_ADDRESS cannot be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidConfig(format!("Invalid value '{val}' for {key}"))),
        Err(_) => Ok(None),
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::error::{GuardError, Result};

pub const MIN_PER_IP_PER_MINUTE: u32 = 30;
pub const MIN_PER_IP_BURST: u32 = 1;
pub const MIN_STRIKE_THRESHOLD: u32 = 1;
pub const MIN_BLOCK_SECONDS: u64 = 30;
/// Longest block the guard will apply. Larger values are lowered to this.
pub const MAX_BLOCK_SECONDS: u64 = u32::MAX as u64;

/// Root configuration for the guard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub guard: GuardOptions,
}

/// Listener and logging settings for the binary.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(custom(function = "validate_bind_addr"))]
    pub bind_addr: String,

    /// Log level used when RUST_LOG is not set
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    /// Derive client identity from X-Forwarded-For / X-Real-IP.
    /// Only enable behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            trust_forwarded_headers: false,
        }
    }
}

/// Guard options as written by the operator. Values may be out of range;
/// [`GuardConfig::from_options`] coerces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardOptions {
    pub enabled: bool,
    pub per_ip_per_minute: i64,
    pub per_ip_burst: i64,
    pub global_per_minute: i64,
    pub global_burst: i64,
    pub strike_threshold: i64,
    pub block_seconds: i64,
    pub whitelist: Vec<String>,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            per_ip_per_minute: 240,
            per_ip_burst: 60,
            global_per_minute: 2400,
            global_burst: 300,
            strike_threshold: 12,
            block_seconds: 600,
            whitelist: vec!["127.0.0.1/32".to_string(), "::1/128".to_string()],
        }
    }
}

/// Immutable guard settings with every minimum applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardConfig {
    pub enabled: bool,
    pub per_ip_per_minute: u32,
    pub per_ip_burst: u32,
    pub global_per_minute: u32,
    pub global_burst: u32,
    pub strike_threshold: u32,
    pub block_seconds: u64,
    pub whitelist: Vec<String>,
}

impl GuardConfig {
    /// Raise every sub-minimum value. Never fails.
    pub fn from_options(options: &GuardOptions) -> Self {
        let per_ip_per_minute = at_least(options.per_ip_per_minute, MIN_PER_IP_PER_MINUTE);
        let per_ip_burst = at_least(options.per_ip_burst, MIN_PER_IP_BURST);

        Self {
            enabled: options.enabled,
            per_ip_per_minute,
            per_ip_burst,
            global_per_minute: at_least(options.global_per_minute, per_ip_per_minute),
            global_burst: at_least(options.global_burst, per_ip_burst),
            strike_threshold: at_least(options.strike_threshold, MIN_STRIKE_THRESHOLD),
            block_seconds: options
                .block_seconds
                .clamp(MIN_BLOCK_SECONDS as i64, MAX_BLOCK_SECONDS as i64) as u64,
            whitelist: options.whitelist.clone(),
        }
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_seconds)
    }

    /// Entries idle for longer than this are eligible for sweeping.
    pub fn stale_after(&self) -> Duration {
        self.block_duration().saturating_mul(3)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::from_options(&GuardOptions::default())
    }
}

impl From<GuardOptions> for GuardConfig {
    fn from(options: GuardOptions) -> Self {
        Self::from_options(&options)
    }
}

fn at_least(value: i64, minimum: u32) -> u32 {
    value.clamp(minimum as i64, u32::MAX as i64) as u32
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        let server = &mut config.server;
        if let Some(bind_addr) = env_string("BIND_ADDR") {
            server.bind_addr = bind_addr;
        }
        if let Some(log_level) = env_string("LOG_LEVEL") {
            server.log_level = log_level;
        }
        if let Some(trust) = env_parse("TRUST_FORWARDED_HEADERS")? {
            server.trust_forwarded_headers = trust;
        }

        let guard = &mut config.guard;
        if let Some(enabled) = env_parse("DDOS_GUARD_ENABLED")? {
            guard.enabled = enabled;
        }
        if let Some(value) = env_parse("DDOS_GUARD_PER_IP_PER_MINUTE")? {
            guard.per_ip_per_minute = value;
        }
        if let Some(value) = env_parse("DDOS_GUARD_PER_IP_BURST")? {
            guard.per_ip_burst = value;
        }
        if let Some(value) = env_parse("DDOS_GUARD_GLOBAL_PER_MINUTE")? {
            guard.global_per_minute = value;
        }
        if let Some(value) = env_parse("DDOS_GUARD_GLOBAL_BURST")? {
            guard.global_burst = value;
        }
        if let Some(value) = env_parse("DDOS_GUARD_STRIKE_THRESHOLD")? {
            guard.strike_threshold = value;
        }
        if let Some(value) = env_parse("DDOS_GUARD_BLOCK_SECONDS")? {
            guard.block_seconds = value;
        }
        if let Some(list) = env_string("DDOS_GUARD_WHITELIST") {
            guard.whitelist = split_list(&list);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GuardError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        Ok(())
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig::from_options(&self.guard)
    }
}

fn env_string(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(var: &str) -> Result<Option<T>> {
    match env_string(var) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| GuardError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_bind_addr(value: &str) -> std::result::Result<(), ValidationError> {
    value
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("bind_addr must be host:port"))
}

fn validate_log_level(value: &str) -> std::result::Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("unknown log level")),
    }
}

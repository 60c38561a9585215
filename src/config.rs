//! Gateway configuration
//! This module contains the process-wide configuration structures and the
//! environment loading that fills them in at startup

use crate::{GatewayError, Result};
use std::env;
use std::time::Duration;

/// Default listen port when `PORT` is unset
pub const DEFAULT_PORT: u16 = 4000;

/// Default query sub-path appended to every subgraph address.
/// Matches the Go subgraph handlers (override `SUBGRAPH_PATH` to `/graphql`
/// if the handlers change).
pub const DEFAULT_SUBGRAPH_PATH: &str = "/query";

/// Default schema poll interval (the gateway re-fetches subgraph SDL this
/// often once it is serving)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Retry policy for the startup orchestrator
///
/// Constant for the process lifetime. The orchestrator never performs more
/// than `max_attempts` tries, and computed delays stay within
/// `[0, max_delay_ms]` plus jitter unless a server-supplied retry hint
/// overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts (initial try included), >= 1
    pub max_attempts: u32,
    /// Base delay for the first backoff step, > 0
    pub base_delay_ms: u64,
    /// Cap applied to the exponential schedule, >= base_delay_ms
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_500,
            max_delay_ms: 20_000,
        }
    }
}

impl RetryPolicy {
    /// Validate the policy invariants
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(GatewayError::Config(
                "RETRY_MAX_ATTEMPTS must be >= 1".to_string(),
            ));
        }
        if self.base_delay_ms == 0 {
            return Err(GatewayError::Config(
                "RETRY_BASE_DELAY_MS must be > 0".to_string(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(GatewayError::Config(
                "RETRY_MAX_DELAY_MS must be >= RETRY_BASE_DELAY_MS".to_string(),
            ));
        }
        Ok(())
    }
}

/// Process-wide gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port the gateway listens on (`PORT`, default 4000)
    pub port: u16,
    /// Query sub-path appended to subgraph addresses (`SUBGRAPH_PATH`)
    pub subgraph_path: String,
    /// Startup retry policy (`RETRY_*` variables)
    pub retry: RetryPolicy,
    /// How often the serving gateway re-fetches subgraph schemas
    /// (`SCHEMA_POLL_INTERVAL_MS`)
    pub poll_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            subgraph_path: DEFAULT_SUBGRAPH_PATH.to_string(),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the environment.
    ///
    /// Missing variables fall back to defaults; present-but-malformed
    /// values are configuration errors (permanent, never retried).
    pub fn from_env() -> Result<Self> {
        let port = parse_var("PORT", DEFAULT_PORT)?;
        let subgraph_path =
            env::var("SUBGRAPH_PATH").unwrap_or_else(|_| DEFAULT_SUBGRAPH_PATH.to_string());
        let retry = RetryPolicy {
            max_attempts: parse_var("RETRY_MAX_ATTEMPTS", RetryPolicy::default().max_attempts)?,
            base_delay_ms: parse_var("RETRY_BASE_DELAY_MS", RetryPolicy::default().base_delay_ms)?,
            max_delay_ms: parse_var("RETRY_MAX_DELAY_MS", RetryPolicy::default().max_delay_ms)?,
        };
        retry.validate()?;
        let poll_interval =
            Duration::from_millis(parse_var("SCHEMA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?);

        Ok(Self {
            port,
            subgraph_path,
            retry,
            poll_interval,
        })
    }
}

/// Parse an environment variable, falling back to a default when unset
fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| GatewayError::Config(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

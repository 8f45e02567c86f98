// src/config/mod.rs
// Loads settings from the environment (after .env), with defaults for everything

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::protocol::DEFAULT_MODEL;

/// Upper bound accepted for `ADVISOR_CONNECT_TIMEOUT`
pub const MAX_CONNECT_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    // ── Service
    pub service_url: String,
    pub model: String,

    // ── Connection
    /// Seconds to wait for the socket to open before giving up
    pub connect_timeout_secs: u64,

    // ── Logging
    pub log_level: String,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

// Values may carry trailing `# comments` and surrounding whitespace
fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: FromStr,
{
    match raw {
        Some(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            clean_val.parse::<T>().unwrap_or(default)
        }
        None => default,
    }
}

impl AdvisorConfig {
    /// Load from process environment, reading `.env` first if present
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_url: parse_or(
                lookup("ADVISOR_SERVICE_URL"),
                "ws://localhost:8000/ws".to_string(),
            ),
            model: parse_or(lookup("ADVISOR_MODEL"), DEFAULT_MODEL.to_string()),
            connect_timeout_secs: parse_or(lookup("ADVISOR_CONNECT_TIMEOUT"), 10),
            log_level: parse_or(lookup("ADVISOR_LOG_LEVEL"), "info".to_string()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check the values that would otherwise only fail at connect time
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.service_url)
            .map_err(|e| anyhow::anyhow!("Invalid service URL '{}': {}", self.service_url, e))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!(
                "Service URL must use ws:// or wss://, got '{}'",
                self.service_url
            );
        }
        if self.connect_timeout_secs == 0 {
            bail!("Connect timeout must be at least 1 second");
        }
        if self.connect_timeout_secs > MAX_CONNECT_TIMEOUT_SECS {
            bail!(
                "Connect timeout must be at most {} seconds, got {}",
                MAX_CONNECT_TIMEOUT_SECS,
                self.connect_timeout_secs
            );
        }
        if self.model.trim().is_empty() {
            bail!("Model identifier must not be empty");
        }
        Ok(())
    }

    pub fn is_debug(&self) -> bool {
        self.log_level.eq_ignore_ascii_case("debug") || self.log_level.eq_ignore_ascii_case("trace")
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<AdvisorConfig> = Lazy::new(AdvisorConfig::from_env);

//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so a session can start with zero
//! configuration; without an API key replies simply come back as the
//! fallback notice.

use std::time::Duration;

use murmur_shared::constants::{END_HOLD_MS, FALLBACK_NOTICE, REPLY_DELAY_MS, RING_DELAY_MS};

/// Fixed delays driving the simulated latency.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTimings {
    /// Between a send and the reply request ("thinking").
    pub reply_delay: Duration,
    /// Ringing before the call counts as answered.
    pub ring_delay: Duration,
    /// How long an ended call stays visible before the surface closes.
    pub end_hold: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(REPLY_DELAY_MS),
            ring_delay: Duration::from_millis(RING_DELAY_MS),
            end_hold: Duration::from_millis(END_HOLD_MS),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    /// Chat-completions endpoint.
    /// Env: `MURMUR_REPLY_ENDPOINT`
    pub reply_endpoint: String,

    /// Bearer token for the reply endpoint.
    /// Env: `MURMUR_API_KEY`
    pub api_key: Option<String>,

    /// Env: `MURMUR_MODEL`
    pub model: String,

    /// Env: `MURMUR_MAX_TOKENS`
    pub max_tokens: u32,

    /// Env: `MURMUR_TEMPERATURE`
    pub temperature: f32,

    /// Env: `MURMUR_REQUEST_TIMEOUT_SECS`
    pub request_timeout: Duration,

    /// Env: `MURMUR_REPLY_DELAY_MS`, `MURMUR_RING_DELAY_MS`, `MURMUR_END_HOLD_MS`
    pub timings: SessionTimings,

    /// Text appended in place of a reply when the backend fails.
    /// Env: `MURMUR_FALLBACK_NOTICE`
    pub fallback_notice: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reply_endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            api_key: None,
            model: "mistral-medium".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
            timings: SessionTimings::default(),
            fallback_notice: FALLBACK_NOTICE.to_string(),
        }
    }
}

// The API key never shows up in logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("reply_endpoint", &self.reply_endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("timings", &self.timings)
            .field("fallback_notice", &self.fallback_notice)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("MURMUR_REPLY_ENDPOINT") {
            config.reply_endpoint = endpoint;
        }

        if let Some(key) = lookup("MURMUR_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        if let Some(model) = lookup("MURMUR_MODEL") {
            config.model = model;
        }

        if let Some(val) = lookup("MURMUR_MAX_TOKENS") {
            parse_into(&val, "MURMUR_MAX_TOKENS", &mut config.max_tokens);
        }

        if let Some(val) = lookup("MURMUR_TEMPERATURE") {
            parse_into(&val, "MURMUR_TEMPERATURE", &mut config.temperature);
        }

        if let Some(val) = lookup("MURMUR_REQUEST_TIMEOUT_SECS") {
            let mut secs = config.request_timeout.as_secs();
            parse_into(&val, "MURMUR_REQUEST_TIMEOUT_SECS", &mut secs);
            config.request_timeout = Duration::from_secs(secs);
        }

        // -- Simulated latency --

        if let Some(val) = lookup("MURMUR_REPLY_DELAY_MS") {
            parse_millis(&val, "MURMUR_REPLY_DELAY_MS", &mut config.timings.reply_delay);
        }

        if let Some(val) = lookup("MURMUR_RING_DELAY_MS") {
            parse_millis(&val, "MURMUR_RING_DELAY_MS", &mut config.timings.ring_delay);
        }

        if let Some(val) = lookup("MURMUR_END_HOLD_MS") {
            parse_millis(&val, "MURMUR_END_HOLD_MS", &mut config.timings.end_hold);
        }

        if let Some(notice) = lookup("MURMUR_FALLBACK_NOTICE") {
            if !notice.trim().is_empty() {
                config.fallback_notice = notice;
            }
        }

        config
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, name: &str, target: &mut T) {
    match value.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => {
            tracing::warn!(value = %value, "Invalid {name}, using default");
        }
    }
}

fn parse_millis(value: &str, name: &str, target: &mut Duration) {
    let mut millis = target.as_millis() as u64;
    parse_into(value, name, &mut millis);
    *target = Duration::from_millis(millis);
}

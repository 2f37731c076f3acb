//! Environment-backed runtime configuration for the reconciliation engine.

use std::{env, error::Error, fmt};

const DEFAULT_INBOUND_BUFFER: usize = 64;
const DEFAULT_EVENT_BUFFER: usize = 64;
const DEFAULT_OUTBOUND_BUFFER: usize = 64;
const DEFAULT_MAX_CACHED_MESSAGES: usize = 1_200;
const DEFAULT_TYPING_STALENESS_MS: u64 = 5_000;
const DEFAULT_TYPING_SWEEP_INTERVAL_MS: u64 = 1_000;
const DEFAULT_READ_STATE_KEY: &str = "read-state";

/// Runtime tuning for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inbound wire-event channel capacity.
    pub inbound_buffer: usize,
    /// Derived-notification broadcast capacity.
    pub event_buffer: usize,
    /// Outbound fire-and-forget call queue capacity.
    pub outbound_buffer: usize,
    /// Per-conversation message cache cap.
    pub max_cached_messages: usize,
    /// Typing entries older than this are swept.
    pub typing_staleness_ms: u64,
    /// Cadence of the typing-expiry sweep.
    pub typing_sweep_interval_ms: u64,
    /// Storage key holding the persisted read-state blob.
    pub read_state_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inbound_buffer: DEFAULT_INBOUND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_cached_messages: DEFAULT_MAX_CACHED_MESSAGES,
            typing_staleness_ms: DEFAULT_TYPING_STALENESS_MS,
            typing_sweep_interval_ms: DEFAULT_TYPING_SWEEP_INTERVAL_MS,
            read_state_key: DEFAULT_READ_STATE_KEY.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let inbound_buffer = parse_optional_usize(
            "OMNICHAT_INBOUND_BUFFER",
            defaults.inbound_buffer,
            &mut lookup,
        )?;
        let event_buffer =
            parse_optional_usize("OMNICHAT_EVENT_BUFFER", defaults.event_buffer, &mut lookup)?;
        let outbound_buffer = parse_optional_usize(
            "OMNICHAT_OUTBOUND_BUFFER",
            defaults.outbound_buffer,
            &mut lookup,
        )?;
        let max_cached_messages = parse_optional_usize(
            "OMNICHAT_MAX_CACHED_MESSAGES",
            defaults.max_cached_messages,
            &mut lookup,
        )?;
        let typing_staleness_ms = parse_optional_u64(
            "OMNICHAT_TYPING_STALENESS_MS",
            defaults.typing_staleness_ms,
            &mut lookup,
        )?;
        let typing_sweep_interval_ms = parse_optional_u64(
            "OMNICHAT_TYPING_SWEEP_INTERVAL_MS",
            defaults.typing_sweep_interval_ms,
            &mut lookup,
        )?;
        let read_state_key = lookup("OMNICHAT_READ_STATE_KEY")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.read_state_key);

        if max_cached_messages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "OMNICHAT_MAX_CACHED_MESSAGES",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if typing_staleness_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "OMNICHAT_TYPING_STALENESS_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if typing_sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "OMNICHAT_TYPING_SWEEP_INTERVAL_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            inbound_buffer,
            event_buffer,
            outbound_buffer,
            max_cached_messages,
            typing_staleness_ms,
            typing_sweep_interval_ms,
            read_state_key,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_u64<F>(key: &'static str, default: u64, lookup: &mut F) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

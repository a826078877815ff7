//! Application-level configuration loading: transaction retry policy, SSE buffering and
//! game defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_LIVE_BACK_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Optimistic transaction retry policy.
    pub transaction: TransactionConfig,
    /// Server-sent events settings.
    pub sse: SseConfig,
    /// Defaults applied when creating games.
    pub game: GameConfig,
}

/// Bounded retry with exponential backoff for conflicting game transactions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Attempts before giving up with a conflict, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound of the doubling delay.
    pub max_backoff_ms: u64,
}

impl TransactionConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

/// Per-game event stream settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Capacity of each game's broadcast channel. Slow subscribers lag past it.
    pub channel_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Defaults for newly created games.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Answer time used when a round does not set one.
    pub default_answer_time_secs: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_answer_time_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        max_attempts = config.transaction.max_attempts,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

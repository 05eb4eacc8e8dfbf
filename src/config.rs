//! Application-level configuration loading: polling cadence, scroll behavior and cache location.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::chat::DEFAULT_SCROLL_THRESHOLD;

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "IZLEK_CONFIG_PATH";

const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_CACHE_DIR: &str = ".izlek-cache";

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the client.
pub struct AppConfig {
    poll_interval: Duration,
    tick_interval: Duration,
    scroll_threshold: f64,
    cache_dir: PathBuf,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        poll_interval_ms = app_config.poll_interval.as_millis() as u64,
                        cache_dir = %app_config.cache_dir.display(),
                        "loaded client config"
                    );
                    app_config
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

    fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Interval between two room polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Interval of the local countdown tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Distance from the bottom under which the chat keeps following new messages.
    pub fn scroll_threshold(&self) -> f64 {
        self.scroll_threshold
    }

    /// Directory holding one cache file per identity.
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    poll_interval_ms: u64,
    tick_interval_ms: u64,
    scroll_threshold: f64,
    cache_dir: PathBuf,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        // A zero period would make tokio intervals panic.
        Self {
            poll_interval: Duration::from_millis(value.poll_interval_ms.max(1)),
            tick_interval: Duration::from_millis(value.tick_interval_ms.max(1)),
            scroll_threshold: value.scroll_threshold,
            cache_dir: value.cache_dir,
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

//! Configuration management for guestlab.
//!
//! Loads configuration from environment variables (a `.env` file is picked
//! up when present). Components take the pieces they need by value, so tests
//! build a [`Config::default`] and override fields instead of touching the
//! process environment.

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use once_cell::sync::Lazy;

use url::Url;

use crate::error::{Error, Result};

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load the configuration from the environment once and keep it.
pub fn init() -> Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: String,
    /// Namespace for every key this crate writes.
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local fast-path lifetime of a guest session.
    pub ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Display-only lifetime of a trained model.
    pub ttl: chrono::Duration,
    /// Delay before the single follow-up poll after a training request.
    pub poll_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.clone(),
                timeout: Duration::from_secs(30),
            },
            store: StoreConfig {
                path: default_store_path(),
                key_prefix: "guestlab".to_string(),
            },
            session: SessionConfig {
                ttl: chrono::Duration::days(7),
            },
            model: ModelConfig {
                ttl: chrono::Duration::hours(24),
                poll_delay: Duration::from_millis(2000),
            },
        }
    }
}

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
static DEFAULT_BASE_URL: Lazy<Url> = Lazy::new(|| Url::parse(DEFAULT_API_URL).unwrap());

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_url = env_or("GUESTLAB_API_URL", DEFAULT_API_URL);
        let base_url = Url::parse(&api_url)
            .map_err(|e| Error::Config(format!("Invalid GUESTLAB_API_URL {}: {}", api_url, e)))?;

        Ok(Self {
            api: ApiConfig {
                base_url,
                timeout: Duration::from_secs(parse_env("GUESTLAB_HTTP_TIMEOUT_SECS", 30)?),
            },
            store: StoreConfig {
                path: env::var("GUESTLAB_STORE_PATH").unwrap_or_else(|_| default_store_path()),
                key_prefix: env_or("GUESTLAB_KEY_PREFIX", "guestlab"),
            },
            session: SessionConfig {
                ttl: chrono::Duration::days(parse_env("SESSION_TTL_DAYS", 7)?),
            },
            model: ModelConfig {
                ttl: chrono::Duration::hours(parse_env("MODEL_TTL_HOURS", 24)?),
                poll_delay: Duration::from_millis(parse_env("TRAINING_POLL_DELAY_MS", 2000)?),
            },
        })
    }
}

/// `<data dir>/guestlab/state.db`, or `./data/guestlab.db` when the platform
/// has no data directory.
fn default_store_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("guestlab").join("state.db"))
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| "./data/guestlab.db".to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

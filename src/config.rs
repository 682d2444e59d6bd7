//! Datasource settings: defaults, an optional TOML file, then `PRTG_*`
//! environment variables.

use crate::constants::{DEFAULT_BASE_URL, ENV_PREFIX};
use crate::prtg::constants::API_CONFIG;
use crate::prtg::error::{PrtgError, Result};
use crate::prtg::query::PrtgTimeZone;
use crate::prtg::validation::Validator;
use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What a query does when a target's device, sensor or channel name does not resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// The target yields an empty series; other targets are unaffected
    #[default]
    EmptySeries,
    /// The whole query fails
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub url: String,
    pub username: String,
    pub passhash: String,
    pub use_cache: bool,
    #[serde(with = "humantime_serde")]
    pub cache_timeout: Duration,
    pub cache_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    pub max_concurrent_requests: usize,
    pub requests_per_second: Option<u32>,
    pub timezone: PrtgTimeZone,
    pub resolution_policy: ResolutionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: DEFAULT_BASE_URL.to_string(),
            username: String::new(),
            passhash: String::new(),
            use_cache: true,
            cache_timeout: API_CONFIG.cache_config.ttl,
            cache_capacity: API_CONFIG.cache_config.capacity,
            request_timeout: API_CONFIG.timeouts.request,
            query_timeout: API_CONFIG.timeouts.query,
            max_retries: API_CONFIG.request_limits.max_retries,
            retry_backoff: API_CONFIG.request_limits.retry_backoff,
            max_concurrent_requests: API_CONFIG.request_limits.max_concurrent,
            requests_per_second: None,
            timezone: PrtgTimeZone::default(),
            resolution_policy: ResolutionPolicy::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` (if given) and the environment.
    ///
    /// Does not validate; callers apply their own overrides first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of the
    /// process environment when given.
    ///
    /// Values stay strings until deserialization so numeric-looking
    /// credentials keep their leading zeros.
    pub fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| PrtgError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        Validator::validate_settings(self)
    }
}

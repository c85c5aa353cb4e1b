//! Run configuration, read from the environment once at start.
use std::{str::FromStr, time::Duration};

use crate::{error::ConfigError, profile::Profile, transport::Endpoints};

/// Which user behaviour is simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scenario {
    /// order creation only
    #[default]
    Order,
    /// store browsing, order creation and own orders listing
    Browse,
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(Scenario::Order),
            "browse" => Ok(Scenario::Browse),
            _ => Err(ConfigError::UnknownScenario(s.to_string())),
        }
    }
}

/// Everything the run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// host of the ordering api
    pub base_url: String,
    /// customer account
    pub username: String,
    /// customer password
    pub password: String,
    /// traffic shape
    pub profile: Profile,
    /// user behaviour
    pub scenario: Scenario,
    /// api paths
    pub endpoints: Endpoints,
    /// pause simulating a human between steps
    pub think_time: Duration,
    /// stores fetched at setup (and on fallback)
    pub store_page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: "http://localhost:8080".to_string(),
            username: "customer".to_string(),
            password: "customer".to_string(),
            profile: Profile::default(),
            scenario: Scenario::default(),
            endpoints: Endpoints::default(),
            think_time: Duration::from_secs(1),
            store_page_size: 50,
        }
    }
}

impl Settings {
    /// read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// read the configuration through `lookup`, empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let mut endpoints = match get("API_PREFIX") {
            Some(prefix) => Endpoints::with_prefix(&prefix),
            None => defaults.endpoints,
        };
        if let Some(login) = get("LOGIN_PATH") {
            endpoints.login = login;
        }

        let think_time = match get("THINK_TIME_SECS") {
            Some(raw) => {
                let secs: f64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    key: "THINK_TIME_SECS".to_string(),
                    value: raw.clone(),
                })?;
                Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidNumber {
                    key: "THINK_TIME_SECS".to_string(),
                    value: raw,
                })?
            }
            None => defaults.think_time,
        };

        Ok(Settings {
            base_url: get("BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            username: get("CUSTOMER_USERNAME").unwrap_or(defaults.username),
            password: get("CUSTOMER_PASSWORD").unwrap_or(defaults.password),
            profile: get("TEST_TYPE")
                .map(|p| p.parse())
                .transpose()?
                .unwrap_or(defaults.profile),
            scenario: get("SCENARIO")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(defaults.scenario),
            endpoints,
            think_time,
            store_page_size: defaults.store_page_size,
        })
    }
}

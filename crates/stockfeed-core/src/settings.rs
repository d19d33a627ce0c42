//! Feed settings.
//!
//! Loaded from an optional TOML file layered under `STOCKFEED__*` environment
//! variables (`__` separates nesting, e.g. `STOCKFEED__PROVIDERS__YAHOO__ENABLED`).
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::provider::ProviderPriorities;
use crate::providers::{AlphaVantageProvider, YahooProvider};
use crate::retry::RetryPolicy;
use crate::throttling::RateLimitConfig;
use crate::transport::TransportConfig;
use crate::{Market, Symbol};

const ENV_PREFIX: &str = "STOCKFEED";
const API_KEY_ENV_VARS: [&str; 2] = ["STOCKFEED_ALPHAVANTAGE_API_KEY", "ALPHAVANTAGE_API_KEY"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub request_timeout_seconds: u64,
    pub max_retry_attempts: u32,
    pub enable_fallback: bool,
    pub cache_duration_minutes: u64,
    pub max_requests_per_minute: u32,
    pub enable_throttling: bool,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_seconds: u64,
    pub market: Market,
    pub health_check_symbol: String,
    pub health_check_timeout_seconds: u64,
    pub providers: ProvidersSettings,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 10,
            max_retry_attempts: 3,
            enable_fallback: true,
            cache_duration_minutes: 5,
            max_requests_per_minute: 5,
            enable_throttling: true,
            circuit_breaker_failure_threshold: 3,
            circuit_breaker_timeout_seconds: 60,
            market: Market::Us,
            health_check_symbol: String::from("AAPL"),
            health_check_timeout_seconds: 10,
            providers: ProvidersSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersSettings {
    pub alphavantage: ProviderSettings,
    pub yahoo: ProviderSettings,
}

/// Per-provider switches. Unset `base_url` and `priority` fall back to the
/// provider's built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub priority: Option<u32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            priority: None,
        }
    }
}

impl FeedSettings {
    /// Loads `path` layered under environment overrides, then validates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(environment())
            .build()?;
        Self::finish(config.try_deserialize()?)
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder().add_source(environment()).build()?;
        Self::finish(config.try_deserialize()?)
    }

    fn finish(mut settings: Self) -> Result<Self, ConfigError> {
        settings.apply_api_key_fallback(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Fills a missing Alpha Vantage key from the conventional variables.
    pub fn apply_api_key_fallback(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let provider = &mut self.providers.alphavantage;
        if provider.api_key.as_deref().is_some_and(|key| !key.trim().is_empty()) {
            return;
        }
        provider.api_key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|key| !key.trim().is_empty());
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_seconds == 0 {
            return Err(invalid("request_timeout_seconds", "must be at least 1"));
        }
        if self.max_retry_attempts == 0 {
            return Err(invalid("max_retry_attempts", "must be at least 1"));
        }
        if self.enable_throttling && self.max_requests_per_minute == 0 {
            return Err(invalid(
                "max_requests_per_minute",
                "must be at least 1 when throttling is enabled",
            ));
        }
        if self.circuit_breaker_failure_threshold == 0 {
            return Err(invalid(
                "circuit_breaker_failure_threshold",
                "must be at least 1",
            ));
        }
        if self.health_check_timeout_seconds == 0 {
            return Err(invalid("health_check_timeout_seconds", "must be at least 1"));
        }
        if let Err(error) = Symbol::parse(&self.health_check_symbol) {
            return Err(invalid("health_check_symbol", error.to_string()));
        }
        for (field, provider) in [
            ("providers.alphavantage.base_url", &self.providers.alphavantage),
            ("providers.yahoo.base_url", &self.providers.yahoo),
        ] {
            if provider
                .base_url
                .as_deref()
                .is_some_and(|url| url.trim().is_empty())
            {
                return Err(invalid(field, "must not be empty"));
            }
        }
        if !self.providers.alphavantage.enabled && !self.providers.yahoo.enabled {
            return Err(invalid("providers", "at least one provider must be enabled"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration_minutes.saturating_mul(60))
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_seconds)
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            cooldown: Duration::from_secs(self.circuit_breaker_timeout_seconds),
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        if self.enable_throttling {
            RateLimitConfig::per_minute(self.max_requests_per_minute)
        } else {
            RateLimitConfig::disabled()
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            request_timeout: self.request_timeout(),
            retry: RetryPolicy::exponential(self.max_retry_attempts),
            rate_limit: self.rate_limit(),
        }
    }

    /// Priority table: configured values, else Alpha Vantage 1 and Yahoo 2.
    pub fn priorities(&self) -> ProviderPriorities {
        ProviderPriorities::new()
            .with(
                AlphaVantageProvider::NAME,
                self.providers.alphavantage.priority.unwrap_or(1),
            )
            .with(YahooProvider::NAME, self.providers.yahoo.priority.unwrap_or(2))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

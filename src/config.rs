use crate::error::{GapFillError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the routing provider credential.
pub const API_KEY_ENV: &str = "ORS_API_KEY";

/// Thresholds for gap classification
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    pub time_threshold_secs: f64,
    pub distance_threshold_km: f64,
}

impl Default for GapConfig {
    fn default() -> Self {
        GapConfig {
            time_threshold_secs: 30.0,
            distance_threshold_km: 0.2,
        }
    }
}

/// Sliding-window budget for provider calls.
///
/// The provider documents roughly 40 calls/minute; 35 leaves headroom.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window_secs: u64,
    pub safety_margin_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_millis(self.safety_margin_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_calls: 35,
            window_secs: 60,
            safety_margin_ms: 100,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    /// Seconds after opening before a single probe call is let through.
    /// `None` keeps the breaker open until a success is recorded.
    pub cooldown_secs: Option<u64>,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown_secs.map(Duration::from_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 3,
            cooldown_secs: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Credential, treating an empty string as absent
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.openrouteservice.org/v2/directions".to_string(),
            profile: "foot-walking".to_string(),
            timeout_secs: 5,
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gaps: GapConfig,
    pub rate_limit: RateLimitConfig,
    pub breaker: BreakerConfig,
    pub provider: ProviderConfig,
    pub pool_size: PoolSize,
}

/// Number of concurrent fill workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolSize(pub usize);

impl Default for PoolSize {
    fn default() -> Self {
        PoolSize(3)
    }
}

impl Config {
    /// Load configuration from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                Self::from_json(&text)?
            }
            None => Config::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.provider.api_key = Some(key);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size.0 == 0 {
            return Err(GapFillError::Config("pool_size must be at least 1".to_string()));
        }
        if self.rate_limit.max_calls == 0 {
            return Err(GapFillError::Config(
                "rate_limit.max_calls must be at least 1".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(GapFillError::Config(
                "breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if !(self.gaps.time_threshold_secs >= 0.0) || !(self.gaps.distance_threshold_km >= 0.0) {
            return Err(GapFillError::Config(
                "gap thresholds must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

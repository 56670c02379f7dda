//! Configuration types.
//!
//! Everything is read from environment variables at startup. Each struct has a
//! `Default` that matches the production defaults, so tests can build configs
//! directly and override only what they care about.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::imagegen::retry::RetryPolicy;
use crate::imagegen::{DEFAULT_API_BASE, DEFAULT_MODEL, ImageConfig};
use crate::storage::StorageConfig;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the axum server binds to on 0.0.0.0.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Cosmetic progress animation shown while a slot is generating.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Progress value set when a task is dispatched.
    pub initial: u8,
    /// Ceiling the ticker never crosses before the real result lands.
    pub cap: u8,
    /// Interval between ticks.
    pub tick: Duration,
    /// Upper bound of the random increment per tick (inclusive).
    pub max_step: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            initial: 10,
            cap: 90,
            tick: Duration::from_millis(500),
            max_step: 8,
        }
    }
}

/// Batch orchestration settings.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Number of tasks dispatched concurrently per batch.
    pub batch_width: usize,
    /// Year printed on the calendar pages.
    pub calendar_year: i32,
    pub progress: ProgressConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_width: 4,
            calendar_year: 2026,
            progress: ProgressConfig::default(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub image: ImageConfig,
    pub retry: RetryPolicy,
    pub generation: GenerationConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let image = ImageConfig {
            api_key: SecretString::from(api_key),
            model: lookup("FUTUREYOU_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("FUTUREYOU_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        };

        let server = ServerConfig {
            port: parse_or(&lookup, "FUTUREYOU_PORT", ServerConfig::default().port)?,
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "FUTUREYOU_MAX_RETRIES", retry_defaults.max_retries)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FUTUREYOU_REQUEST_TIMEOUT_SECS",
                retry_defaults.request_timeout.as_secs(),
            )?),
            ..retry_defaults
        };

        let generation_defaults = GenerationConfig::default();
        let batch_width: usize = parse_or(
            &lookup,
            "FUTUREYOU_BATCH_WIDTH",
            generation_defaults.batch_width,
        )?;
        if batch_width == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FUTUREYOU_BATCH_WIDTH".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let generation = GenerationConfig {
            batch_width,
            calendar_year: parse_or(
                &lookup,
                "FUTUREYOU_CALENDAR_YEAR",
                generation_defaults.calendar_year,
            )?,
            ..generation_defaults
        };

        let storage = StorageConfig {
            base_url: lookup("FUTUREYOU_STORAGE_URL").filter(|s| !s.trim().is_empty()),
            token: lookup("FUTUREYOU_STORAGE_TOKEN").map(SecretString::from),
            namespace: lookup("FUTUREYOU_STORAGE_NAMESPACE")
                .unwrap_or_else(|| StorageConfig::default().namespace),
        };

        Ok(Self {
            server,
            image,
            retry,
            generation,
            storage,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

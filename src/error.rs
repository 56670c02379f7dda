//! Error types for FutureYou.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by an image-generation provider for a single request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} timed out")]
    Timeout {
        provider: String,
        after: Option<Duration>,
    },

    #[error("Connection to {provider} failed: {reason}")]
    Connection { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} overloaded (status {status})")]
    Overloaded { provider: String, status: u16 },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} rejected the request: {reason}")]
    InvalidRequest { provider: String, reason: String },

    #[error("Provider {provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Connection { .. }
                | Self::RateLimited { .. }
                | Self::Overloaded { .. }
        )
    }

    /// Minimum delay the provider asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Terminal outcome of `ImageClient::generate` when no image was produced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("No image returned after {attempts} attempts")]
    NoImage { attempts: u32 },

    #[error("Provider failed after {attempts} attempt(s): {source}")]
    Provider {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

impl GenerateError {
    /// Number of provider calls made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::InvalidPrompt(_) => 0,
            Self::NoImage { attempts } | Self::Provider { attempts, .. } => *attempts,
        }
    }
}

/// Object storage errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Upload of {path} failed: {reason}")]
    UploadFailed { path: String, reason: String },

    #[error("Storage returned HTTP {status} for {path}")]
    Http { path: String, status: u16 },

    #[error("Invalid storage response for {path}: {reason}")]
    InvalidResponse { path: String, reason: String },
}

/// Profile / onboarding validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("At most {max} reference photos are allowed")]
    TooManyPhotos { max: usize },

    #[error("Invalid reference photo: {0}")]
    InvalidPhoto(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Onboarding step {step} is incomplete")]
    StepIncomplete { step: String },

    #[error("Onboarding is already complete")]
    AlreadyComplete,
}

/// Calendar session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Calendar session {id} not found")]
    NotFound { id: Uuid },

    #[error("A batch generation is already running for session {id}")]
    BatchInProgress { id: Uuid },

    #[error("Invalid month index {0} (expected 0-11)")]
    InvalidMonth(u8),

    #[error("Slot {slot} cannot transition from {from} to {to}")]
    InvalidTransition {
        slot: String,
        from: String,
        to: String,
    },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

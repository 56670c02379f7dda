//! Remote image generation.
//!
//! - **provider**: one-shot `ImageProvider` trait and request/response types
//! - **gemini**: HTTP implementation against the Gemini `generateContent` API
//! - **client**: `ImageClient`, which validates prompts and owns the retry loop

pub mod client;
pub mod gemini;
pub mod provider;
pub mod retry;

pub use client::ImageClient;
pub use gemini::GeminiProvider;
pub use provider::*;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

use std::sync::Arc;

/// Image-capable Gemini model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp-image-generation";

/// Public Gemini API root.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Configuration for creating an image provider.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
}

/// Create an image provider from configuration.
pub fn create_provider(config: &ImageConfig) -> Arc<dyn ImageProvider> {
    tracing::info!("Using Gemini (model: {})", config.model);
    Arc::new(GeminiProvider::new(
        config.api_key.clone(),
        config.model.clone(),
        config.base_url.clone(),
    ))
}

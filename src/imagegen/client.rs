//! Retrying image-generation client.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{GenerateError, ProviderError};

use super::provider::{ContentRequest, ImageProvider, InlineImage, PromptPart};
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// What a single attempt produced, before retry bookkeeping.
enum Attempt {
    Image(InlineImage),
    Empty,
    Failed(ProviderError),
}

/// Wraps an `ImageProvider` with prompt validation, per-attempt timeouts and
/// bounded retries.
#[derive(Clone)]
pub struct ImageClient {
    provider: Arc<dyn ImageProvider>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ImageClient {
    pub fn new(provider: Arc<dyn ImageProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Generate one image from an ordered prompt.
    ///
    /// The prompt is at most one inline image followed by exactly one text
    /// part. Returns the first inline image of the first response that has
    /// one.
    pub async fn generate(&self, parts: &[PromptPart]) -> Result<InlineImage, GenerateError> {
        validate_parts(parts)?;

        let request = ContentRequest::new(self.provider.model_name(), parts.to_vec());
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        // Transient backoff never shrinks, even after a long Retry-After.
        let mut transient_floor = Duration::ZERO;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, model = %request.model, "Requesting image");

            match self.attempt(&request).await {
                Attempt::Image(image) => {
                    info!(attempt, mime = %image.mime_type, bytes = image.data.len(), "Image generated");
                    return Ok(image);
                }
                Attempt::Empty => {
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, "No image after final attempt");
                        return Err(GenerateError::NoImage { attempts: attempt });
                    }
                    let delay = self.policy.empty_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "Response had no image, retrying");
                    self.sleeper.sleep(delay).await;
                }
                Attempt::Failed(err) if err.is_transient() => {
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, error = %err, "Transient failure on final attempt");
                        return Err(GenerateError::Provider {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let delay = self.policy.transient_delay(attempt, &err).max(transient_floor);
                    transient_floor = delay;
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Transient provider error, retrying");
                    self.sleeper.sleep(delay).await;
                }
                Attempt::Failed(err) => {
                    warn!(attempt, error = %err, "Permanent provider error");
                    return Err(GenerateError::Provider {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    async fn attempt(&self, request: &ContentRequest) -> Attempt {
        let timeout = self.policy.request_timeout;
        match tokio::time::timeout(timeout, self.provider.generate_content(request)).await {
            Ok(Ok(response)) => match response.into_first_image() {
                Some(image) => Attempt::Image(image),
                None => Attempt::Empty,
            },
            Ok(Err(err)) => Attempt::Failed(err),
            Err(_) => Attempt::Failed(ProviderError::Timeout {
                provider: self.provider.model_name().to_string(),
                after: Some(timeout),
            }),
        }
    }
}

/// Check the `[image?, text]` shape before spending a provider call.
fn validate_parts(parts: &[PromptPart]) -> Result<(), GenerateError> {
    let (last, rest) = parts
        .split_last()
        .ok_or_else(|| GenerateError::InvalidPrompt("prompt has no parts".into()))?;

    match last {
        PromptPart::Text(text) if text.trim().is_empty() => {
            return Err(GenerateError::InvalidPrompt("prompt text is empty".into()));
        }
        PromptPart::Text(_) => {}
        PromptPart::InlineImage(_) => {
            return Err(GenerateError::InvalidPrompt(
                "prompt must end with a text part".into(),
            ));
        }
    }

    match rest {
        [] => Ok(()),
        [PromptPart::InlineImage(image)] if image.data.is_empty() => Err(
            GenerateError::InvalidPrompt("reference image is empty".into()),
        ),
        [PromptPart::InlineImage(_)] => Ok(()),
        _ => Err(GenerateError::InvalidPrompt(
            "expected at most one reference image followed by one text part".into(),
        )),
    }
}

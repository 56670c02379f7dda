//! Gemini `generateContent` provider over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::provider::{
    ContentRequest, ContentResponse, ImageProvider, InlineImage, PromptPart, ResponseModality,
    ResponsePart,
};

const PROVIDER: &str = "gemini";

/// Maximum number of error-body characters kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// Gemini image provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, ProviderError> {
        let body = WireRequest::from_request(request);

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &text));
        }

        let wire: WireResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                map_transport_error(e)
            } else {
                ProviderError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        wire.into_response()
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let provider = PROVIDER.to_string();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status.as_u16() {
        429 => ProviderError::RateLimited {
            provider,
            retry_after,
        },
        500 | 502 | 503 | 504 => ProviderError::Overloaded {
            provider,
            status: status.as_u16(),
        },
        401 | 403 => ProviderError::AuthFailed { provider },
        400 | 404 | 422 => ProviderError::InvalidRequest {
            provider,
            reason: body,
        },
        other => ProviderError::Http {
            provider,
            status: other,
            body,
        },
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            provider: PROVIDER.to_string(),
            after: None,
        }
    } else if e.is_connect() || e.is_request() || e.is_body() {
        ProviderError::Connection {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        }
    } else {
        ProviderError::Http {
            provider: PROVIDER.to_string(),
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            body: e.to_string(),
        }
    }
}

// ── Wire format ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    generation_config: WireGenerationConfig,
}

impl WireRequest {
    fn from_request(request: &ContentRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => WirePart {
                    text: Some(text.clone()),
                    inline_data: None,
                },
                PromptPart::InlineImage(image) => WirePart {
                    text: None,
                    inline_data: Some(WireBlob {
                        mime_type: image.mime_type.clone(),
                        data: STANDARD.encode(&image.data),
                    }),
                },
            })
            .collect();

        Self {
            contents: vec![WireContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: WireGenerationConfig {
                response_modalities: request.response_modalities.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    response_modalities: Vec<ResponseModality>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(
        default,
        alias = "inline_data",
        skip_serializing_if = "Option::is_none"
    )]
    inline_data: Option<WireBlob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize, Default)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize, Default)]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
}

impl WireResponse {
    /// Flatten the first candidate's parts, decoding inline image data.
    fn into_response(self) -> Result<ContentResponse, ProviderError> {
        let parts = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            let inline_data = match part.inline_data {
                Some(blob) => {
                    let data = STANDARD.decode(blob.data.as_bytes()).map_err(|e| {
                        ProviderError::InvalidResponse {
                            provider: PROVIDER.to_string(),
                            reason: format!("inline data is not valid base64: {e}"),
                        }
                    })?;
                    Some(InlineImage::new(blob.mime_type, data))
                }
                None => None,
            };
            out.push(ResponsePart {
                text: part.text,
                inline_data,
            });
        }
        Ok(ContentResponse { parts: out })
    }
}

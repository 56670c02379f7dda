//! Image provider abstraction.
//!
//! A provider performs exactly one request and reports what came back. Retry
//! policy lives in `ImageClient`, not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Raw image bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Non-empty bytes under an `image/*` type.
    pub fn is_usable(&self) -> bool {
        !self.data.is_empty()
            && self
                .mime_type
                .get(..6)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    }
}

impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// One ordered part of a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    InlineImage(InlineImage),
}

impl PromptPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Build the `[reference image?, text]` prompt shape the client accepts.
pub fn prompt_parts(reference: Option<InlineImage>, text: impl Into<String>) -> Vec<PromptPart> {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = reference {
        parts.push(PromptPart::InlineImage(image));
    }
    parts.push(PromptPart::Text(text.into()));
    parts
}

/// Output kinds requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Image,
    Text,
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub model: String,
    pub parts: Vec<PromptPart>,
    pub response_modalities: Vec<ResponseModality>,
}

impl ContentRequest {
    pub fn new(model: impl Into<String>, parts: Vec<PromptPart>) -> Self {
        Self {
            model: model.into(),
            parts,
            response_modalities: vec![ResponseModality::Image, ResponseModality::Text],
        }
    }
}

/// One part of a provider response.
#[derive(Debug, Clone, Default)]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<InlineImage>,
}

/// Provider response: zero or more parts.
#[derive(Debug, Clone, Default)]
pub struct ContentResponse {
    pub parts: Vec<ResponsePart>,
}

impl ContentResponse {
    pub fn image(image: InlineImage) -> Self {
        Self {
            parts: vec![ResponsePart {
                text: None,
                inline_data: Some(image),
            }],
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }

    /// The first usable inline image among the parts, if any. Empty payloads
    /// and non-image types are skipped.
    pub fn first_image(&self) -> Option<&InlineImage> {
        self.parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|image| image.is_usable())
    }

    pub fn into_first_image(self) -> Option<InlineImage> {
        self.parts
            .into_iter()
            .filter_map(|p| p.inline_data)
            .find(InlineImage::is_usable)
    }
}

/// Backend that can turn a prompt into image content.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Perform one generation request.
    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_image_skips_text_parts() {
        let response = ContentResponse {
            parts: vec![
                ResponsePart {
                    text: Some("here you go".into()),
                    inline_data: None,
                },
                ResponsePart {
                    text: None,
                    inline_data: Some(InlineImage::new("image/png", vec![1])),
                },
                ResponsePart {
                    text: None,
                    inline_data: Some(InlineImage::new("image/jpeg", vec![2])),
                },
            ],
        };
        assert_eq!(response.first_image().unwrap().mime_type, "image/png");
        assert_eq!(response.into_first_image().unwrap().data, vec![1]);
    }

    #[test]
    fn unusable_payloads_are_not_images() {
        let response = ContentResponse {
            parts: vec![
                ResponsePart {
                    text: None,
                    inline_data: Some(InlineImage::new("image/png", vec![])),
                },
                ResponsePart {
                    text: None,
                    inline_data: Some(InlineImage::new("application/octet-stream", vec![1])),
                },
            ],
        };
        assert!(response.first_image().is_none());
        assert!(response.into_first_image().is_none());

        assert!(InlineImage::new("IMAGE/PNG", vec![1]).is_usable());
        assert!(!InlineImage::new("img", vec![1]).is_usable());
    }

    #[test]
    fn text_only_has_no_image() {
        assert!(ContentResponse::text("sorry").first_image().is_none());
        assert!(ContentResponse::default().first_image().is_none());
    }

    #[test]
    fn prompt_parts_put_reference_first() {
        let parts = prompt_parts(Some(InlineImage::new("image/png", vec![1])), "go");
        assert!(matches!(parts[0], PromptPart::InlineImage(_)));
        assert_eq!(parts[1], PromptPart::text("go"));
        assert_eq!(prompt_parts(None, "go"), vec![PromptPart::text("go")]);
    }

    #[test]
    fn request_asks_for_image_and_text() {
        let request = ContentRequest::new("m", vec![PromptPart::text("hi")]);
        assert_eq!(
            request.response_modalities,
            vec![ResponseModality::Image, ResponseModality::Text]
        );
        assert_eq!(serde_json::to_string(&ResponseModality::Image).unwrap(), "\"IMAGE\"");
    }
}

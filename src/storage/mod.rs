//! Artifact storage for generated images.
//!
//! Two backends:
//! - **DataUrlStore**: encodes the image into a `data:` URL, nothing leaves the process
//! - **HttpObjectStore**: uploads to a blob service and returns its public URL

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use crate::calendar::{MonthEntry, Path};
use crate::error::StorageError;

/// Storage backend configuration. Without a `base_url` images are returned
/// inline as data URLs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: Option<String>,
    pub token: Option<SecretString>,
    /// Top-level prefix for every artifact path.
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            namespace: "calendars".to_string(),
        }
    }
}

/// An object to write.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub path: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub public: bool,
}

/// Where a stored object can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredObject {
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, request: PutRequest) -> Result<StoredObject, StorageError>;
}

/// File extension for an image MIME type; `png` when it can't be derived.
pub fn extension_for(mime_type: &str) -> &str {
    let subtype = mime_type
        .split_once('/')
        .map(|(_, sub)| sub)
        .unwrap_or("")
        .split(['+', ';'])
        .next()
        .unwrap_or("")
        .trim();
    if subtype.is_empty() { "png" } else { subtype }
}

/// `{namespace}/{calendar_id}/{month}-{path}.{ext}`, month lowercased.
pub fn artifact_path(
    namespace: &str,
    calendar_id: Uuid,
    month: &MonthEntry,
    path: Path,
    mime_type: &str,
) -> String {
    format!(
        "{}/{}/{}-{}.{}",
        namespace.trim_matches('/'),
        calendar_id,
        month.slug(),
        path.as_str(),
        extension_for(mime_type)
    )
}

// ── Data URL store ──────────────────────────────────────────────────────

/// Non-durable store: the "URL" is the image itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUrlStore;

#[async_trait]
impl ObjectStore for DataUrlStore {
    async fn put(&self, request: PutRequest) -> Result<StoredObject, StorageError> {
        if request.bytes.is_empty() {
            return Err(StorageError::UploadFailed {
                path: request.path,
                reason: "empty object".to_string(),
            });
        }
        Ok(StoredObject {
            url: format!(
                "data:{};base64,{}",
                request.content_type,
                STANDARD.encode(&request.bytes)
            ),
        })
    }
}

// ── HTTP blob store ─────────────────────────────────────────────────────

/// Uploads with `PUT {base_url}/{path}` and expects `{"url": "..."}` back.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, request: PutRequest) -> Result<StoredObject, StorageError> {
        let mut builder = self
            .client
            .put(self.object_url(&request.path))
            .header("x-content-type", &request.content_type)
            .header(reqwest::header::CONTENT_TYPE, &request.content_type);
        if request.public {
            builder = builder.header("x-access", "public");
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .body(request.bytes)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed {
                path: request.path.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Http {
                path: request.path,
                status: status.as_u16(),
            });
        }

        let stored: StoredObject =
            response
                .json()
                .await
                .map_err(|e| StorageError::InvalidResponse {
                    path: request.path.clone(),
                    reason: e.to_string(),
                })?;
        if stored.url.trim().is_empty() {
            return Err(StorageError::InvalidResponse {
                path: request.path,
                reason: "empty url".to_string(),
            });
        }
        tracing::debug!(path = %request.path, url = %stored.url, "Object stored");
        Ok(stored)
    }
}

/// Build the store selected by configuration.
pub fn create_store(config: &StorageConfig) -> std::sync::Arc<dyn ObjectStore> {
    match &config.base_url {
        Some(base_url) => {
            tracing::info!("Using HTTP object store at {}", base_url);
            std::sync::Arc::new(HttpObjectStore::new(base_url.clone(), config.token.clone()))
        }
        None => {
            tracing::info!("No storage URL configured; images are returned as data URLs");
            std::sync::Arc::new(DataUrlStore)
        }
    }
}

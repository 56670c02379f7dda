//! HTTP and WebSocket surface.

mod generate;
mod routes;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::SessionError;
use crate::generation::SessionRegistry;
use crate::imagegen::ImageClient;
use crate::onboarding::onboarding_routes;
use crate::storage::ObjectStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Client used by the stateless single-image endpoint.
    pub client: ImageClient,
    pub store: Arc<dyn ObjectStore>,
    pub namespace: String,
}

/// Build the full router: calendar sessions, WebSocket stream, single-image
/// generation and onboarding.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .merge(routes::calendar_routes())
        .merge(ws::ws_routes())
        .merge(generate::generate_routes())
        .with_state(state)
        .merge(onboarding_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn session_error_response(err: SessionError) -> Response {
    let status = match &err {
        SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
        SessionError::BatchInProgress { .. } | SessionError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        SessionError::InvalidMonth(_) => StatusCode::BAD_REQUEST,
    };
    error_body(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::GenerationConfig;
    use crate::error::ProviderError;
    use crate::generation::SessionDeps;
    use crate::imagegen::{
        ContentRequest, ContentResponse, ImageProvider, InlineImage, RetryPolicy, Sleeper,
    };
    use crate::storage::DataUrlStore;

    /// Image for gym prompts, text-only answer for lazy ones.
    struct GymOnly;

    #[async_trait]
    impl ImageProvider for GymOnly {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn generate_content(
            &self,
            request: &ContentRequest,
        ) -> Result<ContentResponse, ProviderError> {
            let lazy = request.parts.iter().any(|p| {
                matches!(p, crate::imagegen::PromptPart::Text(t) if t.contains("on a couch"))
            });
            if lazy {
                Ok(ContentResponse::text("I can't draw that"))
            } else {
                Ok(ContentResponse::image(InlineImage::new("image/png", vec![7, 7])))
            }
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: std::time::Duration) {}
    }

    fn app() -> Router {
        let client = ImageClient::new(Arc::new(GymOnly), RetryPolicy::default())
            .with_sleeper(Arc::new(NoSleep));
        let store: Arc<dyn ObjectStore> = Arc::new(DataUrlStore);
        let registry = SessionRegistry::new(SessionDeps {
            client: client.clone(),
            store: store.clone(),
            config: GenerationConfig::default(),
            namespace: "calendars".into(),
        });
        app_routes(AppState {
            registry,
            client,
            store,
            namespace: "calendars".into(),
        })
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn profile_json() -> serde_json::Value {
        serde_json::json!({
            "goals": ["Fat loss"],
            "workoutStyle": "Weight training",
            "focusAreas": ["Core/Abs"],
        })
    }

    #[tokio::test]
    async fn health_ok() {
        let (status, json) = call(&app(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn generate_image_returns_data_url() {
        let body = serde_json::json!({
            "month": "January",
            "theme": "New Beginnings",
            "path": "gym",
            "goals": ["Fat loss"],
            "workoutStyle": "Weight training",
            "focusAreas": ["Core/Abs"],
        });
        let (status, json) = call(&app(), post_json("/api/generate-image", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["imageUrl"], "data:image/png;base64,Bwc=");
    }

    #[tokio::test]
    async fn generate_image_without_image_is_500() {
        let body = serde_json::json!({ "month": "July", "path": "lazy" });
        let (status, json) = call(&app(), post_json("/api/generate-image", body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No image generated");
    }

    #[tokio::test]
    async fn generate_image_rejects_unknown_month_and_path() {
        let app = app();
        let (status, json) = call(
            &app,
            post_json("/api/generate-image", serde_json::json!({ "month": "Smarch", "path": "gym" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let (status, _) = call(
            &app,
            post_json("/api/generate-image", serde_json::json!({ "month": "May", "path": "sofa" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn calendar_lifecycle() {
        let app = app();
        let (status, json) = call(&app, post_json("/api/calendars", profile_json())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["slots"].as_array().unwrap().len(), 24);
        let id = json["id"].as_str().unwrap().to_string();

        let (status, json) = call(
            &app,
            post_json(
                &format!("/api/calendars/{id}/regenerate"),
                serde_json::json!({ "monthIndex": 0, "path": "gym" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "done");
        assert_eq!(json["progress"], 100);

        let (status, json) = call(
            &app,
            Request::get(format!("/api/calendars/{id}/view")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["anyGenerated"], true);
        assert_eq!(json["allGenerated"], false);
        assert_eq!(json["pages"][0]["gym"]["kind"], "image");
        assert_eq!(json["pages"][0]["lazy"]["kind"], "placeholder");

        let (status, _) = call(
            &app,
            Request::delete(format!("/api/calendars/{id}")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(
            &app,
            Request::get(format!("/api/calendars/{id}")).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn regenerate_validates_month() {
        let app = app();
        let (_, json) = call(&app, post_json("/api/calendars", profile_json())).await;
        let id = json["id"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            post_json(
                &format!("/api/calendars/{id}/regenerate"),
                serde_json::json!({ "monthIndex": 12, "path": "gym" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_rejects_invalid_profile() {
        let (status, json) = call(
            &app(),
            post_json("/api/calendars", serde_json::json!({ "goals": ["Fat loss"] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().contains("workoutStyle"));
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let app = app();
        let (status, _) = call(
            &app,
            Request::get(format!("/api/calendars/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            Request::get("/api/calendars/not-a-uuid").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn onboarding_routes_are_mounted() {
        let (status, _) = call(
            &app(),
            Request::get("/api/onboarding/options").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

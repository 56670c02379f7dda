//! Stateless single-image endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::calendar::{Path as CalendarPath, PromptInput, build_prompt, month_by_name};
use crate::error::{Error, GenerateError};
use crate::imagegen::prompt_parts;
use crate::onboarding::ReferencePhoto;
use crate::storage::{PutRequest, artifact_path};

use super::AppState;

pub(super) fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/generate-image", post(generate_image))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageRequest {
    month: String,
    #[serde(default)]
    theme: Option<String>,
    path: String,
    #[serde(default)]
    goals: Vec<String>,
    #[serde(default)]
    workout_style: String,
    #[serde(default)]
    focus_areas: Vec<String>,
    #[serde(default)]
    confidence_goals: String,
    #[serde(default)]
    user_photo: Option<String>,
    #[serde(default)]
    calendar_id: Option<Uuid>,
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

/// POST /api/generate-image
///
/// Generates one image outside any session. The month name selects the
/// catalog entry; its theme wins over a differing `theme` in the body.
async fn generate_image(
    State(state): State<AppState>,
    Json(body): Json<GenerateImageRequest>,
) -> Response {
    let Some(month) = month_by_name(&body.month) else {
        return failure(StatusCode::BAD_REQUEST, format!("Unknown month: {}", body.month));
    };
    let path: CalendarPath = match body.path.parse() {
        Ok(path) => path,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e),
    };
    if let Some(theme) = body.theme.as_deref() {
        if !theme.eq_ignore_ascii_case(month.theme) {
            debug!(requested = theme, catalog = month.theme, "Ignoring non-catalog theme");
        }
    }
    let reference = match body.user_photo.as_deref().map(ReferencePhoto::from_data_url) {
        Some(Ok(photo)) => Some(photo),
        Some(Err(e)) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
        None => None,
    };

    let input = PromptInput {
        goals: &body.goals,
        workout_style: &body.workout_style,
        focus_areas: &body.focus_areas,
        confidence_goals: &body.confidence_goals,
        has_reference: reference.is_some(),
    };
    let text = build_prompt(month, path, &input);
    let parts = prompt_parts(reference.as_ref().map(ReferencePhoto::to_inline_image), text);

    let result: Result<String, Error> = async {
        let image = state.client.generate(&parts).await?;
        let calendar_id = body.calendar_id.unwrap_or_else(Uuid::new_v4);
        let stored = state
            .store
            .put(PutRequest {
                path: artifact_path(&state.namespace, calendar_id, month, path, &image.mime_type),
                bytes: image.data,
                content_type: image.mime_type,
                public: true,
            })
            .await?;
        Ok(stored.url)
    }
    .await;

    match result {
        Ok(image_url) => Json(serde_json::json!({ "success": true, "imageUrl": image_url }))
            .into_response(),
        Err(Error::Generate(GenerateError::NoImage { attempts })) => {
            warn!(month = month.name, path = %path, attempts, "No image generated");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "No image generated")
        }
        Err(e) => {
            warn!(month = month.name, path = %path, error = %e, "Image generation error");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

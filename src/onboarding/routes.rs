//! REST endpoints for the onboarding wizard.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::model::{FOCUS_AREAS, GOALS, MAX_PHOTOS, Profile, ProfileInput, WORKOUT_STYLES};

/// GET /api/onboarding/options
///
/// Returns the option catalogs the wizard renders.
async fn get_options() -> impl IntoResponse {
    Json(serde_json::json!({
        "goals": GOALS,
        "workoutStyles": WORKOUT_STYLES,
        "focusAreas": FOCUS_AREAS,
        "maxPhotos": MAX_PHOTOS,
    }))
}

/// POST /api/onboarding/validate
///
/// Validates a submitted profile and echoes the normalized version, or 422
/// with the first problem found.
async fn validate_profile(Json(input): Json<ProfileInput>) -> impl IntoResponse {
    match Profile::try_from(input) {
        Ok(profile) => (
            StatusCode::OK,
            Json(serde_json::json!({ "valid": true, "profile": profile })),
        ),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "valid": false, "error": e.to_string() })),
        ),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes() -> Router {
    Router::new()
        .route("/api/onboarding/options", get(get_options))
        .route("/api/onboarding/validate", post(validate_profile))
}

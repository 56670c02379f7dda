//! REST endpoints for calendar sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::calendar::{Path as CalendarPath, TaskKey};
use crate::onboarding::{Profile, ProfileInput};

use super::{AppState, error_body, session_error_response};

pub(super) fn calendar_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/calendars", post(create_calendar))
        .route(
            "/api/calendars/{id}",
            get(get_calendar).delete(delete_calendar),
        )
        .route("/api/calendars/{id}/view", get(get_view))
        .route("/api/calendars/{id}/generate", post(start_generation))
        .route("/api/calendars/{id}/regenerate", post(regenerate_slot))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "future-you"
    }))
}

// ── Sessions ────────────────────────────────────────────────────────────

fn parse_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| error_body(StatusCode::BAD_REQUEST, "Invalid calendar ID"))
}

async fn create_calendar(
    State(state): State<AppState>,
    Json(input): Json<ProfileInput>,
) -> Response {
    let profile = match Profile::try_from(input) {
        Ok(profile) => profile,
        Err(e) => return error_body(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    let session = state.registry.create(profile).await;
    let slots = session.snapshot().await;
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": session.id(), "slots": slots })),
    )
        .into_response()
}

async fn get_calendar(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.registry.get(id).await {
        Ok(session) => {
            let slots = session.snapshot().await;
            Json(serde_json::json!({
                "id": id,
                "complete": session.is_complete().await,
                "batchRunning": session.is_batch_running(),
                "slots": slots,
            }))
            .into_response()
        }
        Err(e) => session_error_response(e),
    }
}

async fn get_view(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.registry.get(id).await {
        Ok(session) => Json(session.view().await).into_response(),
        Err(e) => session_error_response(e),
    }
}

async fn delete_calendar(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if state.registry.remove(id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_body(StatusCode::NOT_FOUND, "Calendar not found")
    }
}

// ── Generation ──────────────────────────────────────────────────────────

async fn start_generation(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let session = match state.registry.get(id).await {
        Ok(session) => session,
        Err(e) => return session_error_response(e),
    };

    // Progress is observed over the WebSocket; the run continues after the
    // returned stream is dropped.
    match session.start_batch_generation() {
        Ok(_events) => {
            info!(session_id = %id, "Batch generation started via REST");
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "status": "started" })),
            )
                .into_response()
        }
        Err(e) => session_error_response(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateRequest {
    month_index: u8,
    path: String,
}

async fn regenerate_slot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RegenerateRequest>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let path: CalendarPath = match body.path.parse() {
        Ok(path) => path,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, e),
    };
    let key = match TaskKey::new(body.month_index, path) {
        Ok(key) => key,
        Err(e) => return session_error_response(e),
    };
    let session = match state.registry.get(id).await {
        Ok(session) => session,
        Err(e) => return session_error_response(e),
    };

    match session.regenerate(key).await {
        Ok(slot) => Json(slot).into_response(),
        Err(e) => session_error_response(e),
    }
}

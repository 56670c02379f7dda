//! WebSocket stream of a calendar session's slot events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::{Path as CalendarPath, TaskKey};
use crate::generation::CalendarSession;

use super::{AppState, error_body, session_error_response};

pub(super) fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/calendars/{id}", get(ws_handler))
}

/// Actions a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction {
    Generate,
    #[serde(rename_all = "camelCase")]
    Regenerate { month_index: u8, path: CalendarPath },
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return error_body(StatusCode::BAD_REQUEST, "Invalid calendar ID");
    };
    match state.registry.get(id).await {
        Ok(session) => {
            info!(session_id = %id, "WebSocket client connecting");
            ws.on_upgrade(move |socket| handle_socket(socket, session))
                .into_response()
        }
        Err(e) => session_error_response(e),
    }
}

async fn send_sync(socket: &mut WebSocket, session: &CalendarSession) -> bool {
    let sync = serde_json::json!({
        "type": "sync",
        "batchRunning": session.is_batch_running(),
        "slots": session.snapshot().await,
    });
    socket
        .send(Message::Text(sync.to_string().into()))
        .await
        .is_ok()
}

async fn handle_socket(mut socket: WebSocket, session: Arc<CalendarSession>) {
    // Subscribe before the initial sync so nothing between the two is lost.
    let mut rx = session.subscribe();

    if !send_sync(&mut socket, &session).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind broadcast");
                        if !send_sync(&mut socket, &session).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &session);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(session_id = %session.id(), "WebSocket connection closed");
}

/// Client actions run in the background; their effects arrive as events.
fn handle_client_message(text: &str, session: &Arc<CalendarSession>) {
    match serde_json::from_str::<ClientAction>(text) {
        Ok(ClientAction::Generate) => match session.start_batch_generation() {
            Ok(_events) => info!(session_id = %session.id(), "Batch generation started via WS"),
            Err(e) => warn!(session_id = %session.id(), error = %e, "Generate rejected"),
        },
        Ok(ClientAction::Regenerate { month_index, path }) => {
            let key = match TaskKey::new(month_index, path) {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "Regenerate rejected");
                    return;
                }
            };
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Err(e) = session.regenerate(key).await {
                    warn!(session_id = %session.id(), slot = %key, error = %e, "Regenerate failed via WS");
                }
            });
        }
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}

//! HTTP routes: connect, disconnect, and the WebSocket attach point.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use labshell_core::{ConnectError, ConnectParams, SessionId};
use labshell_session::lifecycle;

use crate::bridge;
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ssh/connect", post(connect))
        .route("/api/ssh/disconnect", post(disconnect))
        .route("/ssh/{session_id}", get(ws_attach))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectResponse {
    session_id: SessionId,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisconnectRequest {
    session_id: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Request-surface error with its JSON `{error}` body.
enum ApiError {
    Connect(ConnectError),
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Connect(e) => {
                let status = match &e {
                    ConnectError::MalformedKey(_) => StatusCode::BAD_REQUEST,
                    ConnectError::AuthRejected { .. } => StatusCode::UNAUTHORIZED,
                    ConnectError::Unreachable(_)
                    | ConnectError::Timeout { .. }
                    | ConnectError::Handshake(_) => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "No active session found".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": error }))).into_response()
    }
}

async fn connect(
    State(state): State<AppState>,
    Json(params): Json<ConnectParams>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let connection = state.connector.connect(&params).await.map_err(|e| {
        error!(host = %params.host, username = %params.username, error = %e, "Connect failed");
        ApiError::Connect(e)
    })?;

    let session = state.registry.create(connection).await;
    Ok(Json(ConnectResponse {
        session_id: session.id(),
        message: "Connected successfully".to_string(),
    }))
}

async fn disconnect(
    State(state): State<AppState>,
    Json(req): Json<DisconnectRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = parse_handle(&req.session_id)?;
    if lifecycle::teardown(&state.registry, session_id).await {
        Ok(Json(MessageResponse {
            message: "Disconnected successfully".to_string(),
        }))
    } else {
        Err(ApiError::NotFound)
    }
}

async fn ws_attach(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // An unknown handle is reported before any upgrade handshake.
    let session = match parse_handle(&session_id) {
        Ok(id) => state.registry.get(id).await,
        Err(_) => None,
    };
    let Some(session) = session else {
        return ApiError::NotFound.into_response();
    };

    match ws {
        Ok(ws) => {
            info!(session_id = %session.id(), "Streaming channel attaching");
            ws.on_upgrade(move |socket| bridge::run(socket, state, session))
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Unknown and malformed handles are indistinguishable to callers.
fn parse_handle(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

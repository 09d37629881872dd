// handlers.rs

use crate::{
    commands,
    error::{AppError, ErrorCode},
    models::{AppState, BridgeCall, BridgeResponse, Session, SessionCreated},
    utils,
};
use axum::{
    Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit};
use tracing::{error, info};
use uuid::Uuid;

/// Claims one of the bridge connection slots, or reports the server as busy.
pub fn acquire_connection(state: &AppState) -> Result<OwnedSemaphorePermit, AppError> {
    Arc::clone(&state.connections)
        .try_acquire_owned()
        .map_err(|_| AppError::Busy)
}

pub async fn handle_bridge_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let permit = acquire_connection(&state)?;
    info!("Bridge connection attempt");
    Ok(ws.on_upgrade(move |socket: WebSocket| async move {
        let (sender, receiver) = socket.split();
        serve_session(sender, receiver, state).await;
        drop(permit);
    }))
}

/// Runs one bridge session over a frame stream until the peer closes it.
async fn serve_session<Tx, Rx, E>(mut sender: Tx, mut receiver: Rx, state: Arc<AppState>)
where
    Tx: Sink<Message> + Unpin,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    let (session_id, session) = state.open_session();
    utils::record_session_count(&state);
    info!(%session_id, "Bridge session opened");

    // Calls on one connection run in arrival order against its session.
    while let Some(Ok(msg)) = receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
        let Some(response) = answer_frame(&state, &session, msg).await else {
            continue;
        };

        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode response: {}", e);
                break;
            }
        };
        if sender.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }

    drop(session);
    utils::cleanup_session(session_id, &state).await;
}

/// Data frames get exactly one response. Control frames get none.
async fn answer_frame(
    state: &AppState,
    session: &Mutex<Session>,
    msg: Message,
) -> Option<BridgeResponse> {
    let text = match msg {
        Message::Text(text) => text,
        Message::Binary(_) => {
            error!("Binary frame rejected");
            return Some(BridgeResponse::rejected(
                Uuid::nil(),
                ErrorCode::InvalidRequest,
                "Invalid call: binary frames are not supported",
            ));
        }
        _ => return None,
    };

    let response = match serde_json::from_str::<BridgeCall>(text.as_str()) {
        Ok(call) => run_call(state, session, call).await,
        Err(e) => {
            error!("Invalid call format: {}", e);
            BridgeResponse::rejected(
                Uuid::nil(),
                ErrorCode::InvalidRequest,
                format!("Invalid call: {e}"),
            )
        }
    };
    Some(response)
}

async fn run_call(state: &AppState, session: &Mutex<Session>, call: BridgeCall) -> BridgeResponse {
    let mut session = session.lock().await;
    session.touch();
    commands::dispatch(&state.bridge, &mut session, call).await
}

fn lookup(state: &AppState, id: Uuid) -> Result<Arc<Mutex<Session>>, AppError> {
    state
        .sessions
        .get(&id)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or(AppError::SessionNotFound)
}

#[utoipa::path(
    post,
    path = "/api/sessions",
    responses((status = 201, description = "Session created", body = SessionCreated))
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionCreated>) {
    let (session_id, _) = state.open_session();
    utils::record_session_count(&state);
    info!(%session_id, "Session created");
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session state", body = Session),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody)
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    let session = lookup(&state, id)?;
    let snapshot = session.lock().await.clone();
    Ok(Json(snapshot))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/calls",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = BridgeCall,
    responses(
        (
            status = 200,
            description = "Call completed, resolved or rejected",
            body = BridgeResponse
        ),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody)
    )
)]
pub async fn call_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(call): Json<BridgeCall>,
) -> Result<Json<BridgeResponse>, AppError> {
    let session = lookup(&state, id)?;
    Ok(Json(run_call(&state, &session, call).await))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session closed"),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if utils::cleanup_session(id, &state).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::SessionNotFound)
    }
}

#[utoipa::path(
    get,
    path = "/api/methods",
    responses((status = 200, description = "Registered bridge methods", body = Vec<String>))
)]
pub async fn list_methods() -> Json<Vec<&'static str>> {
    Json(commands::methods())
}

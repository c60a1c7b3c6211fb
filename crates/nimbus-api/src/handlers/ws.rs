//! WebSocket upgrade and the per-connection loop.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_realtime::{ClientConnection, ClientMessage, Frame, ServerMessage};
use nimbus_service::RequestContext;

use crate::dto::request::TokenQuery;
use crate::error::ApiResult;
use crate::extractors::auth::authenticate;
use crate::state::AppState;

/// GET /api/ws?token={jwt}
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Response> {
    // Authenticate before upgrade so a bad token is a plain 401.
    let ctx = authenticate(&state, &query.token).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, ctx, socket)))
}

async fn handle_socket(state: AppState, ctx: RequestContext, mut socket: WebSocket) {
    let mut client = match state.hub.register(ctx.user_id).await {
        Ok(client) => client,
        Err(e) => {
            warn!(user_id = %ctx.user_id, error = %e, "Realtime registration failed");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let client_id = client.id;
    info!(client_id = %client_id, user_id = %ctx.user_id, "WebSocket connection established");

    run(&state, &ctx, &mut client, &mut socket).await;

    state.hub.unregister(client_id).await;
    info!(client_id = %client_id, user_id = %ctx.user_id, "WebSocket connection closed");
}

async fn run(
    state: &AppState,
    ctx: &RequestContext,
    client: &mut ClientConnection,
    socket: &mut WebSocket,
) {
    let config = &state.config.realtime;
    let period = Duration::from_secs(config.ping_interval_seconds.max(1));
    let timeout = Duration::from_secs(config.client_timeout_seconds.max(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if last_seen.elapsed() > timeout {
                    debug!(client_id = %client.id, "Realtime client timed out");
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    return;
                }
            }
            outbound = client.recv() => match outbound {
                Some(frame) => {
                    if send_frame(socket, &frame).await.is_err() {
                        return;
                    }
                }
                None => {
                    // Evicted or the hub shut down.
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
            },
            inbound = socket.recv() => {
                let message = match inbound {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(client_id = %client.id, error = %e, "WebSocket error");
                        return;
                    }
                    None => return,
                };
                last_seen = Instant::now();

                let reply = match message {
                    Message::Text(text) => handle_message(state, ctx, client.id, text.as_str()).await,
                    Message::Binary(_) => Some(ServerMessage::error("Binary frames are not supported")),
                    Message::Close(_) => return,
                    Message::Ping(_) | Message::Pong(_) => None,
                };
                if let Some(reply) = reply {
                    let Ok(frame) = reply.to_frame() else { continue };
                    if send_frame(socket, &frame).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    socket.send(Message::Text(frame.as_ref().into())).await
}

async fn handle_message(
    state: &AppState,
    ctx: &RequestContext,
    client_id: Uuid,
    text: &str,
) -> Option<ServerMessage> {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => return Some(ServerMessage::error(e.message)),
    };

    match message {
        ClientMessage::Ping => Some(ServerMessage::Pong),
        ClientMessage::Subscribe { folder_id } => {
            if let Err(e) = owned_folder(state, ctx, folder_id).await {
                return Some(ServerMessage::error(e.message));
            }
            match state.hub.subscribe(client_id, folder_id).await {
                Ok(()) => Some(ServerMessage::Subscribed { folder_id }),
                Err(e) => Some(ServerMessage::error(e.message)),
            }
        }
        ClientMessage::Unsubscribe { folder_id } => {
            match state.hub.unsubscribe(client_id, folder_id).await {
                Ok(()) => Some(ServerMessage::Unsubscribed { folder_id }),
                Err(e) => Some(ServerMessage::error(e.message)),
            }
        }
    }
}

async fn owned_folder(state: &AppState, ctx: &RequestContext, folder_id: Uuid) -> Result<(), AppError> {
    let folder = state.files.get(ctx, folder_id).await?;
    if !folder.is_folder || folder.is_trashed {
        return Err(AppError::not_found("Folder not found"));
    }
    Ok(())
}

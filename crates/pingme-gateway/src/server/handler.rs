//! WebSocket handler
//!
//! Runs the per-connection state machine: Connecting on transport accept,
//! Authenticated once the bearer token verifies, Open after registration,
//! Closed on any transport close or error from either direction.

use crate::connection::{ConnectionHandle, ConnectionState};
use crate::protocol::{ClientEvent, CloseCode, ServerEvent};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use pingme_core::DeliveryError;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Channel buffer size for outgoing events
const OUTBOUND_BUFFER_SIZE: usize = 100;

/// Query parameters accepted on the websocket route
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// WebSocket gateway handler
///
/// The bearer token arrives in the `Authorization` header or, for clients
/// that cannot set headers on websocket upgrades, a `token` query parameter.
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = bearer_token(&headers).or(params.token);
    ws.on_upgrade(move |socket| handle_socket(state, socket, token))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket, token: Option<String>) {
    // Connecting: transport accepted, no identity yet
    let Some(token) = token else {
        tracing::debug!("Handshake rejected: no token supplied");
        close_with(socket, CloseCode::AuthenticationFailed).await;
        return;
    };

    let user_id = match state.identity().verify_token(&token).await {
        Ok(user_id) => user_id,
        Err(error) => {
            let code = if matches!(error, DeliveryError::Auth(_)) {
                CloseCode::AuthenticationFailed
            } else {
                CloseCode::UnknownError
            };
            tracing::debug!(error = %error, "Handshake rejected");
            close_with(socket, code).await;
            return;
        }
    };

    // Authenticated: build the handle and its single-writer outbound queue
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER_SIZE);
    let handle = ConnectionHandle::new(user_id, tx);
    let connection_id = handle.id();

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        "Connection established"
    );

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Writer task: drains the outbound queue onto the transport. Ends once
    // every sender clone of the handle is gone or the peer stops reading.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.to_json() {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::error!(error = %error, "Failed to encode outbound event");
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    // Open: reachable for fan-out from here on
    state.registry().register(Arc::clone(&handle));
    handle.set_state(ConnectionState::Open);

    // Inbound decode loop
    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text_frame(&state, &handle, &text).await,
            Ok(Message::Binary(_)) => {
                let error = DeliveryError::Decode("binary frames are not supported".to_string());
                report_error(&handle, &error).await;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection_id, "Client closed connection");
                break;
            }
            Err(error) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %error,
                    "WebSocket error"
                );
                break;
            }
        }
    }

    // Closed: terminal. Unregistering fires the presence edge if this was
    // the user's last handle.
    handle.set_state(ConnectionState::Closed);
    state.registry().unregister(&handle);

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        "Connection closed"
    );

    drop(handle);
    let _ = send_task.await;
}

/// Decode one text frame and dispatch it.
///
/// Dispatch runs on a detached task: tearing down this connection cancels
/// only its decode loop, never a persist or fan-out already in flight.
async fn handle_text_frame(state: &GatewayState, handle: &Arc<ConnectionHandle>, text: &str) {
    let event = match ClientEvent::decode(text) {
        Ok(event) => event,
        Err(error) => {
            tracing::debug!(
                connection_id = %handle.id(),
                error = %error,
                "Failed to decode inbound event"
            );
            report_error(handle, &error).await;
            return;
        }
    };

    tracing::trace!(
        connection_id = %handle.id(),
        event = event.kind(),
        conversation_id = %event.conversation_id(),
        "Event received"
    );

    let router = Arc::clone(state.router());
    let handle = Arc::clone(handle);
    let user_id = handle.user_id();

    tokio::spawn(async move {
        match router.dispatch(user_id, event).await {
            Ok(Some(ack)) => {
                if handle.push(ack).await.is_err() {
                    tracing::trace!(
                        connection_id = %handle.id(),
                        "Ack dropped, connection closed"
                    );
                }
            }
            Ok(None) => {}
            Err(error) => report_error(&handle, &error).await,
        }
    });
}

/// Report a failure to the requesting connection only.
async fn report_error(handle: &ConnectionHandle, error: &DeliveryError) {
    if matches!(error, DeliveryError::ConnectionClosed) {
        // Late operation on a torn-down connection: dropped, never surfaced
        tracing::debug!(
            connection_id = %handle.id(),
            "Operation resolved after connection close"
        );
        return;
    }

    if handle.push(ServerEvent::error(error)).await.is_err() {
        tracing::trace!(
            connection_id = %handle.id(),
            "Error report dropped, connection closed"
        );
    }
}

/// Close an unregistered socket with an application close code.
async fn close_with(mut socket: WebSocket, code: CloseCode) {
    let frame = CloseFrame {
        code: code.as_u16(),
        reason: code.description().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

use super::AppState;
use super::control::{handle_client_message, reject_malformed};
use super::events::{ClientMessage, ServerMessage};
use crate::observability::{ObserverEvent, ObserverMetric};
use crate::session::{MediaChannel, MediaKind};
use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// Control channel: `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let ctx = Arc::clone(&state.ctx);
    let channel = match ctx.sessions.open() {
        Ok(channel) => channel,
        Err(error) => {
            tracing::warn!(error = %error, "refusing control connection");
            let refusal = ServerMessage::error("session_limit", error.to_string());
            let _ = socket.send(Message::Text(refusal.to_json().into())).await;
            let _ = socket.close().await;
            return;
        }
    };
    let session_id = channel.id;
    let mut outbound = channel.receiver;
    let connected_at = Instant::now();

    ctx.observer.record_event(&ObserverEvent::SessionConnected {
        session_id: session_id.clone(),
    });
    ctx.observer
        .record_metric(&ObserverMetric::ActiveSessions(ctx.sessions.len() as u64));

    let (mut sink, mut stream) = socket.split();

    // sole writer; ends when the registry drops the session's sender
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(Message::Text(message.to_json().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    if ctx
        .sessions
        .send_to(&session_id, ServerMessage::connected(&session_id))
        .is_err()
    {
        writer.abort();
        return;
    }

    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(session_id = %session_id, "websocket receive error: {error}");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                ctx.sessions.touch(&session_id);
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::RequestReward { reward, timestamp }) => {
                        // computations outlive the socket; other requests keep flowing
                        let ctx = Arc::clone(&ctx);
                        let session_id = session_id.clone();
                        tokio::spawn(async move {
                            let request = ClientMessage::RequestReward { reward, timestamp };
                            handle_client_message(&ctx, &session_id, request).await;
                        });
                    }
                    Ok(request) => handle_client_message(&ctx, &session_id, request).await,
                    Err(error) => reject_malformed(&ctx, &session_id, &error),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    ctx.sessions.unregister(&session_id);
    writer.abort();

    ctx.observer.record_event(&ObserverEvent::SessionDisconnected {
        session_id,
        duration: connected_at.elapsed(),
    });
    ctx.observer
        .record_metric(&ObserverMetric::ActiveSessions(ctx.sessions.len() as u64));
}

#[derive(Debug, Deserialize)]
pub struct FrameStreamQuery {
    pub session_id: Option<String>,
}

/// Built-in media channel: `GET /ws/frames?session_id=...` streams encoded
/// frames as binary messages.
pub async fn frames_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<FrameStreamQuery>,
    State(state): State<AppState>,
) -> Response {
    let attachment = match query.session_id {
        Some(session_id) => {
            let media = MediaChannel::new(session_id.clone(), MediaKind::FrameSocket);
            if let Err(error) = state.ctx.sessions.attach_media(&session_id, media.clone()) {
                return (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({"error": error.to_string()})),
                )
                    .into_response();
            }
            Some((session_id, media.cancel))
        }
        None => None,
    };

    ws.on_upgrade(move |socket| stream_frames(socket, state, attachment))
        .into_response()
}

async fn stream_frames(
    socket: WebSocket,
    state: AppState,
    attachment: Option<(String, CancellationToken)>,
) {
    let cancel = attachment
        .as_ref()
        .map(|(_, token)| token.clone())
        .unwrap_or_default();
    let mut frames = state.ctx.simulation.subscribe_frames();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            incoming = stream.next() => match incoming {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if sink.send(Message::Binary(frame.encode().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "frame consumer lagging");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Some((session_id, token)) = attachment
        && !token.is_cancelled()
    {
        state.ctx.sessions.detach_media(&session_id);
    }
    let _ = sink.close().await;
}

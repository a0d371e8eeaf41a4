use super::AppState;
use crate::error::SignalingError;
use crate::media::{IceCandidate, SessionDescription};
use crate::session::{MediaChannel, MediaKind};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

/// GET /health: liveness plus a snapshot of sessions, cache and worker
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = &state.ctx;
    let simulation = ctx.simulation.status();
    let body = serde_json::json!({
        "status": if simulation.running { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": ctx.uptime().as_secs(),
        "sessions": ctx.sessions.len(),
        "cache": ctx.cache().stats(),
        "in_flight": ctx.coordinator.in_flight(),
        "simulation": simulation,
        "queue_depth": ctx.simulation.queue_depth(),
        "peer_transport": ctx.signaling.is_available(),
    });
    Json(body)
}

#[derive(Debug, Deserialize)]
pub struct OfferBody {
    pub client_id: String,
    pub sdp: String,
    #[serde(rename = "type", default)]
    pub sdp_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IceCandidateBody {
    pub client_id: String,
    #[serde(flatten)]
    pub candidate: IceCandidate,
}

#[derive(Debug, Deserialize)]
pub struct DisconnectBody {
    pub client_id: String,
}

fn signaling_error_response(error: &SignalingError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match error {
        SignalingError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        SignalingError::UnknownClient(_) => StatusCode::NOT_FOUND,
        SignalingError::Peer(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::json!({"error": error.to_string()})))
}

/// POST /offer: negotiate a peer for `client_id`
pub async fn handle_offer(
    State(state): State<AppState>,
    Json(body): Json<OfferBody>,
) -> impl IntoResponse {
    let offer = SessionDescription {
        sdp: body.sdp,
        sdp_type: body.sdp_type.unwrap_or_else(|| "offer".into()),
    };

    match state.ctx.signaling.offer(&body.client_id, offer).await {
        Ok(answer) => {
            // a client id that names a control session ties the peer to it
            let media = MediaChannel::new(body.client_id.clone(), MediaKind::Peer);
            if state
                .ctx
                .sessions
                .attach_media(&body.client_id, media)
                .is_err()
            {
                tracing::debug!(client_id = %body.client_id, "peer without control session");
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({"sdp": answer.sdp, "sdpType": answer.sdp_type})),
            )
        }
        Err(error) => {
            tracing::warn!(client_id = %body.client_id, error = %error, "offer failed");
            signaling_error_response(&error)
        }
    }
}

/// POST /ice-candidate: forward or buffer a remote candidate
pub async fn handle_ice_candidate(
    State(state): State<AppState>,
    Json(body): Json<IceCandidateBody>,
) -> impl IntoResponse {
    match state
        .ctx
        .signaling
        .add_ice_candidate(&body.client_id, body.candidate)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"success": true}))),
        Err(error) => signaling_error_response(&error),
    }
}

/// POST /disconnect: release the peer for `client_id`
pub async fn handle_disconnect(
    State(state): State<AppState>,
    Json(body): Json<DisconnectBody>,
) -> impl IntoResponse {
    match state.ctx.signaling.disconnect(&body.client_id).await {
        Ok(existed) => {
            state.ctx.sessions.detach_media(&body.client_id);
            (
                StatusCode::OK,
                Json(serde_json::json!({"success": true, "existed": existed})),
            )
        }
        Err(error) => signaling_error_response(&error),
    }
}

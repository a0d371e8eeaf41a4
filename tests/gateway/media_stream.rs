use crate::support::gateway_harness::{ControlClient, GatewayTestServer, move_ego};
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn frames_stream_once_a_reward_is_active() {
    let server = GatewayTestServer::start_with(
        |config| {
            config.simulation.autoplay = true;
            config.simulation.fps = 120;
        },
        Duration::ZERO,
    )
    .await;
    let mut control = ControlClient::connect(&server).await;
    let (mut frames, _) = connect_async(server.ws_url(&format!(
        "/ws/frames?session_id={}",
        control.session_id
    )))
    .await
    .expect("frame socket should connect");

    control
        .send(json!({"type": "set_video_quality", "quality": "low"}))
        .await;
    assert_eq!(control.recv_type("video_quality").await["success"], true);
    control
        .send(json!({"type": "request_reward", "reward": move_ego(1.0)}))
        .await;
    control.recv_type("reward_active").await;

    let frame = loop {
        let message = tokio::time::timeout(Duration::from_secs(10), frames.next())
            .await
            .expect("a frame should arrive")
            .expect("frame stream open")
            .expect("frame stream healthy");
        if let Message::Binary(bytes) = message {
            break bytes;
        }
    };

    let width = u32::from_le_bytes(frame[0..4].try_into().unwrap());
    let height = u32::from_le_bytes(frame[4..8].try_into().unwrap());
    assert_eq!((width, height), (320, 240));
    assert_eq!(frame.len(), 16 + 320 * 240 * 3);

    let sessions: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions["sessions"], 1);
}

#[tokio::test]
async fn frame_stream_for_unknown_session_is_rejected() {
    let server = GatewayTestServer::start().await;
    let result = connect_async(server.ws_url("/ws/frames?session_id=nope")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn signaling_answers_503_without_peer_transport() {
    let server = GatewayTestServer::start().await;
    let client = reqwest::Client::new();

    let offer = client
        .post(server.url("/offer"))
        .json(&json!({"client_id": "c1", "sdp": "v=0", "type": "offer"}))
        .send()
        .await
        .unwrap();
    assert_eq!(offer.status(), StatusCode::SERVICE_UNAVAILABLE);

    let candidate = client
        .post(server.url("/ice-candidate"))
        .json(&json!({"client_id": "c1", "candidate": "candidate:1", "sdpMid": "0"}))
        .send()
        .await
        .unwrap();
    assert_eq!(candidate.status(), StatusCode::SERVICE_UNAVAILABLE);

    let disconnect = client
        .post(server.url("/disconnect"))
        .json(&json!({"client_id": "c1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(disconnect.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = GatewayTestServer::start().await;
    let huge = "x".repeat(70_000);
    let response = reqwest::Client::new()
        .post(server.url("/offer"))
        .header("content-type", "application/json")
        .body(format!(r#"{{"client_id":"c","sdp":"{huge}"}}"#))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

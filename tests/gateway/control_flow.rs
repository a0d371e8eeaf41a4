use crate::support::gateway_harness::{ControlClient, GatewayTestServer, move_ego};
use serde_json::{Value, json};
use std::time::Duration;

#[tokio::test]
async fn connect_announces_session_and_version() {
    let server = GatewayTestServer::start().await;
    let client = ControlClient::connect(&server).await;

    assert!(!client.session_id.is_empty());
    assert!(server.ctx.sessions.contains(&client.session_id));
    client.close().await;
}

#[tokio::test]
async fn move_ego_from_two_sessions_is_computed_once() {
    let server = GatewayTestServer::start().await;
    let mut first = ControlClient::connect(&server).await;
    let mut second = ControlClient::connect(&server).await;

    first
        .send(json!({"type": "request_reward", "reward": move_ego(2.0), "timestamp": 1.0}))
        .await;
    let result = first.recv_type("reward_result").await;
    assert_eq!(result["cached"], false);
    assert_eq!(result["context_dim"], 16);
    assert_eq!(result["timestamp"], 1.0);
    let key = result["key"].as_str().unwrap().to_string();

    let active = second.recv_type("reward_active").await;
    assert_eq!(active["key"], key.as_str());

    // same terms, different spelling of the defaults
    second
        .send(json!({
            "type": "request_reward",
            "reward": {
                "terms": [{"name": "move-ego", "move_speed": 2.0, "move_angle": 0.0}],
                "weights": [1.0]
            }
        }))
        .await;
    let result = second.recv_type("reward_result").await;
    assert_eq!(result["cached"], true);
    assert_eq!(result["key"], key.as_str());

    assert_eq!(server.inferences(), 1);
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_inference() {
    let server = GatewayTestServer::start_with(|_| {}, Duration::from_millis(300)).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(ControlClient::connect(&server).await);
    }

    for client in &mut clients {
        client
            .send(json!({"type": "request_reward", "reward": move_ego(1.0)}))
            .await;
    }
    let mut keys = Vec::new();
    for client in &mut clients {
        let result = client.recv_type("reward_result").await;
        keys.push(result["key"].clone());
    }

    assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(server.inferences(), 1);
}

#[tokio::test]
async fn clean_rewards_forces_recomputation() {
    let server = GatewayTestServer::start().await;
    let mut client = ControlClient::connect(&server).await;

    client
        .send(json!({"type": "request_reward", "reward": move_ego(1.5)}))
        .await;
    client.recv_type("reward_active").await;
    assert_eq!(server.inferences(), 1);

    client.send(json!({"type": "clean_rewards"})).await;
    let cleaned = client.recv_type("rewards_cleaned").await;
    assert_eq!(cleaned["removed"], 1);
    assert_eq!(server.ctx.cache().disk().count(), 0);

    client
        .send(json!({"type": "request_reward", "reward": move_ego(1.5)}))
        .await;
    let result = client.recv_type("reward_result").await;
    assert_eq!(result["cached"], false);
    assert_eq!(server.inferences(), 2);
}

#[tokio::test]
async fn disconnected_session_is_dropped_during_broadcast() {
    let server = GatewayTestServer::start().await;
    let mut staying = ControlClient::connect(&server).await;
    let leaving = ControlClient::connect(&server).await;
    let leaving_id = leaving.session_id.clone();
    drop(leaving);

    staying
        .send(json!({"type": "request_reward", "reward": move_ego(0.5)}))
        .await;
    staying.recv_type("reward_active").await;

    for _ in 0..100 {
        if !server.ctx.sessions.contains(&leaving_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!server.ctx.sessions.contains(&leaving_id));
    assert!(server.ctx.sessions.contains(&staying.session_id));

    staying.send(json!({"type": "ping", "timestamp": 3.0})).await;
    assert_eq!(staying.recv_type("pong").await["timestamp"], 3.0);
}

#[tokio::test]
async fn bad_input_is_reported_without_dropping_the_session() {
    let server = GatewayTestServer::start().await;
    let mut client = ControlClient::connect(&server).await;

    client.send_raw("{not json").await;
    let error = client.recv_type("error").await;
    assert_eq!(error["code"], "invalid_message");

    client
        .send(json!({
            "type": "request_reward",
            "reward": {"terms": [{"name": "move-ego", "move_speed": -1.0}]}
        }))
        .await;
    let error = client.recv_type("error").await;
    assert_eq!(error["code"], "validation");
    assert_eq!(server.inferences(), 0);

    client.send(json!({"type": "list_presets"})).await;
    let presets = client.recv_type("presets").await;
    assert_eq!(presets["names"], Value::Array(vec![]));
}

#[tokio::test]
async fn presets_and_poses_round_trip_over_the_socket() {
    let server = GatewayTestServer::start().await;
    let mut client = ControlClient::connect(&server).await;

    client
        .send(json!({"type": "save_preset", "name": "jog", "reward": move_ego(3.0)}))
        .await;
    assert_eq!(client.recv_type("preset_saved").await["name"], "jog");

    client.send(json!({"type": "load_preset", "name": "jog"})).await;
    let preset = client.recv_type("preset").await;
    assert_eq!(preset["reward"]["terms"][0]["move_speed"], 3.0);

    client.send(json!({"type": "capture_pose"})).await;
    let pose = client.recv_type("pose_captured").await;
    assert!(pose["id"].as_i64().is_some());

    client.send(json!({"type": "debug_model_info"})).await;
    let info = client.recv_type("model_info").await;
    assert_eq!(info["body_names"].as_array().map(Vec::len), Some(24));
}

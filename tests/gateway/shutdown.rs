use crate::support::gateway_harness::{ControlClient, GatewayTestServer, move_ego};
use motion_gateway::error::SimulationError;
use serde_json::json;

#[tokio::test]
async fn shutdown_closes_sessions_and_persists_cache() {
    let mut server = GatewayTestServer::start().await;
    let mut client = ControlClient::connect(&server).await;

    client
        .send(json!({"type": "request_reward", "reward": move_ego(2.5)}))
        .await;
    let result = client.recv_type("reward_result").await;
    let key = motion_gateway::reward::CacheKey::from_canonical(
        result["key"].as_str().unwrap().to_string(),
    );

    server.stop().await.expect("gateway should stop cleanly");

    assert!(client.closed().await);
    assert!(server.ctx.is_stopped());
    assert!(server.ctx.sessions.is_empty());
    assert!(server.ctx.cache().disk().contains(&key));
    assert_eq!(
        server.ctx.simulation.reset().await,
        Err(SimulationError::WorkerStopped)
    );
}

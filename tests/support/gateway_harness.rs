#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use motion_gateway::cache::{ContextVector, TieredContextCache};
use motion_gateway::config::Config;
use motion_gateway::error::ComputationError;
use motion_gateway::observability::create_observer;
use motion_gateway::presets::PresetStore;
use motion_gateway::reward::RewardConfiguration;
use motion_gateway::simulation::{
    ACTION_DIM, Environment, KinematicEnvironment, LinearPolicy, Observation, PolicyModel,
    SimulationHandle,
};
use motion_gateway::transport::gateway::run_gateway_with_listener;
use motion_gateway::AppContext;
use rand::rngs::StdRng;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Built-in linear policy that counts inferences and can be slowed down.
pub struct CountingPolicy {
    inner: LinearPolicy,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl PolicyModel for CountingPolicy {
    fn context_dim(&self) -> usize {
        self.inner.context_dim()
    }

    fn sample_context(&mut self, rng: &mut StdRng) -> ContextVector {
        self.inner.sample_context(rng)
    }

    fn infer_context(
        &mut self,
        env: &dyn Environment,
        reward: &RewardConfiguration,
        rng: &mut StdRng,
    ) -> Result<ContextVector, ComputationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.infer_context(env, reward, rng)
    }

    fn act(&mut self, observation: &Observation, context: &ContextVector) -> Vec<f64> {
        self.inner.act(observation, context)
    }
}

pub struct GatewayTestServer {
    pub port: u16,
    pub ctx: Arc<AppContext>,
    pub calls: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<anyhow::Result<()>>>,
    _workspace: TempDir,
}

impl GatewayTestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}, Duration::ZERO).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut Config), infer_delay: Duration) -> Self {
        let workspace = TempDir::new().expect("temp workspace should be created");
        let mut config = Config::default();
        config.data_dir = workspace.path().to_path_buf();
        config.config_path = workspace.path().join("config.toml");
        config.cache.dir = workspace.path().join("cache").display().to_string();
        config.presets.db_path = workspace.path().join("presets.db").display().to_string();
        config.simulation.context_dim = 16;
        config.simulation.inference_samples = 128;
        config.simulation.autoplay = false;
        config.simulation.fps = 60;
        config.observability.backend = "none".into();
        configure(&mut config);

        let calls = Arc::new(AtomicUsize::new(0));
        let policy = CountingPolicy {
            inner: LinearPolicy::new(
                config.simulation.context_dim,
                ACTION_DIM,
                config.simulation.inference_samples,
                config.simulation.seed,
            ),
            calls: Arc::clone(&calls),
            delay: infer_delay,
        };
        let simulation = SimulationHandle::spawn(
            Box::new(KinematicEnvironment::new(config.simulation.max_episode_steps)),
            Box::new(policy),
            &config.simulation,
            config.video.default_quality,
        )
        .expect("simulation worker should start");
        let cache = Arc::new(TieredContextCache::from_config(&config));
        let presets = PresetStore::open(&config.presets.resolved_path())
            .await
            .expect("preset database should open");
        let observer = create_observer(&config.observability);
        let ctx = Arc::new(AppContext::from_parts(
            config, cache, simulation, presets, observer,
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral gateway listener should bind");
        let port = listener
            .local_addr()
            .expect("ephemeral gateway listener should expose local address")
            .port();

        let (shutdown, signal) = oneshot::channel::<()>();
        let server_ctx = Arc::clone(&ctx);
        let handle = tokio::spawn(async move {
            run_gateway_with_listener("127.0.0.1", listener, server_ctx, async {
                let _ = signal.await;
            })
            .await
        });

        wait_until_gateway_ready(port).await;

        Self {
            port,
            ctx,
            calls,
            shutdown: Some(shutdown),
            handle: Some(handle),
            _workspace: workspace,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://127.0.0.1:{}{path}", self.port)
    }

    pub fn inferences(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fire the shutdown signal and wait for the server task to return.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.handle.take() {
            Some(handle) => tokio::time::timeout(RECV_TIMEOUT, handle)
                .await
                .expect("gateway should stop")
                .expect("gateway task should not panic"),
            None => Ok(()),
        }
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn wait_until_gateway_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await;
        if matches!(health, Ok(resp) if resp.status() == StatusCode::OK) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("gateway did not become ready on port {port}");
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected control-channel client.
pub struct ControlClient {
    socket: Socket,
    pub session_id: String,
}

impl ControlClient {
    pub async fn connect(server: &GatewayTestServer) -> Self {
        let (socket, _) = connect_async(server.ws_url("/ws"))
            .await
            .expect("control socket should connect");
        let mut client = Self {
            socket,
            session_id: String::new(),
        };
        let connected = client.recv().await;
        assert_eq!(connected["type"], "connected");
        client.session_id = connected["session_id"]
            .as_str()
            .expect("connected carries a session id")
            .to_string();
        client
    }

    pub async fn send(&mut self, value: Value) {
        self.socket
            .send(Message::text(value.to_string()))
            .await
            .expect("control message should send");
    }

    pub async fn send_raw(&mut self, raw: &str) {
        self.socket
            .send(Message::text(raw.to_string()))
            .await
            .expect("raw message should send");
    }

    /// Next JSON message, skipping control frames.
    pub async fn recv(&mut self) -> Value {
        loop {
            let next = tokio::time::timeout(RECV_TIMEOUT, self.socket.next())
                .await
                .expect("timed out waiting for a server message")
                .expect("socket closed unexpectedly")
                .expect("socket error");
            if let Message::Text(text) = next {
                return serde_json::from_str(text.as_str()).expect("server sends JSON");
            }
        }
    }

    /// Skip messages until one of type `kind` arrives.
    pub async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let message = self.recv().await;
            if message["type"] == kind {
                return message;
            }
        }
    }

    /// True once the server has closed the stream.
    pub async fn closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.socket.next()).await {
                Err(_) => return false,
                Ok(None | Some(Err(_) | Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

pub fn move_ego(speed: f64) -> Value {
    serde_json::json!({"terms": [{"name": "move-ego", "move_speed": speed}]})
}

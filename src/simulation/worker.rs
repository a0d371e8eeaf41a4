//! The single owner of the environment and policy.
//!
//! A dedicated OS thread runs a paced loop: drain queued requests, then, if a
//! context is active and autoplay is on, act → step → render. Requests are
//! applied in submission order and context inference only ever runs between
//! steps.

use super::traits::{Environment, PolicyModel};
use super::types::{Frame, Observation, PoseSnapshot, VideoQuality};
use crate::cache::ContextVector;
use crate::config::SimulationConfig;
use crate::error::{ComputationError, SimulationError};
use crate::reward::{CacheKey, RewardConfiguration};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const FRAME_BUFFER: usize = 4;

type Reply<T> = oneshot::Sender<T>;

enum Request {
    ComputeContext {
        reward: Box<RewardConfiguration>,
        reply: Reply<Result<ContextVector, ComputationError>>,
    },
    Activate {
        key: CacheKey,
        context: ContextVector,
        reply: Reply<Result<(), ComputationError>>,
    },
    Step {
        count: u32,
        reply: Reply<u64>,
    },
    Reset {
        reply: Reply<()>,
    },
    BodyNames {
        reply: Reply<Vec<String>>,
    },
    CapturePose {
        reply: Reply<PoseSnapshot>,
    },
    SetVideoQuality {
        quality: VideoQuality,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Latest state published by the worker after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    /// Steps in the current episode.
    pub step: u64,
    pub total_steps: u64,
    pub episodes: u64,
    pub active_key: Option<CacheKey>,
    pub quality: VideoQuality,
    pub running: bool,
}

/// Cloneable front for the simulation thread.
///
/// State-mutating requests are rejected with `ResourceExhausted` when the
/// queue is full; context computation and read-only queries wait for space.
#[derive(Clone)]
pub struct SimulationHandle {
    requests: mpsc::Sender<Request>,
    frames: broadcast::Sender<Arc<Frame>>,
    status: watch::Receiver<SimulationStatus>,
    capacity: usize,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SimulationHandle {
    pub fn spawn(
        env: Box<dyn Environment>,
        mut policy: Box<dyn PolicyModel>,
        config: &SimulationConfig,
        quality: VideoQuality,
    ) -> Result<Self, SimulationError> {
        let capacity = config.queue_capacity.max(1);
        let (requests, receiver) = mpsc::channel(capacity);
        let (frames, _) = broadcast::channel(FRAME_BUFFER);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let context = policy.sample_context(&mut rng);
        let initial = SimulationStatus {
            step: 0,
            total_steps: 0,
            episodes: 0,
            active_key: None,
            quality,
            running: true,
        };
        let (status_tx, status) = watch::channel(initial);

        let worker = Worker {
            env,
            policy,
            rng,
            context,
            active_key: None,
            observation: Observation::standing(),
            quality,
            autoplay: config.autoplay,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(config.fps.max(1))),
            total_steps: 0,
            episodes: 0,
            frames: frames.clone(),
            status: status_tx,
        };

        let thread = std::thread::Builder::new()
            .name("simulation".into())
            .spawn(move || worker.run(receiver))
            .map_err(|error| SimulationError::Spawn(error.to_string()))?;

        Ok(Self {
            requests,
            frames,
            status,
            capacity,
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }

    /// Infer the context for `reward`. Served between steps.
    pub async fn compute_context(
        &self,
        reward: RewardConfiguration,
    ) -> Result<ContextVector, SimulationError> {
        self.request(|reply| Request::ComputeContext {
            reward: Box::new(reward),
            reply,
        })
        .await?
        .map_err(SimulationError::Computation)
    }

    /// Make `context` the one the policy acts on.
    pub async fn activate(
        &self,
        key: CacheKey,
        context: ContextVector,
    ) -> Result<(), SimulationError> {
        self.try_request(|reply| Request::Activate {
            key,
            context,
            reply,
        })
        .await?
        .map_err(SimulationError::Computation)
    }

    /// Advance `count` steps; returns the step count of the current episode.
    pub async fn step(&self, count: u32) -> Result<u64, SimulationError> {
        self.try_request(|reply| Request::Step { count, reply }).await
    }

    pub async fn reset(&self) -> Result<(), SimulationError> {
        self.try_request(|reply| Request::Reset { reply }).await
    }

    pub async fn body_names(&self) -> Result<Vec<String>, SimulationError> {
        self.request(|reply| Request::BodyNames { reply }).await
    }

    pub async fn capture_pose(&self) -> Result<PoseSnapshot, SimulationError> {
        self.try_request(|reply| Request::CapturePose { reply }).await
    }

    pub async fn set_video_quality(&self, quality: VideoQuality) -> Result<(), SimulationError> {
        self.try_request(|reply| Request::SetVideoQuality { quality, reply })
            .await
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<Arc<Frame>> {
        self.frames.subscribe()
    }

    pub fn status(&self) -> SimulationStatus {
        self.status.borrow().clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requests waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.capacity.saturating_sub(self.requests.capacity())
    }

    /// Stop the loop and join the thread. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown).await;
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => tracing::info!("simulation worker stopped"),
                Ok(Err(_)) => tracing::error!("simulation worker panicked"),
                Err(error) => tracing::error!(error = %error, "failed to join simulation worker"),
            }
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, SimulationError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| SimulationError::WorkerStopped)?;
        response.await.map_err(|_| SimulationError::WorkerStopped)
    }

    async fn try_request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, SimulationError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .try_send(build(reply))
            .map_err(|error| match error {
                TrySendError::Full(_) => SimulationError::ResourceExhausted {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => SimulationError::WorkerStopped,
            })?;
        response.await.map_err(|_| SimulationError::WorkerStopped)
    }
}

impl std::fmt::Debug for SimulationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationHandle")
            .field("capacity", &self.capacity)
            .field("queue_depth", &self.queue_depth())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

struct Worker {
    env: Box<dyn Environment>,
    policy: Box<dyn PolicyModel>,
    rng: StdRng,
    context: ContextVector,
    active_key: Option<CacheKey>,
    observation: Observation,
    quality: VideoQuality,
    autoplay: bool,
    frame_interval: Duration,
    total_steps: u64,
    episodes: u64,
    frames: broadcast::Sender<Arc<Frame>>,
    status: watch::Sender<SimulationStatus>,
}

impl Worker {
    fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        tracing::info!(
            action_dim = self.env.action_dim(),
            context_dim = self.policy.context_dim(),
            "simulation worker started"
        );
        self.observation = self.env.reset();
        let mut next_tick = Instant::now();

        'outer: loop {
            if !self.playing() {
                // idle: park until something arrives
                let Some(request) = requests.blocking_recv() else {
                    break;
                };
                if self.handle(request).is_break() {
                    break;
                }
                next_tick = Instant::now();
            }

            loop {
                match requests.try_recv() {
                    Ok(request) => {
                        if self.handle(request).is_break() {
                            break 'outer;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'outer,
                }
            }

            if self.playing() {
                self.advance(1);
                next_tick += self.frame_interval;
                let now = Instant::now();
                if next_tick > now {
                    std::thread::sleep(next_tick - now);
                } else {
                    // fell behind; do not try to catch up
                    next_tick = now;
                }
            }
        }

        self.status.send_modify(|status| status.running = false);
    }

    fn playing(&self) -> bool {
        self.autoplay && self.active_key.is_some()
    }

    fn handle(&mut self, request: Request) -> ControlFlow<()> {
        match request {
            Request::ComputeContext { reward, reply } => {
                let _ = reply.send(self.infer(&reward));
            }
            Request::Activate {
                key,
                context,
                reply,
            } => {
                let expected = self.policy.context_dim();
                let result = if context.len() == expected {
                    tracing::info!(key = %key, "context activated");
                    self.context = context;
                    self.active_key = Some(key);
                    self.publish_status();
                    Ok(())
                } else {
                    Err(ComputationError::new(format!(
                        "context has {} values, policy expects {expected}",
                        context.len()
                    )))
                };
                let _ = reply.send(result);
            }
            Request::Step { count, reply } => {
                self.advance(count);
                let _ = reply.send(self.env.step_count());
            }
            Request::Reset { reply } => {
                self.observation = self.env.reset();
                self.episodes += 1;
                self.publish_status();
                let _ = reply.send(());
            }
            Request::BodyNames { reply } => {
                let _ = reply.send(self.env.body_names());
            }
            Request::CapturePose { reply } => {
                let _ = reply.send(PoseSnapshot {
                    step: self.env.step_count(),
                    joint_positions: self.env.joint_positions(),
                });
            }
            Request::SetVideoQuality { quality, reply } => {
                self.quality = quality;
                self.publish_status();
                let _ = reply.send(());
            }
            Request::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn infer(&mut self, reward: &RewardConfiguration) -> Result<ContextVector, ComputationError> {
        let started = Instant::now();
        let env = self.env.as_ref();
        let policy = &mut self.policy;
        let rng = &mut self.rng;
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            policy.infer_context(env, reward, rng)
        }))
        .unwrap_or_else(|_| Err(ComputationError::new("policy panicked during inference")));

        let context = result?;
        let expected = self.policy.context_dim();
        if context.len() != expected {
            return Err(ComputationError::new(format!(
                "policy produced {} values, expected {expected}",
                context.len()
            )));
        }
        tracing::debug!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "context inferred"
        );
        Ok(context)
    }

    fn advance(&mut self, count: u32) {
        for _ in 0..count {
            let action = self.policy.act(&self.observation, &self.context);
            let outcome = self.env.step(&action);
            self.total_steps += 1;
            if outcome.episode_over() {
                tracing::debug!(
                    terminated = outcome.terminated,
                    truncated = outcome.truncated,
                    step = self.env.step_count(),
                    "episode over; resetting"
                );
                self.observation = self.env.reset();
                self.episodes += 1;
            } else {
                self.observation = outcome.observation;
            }
        }

        if self.frames.receiver_count() > 0 {
            let frame = self.env.render(self.quality);
            let _ = self.frames.send(Arc::new(frame));
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let step = self.env.step_count();
        let total_steps = self.total_steps;
        let episodes = self.episodes;
        let active_key = self.active_key.clone();
        let quality = self.quality;
        self.status.send_modify(|status| {
            status.step = step;
            status.total_steps = total_steps;
            status.episodes = episodes;
            status.active_key = active_key;
            status.quality = quality;
        });
    }
}

use crate::cache::TieredContextCache;
use crate::config::Config;
use crate::coordinator::ComputeCoordinator;
use crate::media::{PeerConnector, SignalingHub};
use crate::observability::{Observer, ObserverMetric, create_observer};
use crate::presets::PresetStore;
use crate::session::SessionRegistry;
use crate::simulation::{self, SimulationHandle};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Everything a running gateway shares between connections.
///
/// Built once at startup and handed to the transport layer; there is no
/// process-global state.
pub struct AppContext {
    pub config: Arc<Config>,
    pub coordinator: ComputeCoordinator,
    pub simulation: SimulationHandle,
    pub sessions: SessionRegistry,
    pub presets: PresetStore,
    pub signaling: SignalingHub,
    pub observer: Arc<dyn Observer>,
    started_at: Instant,
    stopped: AtomicBool,
}

impl AppContext {
    /// Open the cache, preset database and simulation worker described by
    /// `config`.
    pub async fn build(config: Config) -> Result<Self> {
        let cache = Arc::new(TieredContextCache::from_config(&config));
        let presets = PresetStore::open(&config.presets.resolved_path())
            .await
            .context("open preset database")?;
        let simulation =
            simulation::spawn_builtin(&config.simulation, config.video.default_quality)
                .context("start simulation worker")?;
        let observer = create_observer(&config.observability);

        tracing::info!(
            cache_dir = %config.context_cache_dir().display(),
            context_dim = config.simulation.context_dim,
            fps = config.simulation.fps,
            "application context ready"
        );
        Ok(Self::from_parts(config, cache, simulation, presets, observer))
    }

    pub fn from_parts(
        config: Config,
        cache: Arc<TieredContextCache>,
        simulation: SimulationHandle,
        presets: PresetStore,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let sessions =
            SessionRegistry::new(config.gateway.max_sessions, config.gateway.session_queue);
        let coordinator =
            ComputeCoordinator::new(cache).with_context_dim(config.simulation.context_dim);
        Self {
            config: Arc::new(config),
            coordinator,
            simulation,
            sessions,
            presets,
            signaling: SignalingHub::disabled(),
            observer,
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Route `/offer` and friends through `connector`.
    pub fn with_peer_connector(mut self, connector: Arc<dyn PeerConnector>) -> Self {
        self.signaling = SignalingHub::new(Some(connector));
        self
    }

    pub fn cache(&self) -> &Arc<TieredContextCache> {
        self.coordinator.cache()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Push current gauges to the observer.
    pub fn report_metrics(&self) {
        let stats = self.cache().stats();
        self.observer
            .record_metric(&ObserverMetric::ActiveSessions(self.sessions.len() as u64));
        self.observer.record_metric(&ObserverMetric::QueueDepth(
            self.simulation.queue_depth() as u64,
        ));
        self.observer
            .record_metric(&ObserverMetric::InFlightComputations(
                self.coordinator.in_flight() as u64,
            ));
        self.observer.record_metric(&ObserverMetric::CacheSnapshot {
            memory_hits: stats.memory_hits,
            disk_hits: stats.disk_hits,
            misses: stats.misses,
            evictions: stats.evictions,
        });
    }

    /// Stop the simulation worker, close every session and wait for pending
    /// cache writes. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("shutting down");

        self.signaling.close_all().await;
        self.simulation.shutdown().await;
        let closed = self.sessions.close_all();
        self.cache().flush().await;
        self.report_metrics();
        self.observer.flush();

        tracing::info!(sessions_closed = closed, "shutdown complete");
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("coordinator", &self.coordinator)
            .field("sessions", &self.sessions.len())
            .field("observer", &self.observer.name())
            .finish_non_exhaustive()
    }
}

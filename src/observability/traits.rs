use std::time::Duration;

/// Events the observer can record
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    SessionConnected {
        session_id: String,
    },
    SessionDisconnected {
        session_id: String,
        duration: Duration,
    },
    /// A reward request was answered, from cache or by computing.
    ContextResolved {
        key: String,
        source: String,
        duration: Duration,
    },
    ComputationFailed {
        key: String,
        message: String,
    },
    CacheCleared {
        removed: usize,
    },
    Error {
        component: String,
        message: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    RequestLatency(Duration),
    ActiveSessions(u64),
    /// Requests waiting for the simulation thread.
    QueueDepth(u64),
    InFlightComputations(u64),
    CacheSnapshot {
        memory_hits: u64,
        disk_hits: u64,
        misses: u64,
        evictions: u64,
    },
}

/// Sink for gateway events and metrics.
pub trait Observer: Send + Sync {
    /// Record a discrete event
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data (no-op for most backends)
    fn flush(&self) {}

    /// Human-readable name of this observer
    fn name(&self) -> &str;
}

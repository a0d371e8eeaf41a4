use super::traits::{Observer, ObserverEvent, ObserverMetric};
use tracing::{debug, info, warn};

/// Log-based observer backed by `tracing`
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::SessionConnected { session_id } => {
                info!(session_id = %session_id, "session.connected");
            }
            ObserverEvent::SessionDisconnected {
                session_id,
                duration,
            } => {
                let secs = duration.as_secs();
                info!(session_id = %session_id, duration_secs = secs, "session.disconnected");
            }
            ObserverEvent::ContextResolved {
                key,
                source,
                duration,
            } => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                info!(key = %key, source = %source, duration_ms = ms, "context.resolved");
            }
            ObserverEvent::ComputationFailed { key, message } => {
                warn!(key = %key, error = %message, "context.failed");
            }
            ObserverEvent::CacheCleared { removed } => {
                info!(removed = removed, "cache.cleared");
            }
            ObserverEvent::Error { component, message } => {
                warn!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RequestLatency(d) => {
                let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
                debug!(latency_ms = ms, "metric.request_latency");
            }
            ObserverMetric::ActiveSessions(s) => {
                info!(sessions = s, "metric.active_sessions");
            }
            ObserverMetric::QueueDepth(d) => {
                debug!(depth = d, "metric.queue_depth");
            }
            ObserverMetric::InFlightComputations(n) => {
                debug!(in_flight = n, "metric.in_flight");
            }
            ObserverMetric::CacheSnapshot {
                memory_hits,
                disk_hits,
                misses,
                evictions,
            } => {
                debug!(
                    memory_hits = memory_hits,
                    disk_hits = disk_hits,
                    misses = misses,
                    evictions = evictions,
                    "metric.cache"
                );
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn log_observer_name() {
        assert_eq!(LogObserver::new().name(), "log");
    }

    #[test]
    fn log_observer_handles_every_event() {
        let obs = LogObserver::new();
        obs.record_event(&ObserverEvent::SessionConnected {
            session_id: "s".into(),
        });
        obs.record_event(&ObserverEvent::SessionDisconnected {
            session_id: "s".into(),
            duration: Duration::from_secs(3),
        });
        obs.record_event(&ObserverEvent::ContextResolved {
            key: "k".into(),
            source: "computed".into(),
            duration: Duration::from_millis(12),
        });
        obs.record_event(&ObserverEvent::ComputationFailed {
            key: "k".into(),
            message: "boom".into(),
        });
        obs.record_event(&ObserverEvent::CacheCleared { removed: 4 });
        obs.record_event(&ObserverEvent::Error {
            component: "gateway".into(),
            message: "x".into(),
        });
    }

    #[test]
    fn log_observer_handles_every_metric() {
        let obs = LogObserver::new();
        obs.record_metric(&ObserverMetric::RequestLatency(Duration::from_secs(u64::MAX)));
        obs.record_metric(&ObserverMetric::ActiveSessions(2));
        obs.record_metric(&ObserverMetric::QueueDepth(0));
        obs.record_metric(&ObserverMetric::InFlightComputations(1));
        obs.record_metric(&ObserverMetric::CacheSnapshot {
            memory_hits: 1,
            disk_hits: 2,
            misses: 3,
            evictions: 0,
        });
    }
}

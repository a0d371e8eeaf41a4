//! Single-flight context computation on top of the tiered cache.
//!
//! Per key: Idle → Computing → Cached on success, or back to Idle on failure
//! with nothing retained. Concurrent callers for a key that is Computing
//! subscribe to the running computation instead of starting another one.

use crate::cache::{CacheHit, ContextVector, TieredContextCache};
use crate::error::ComputationError;
use crate::reward::CacheKey;
use futures_util::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

type Outcome = Result<ContextVector, ComputationError>;
type InFlight = Arc<Mutex<HashMap<CacheKey, watch::Receiver<Option<Outcome>>>>>;

/// How a resolved context was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Memory,
    Disk,
    /// This caller started the computation.
    Computed,
    /// This caller joined a computation started by someone else.
    Coalesced,
}

impl ContextSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Computed => "computed",
            Self::Coalesced => "coalesced",
        }
    }

    pub fn is_cached(self) -> bool {
        matches!(self, Self::Memory | Self::Disk)
    }
}

impl From<CacheHit> for ContextSource {
    fn from(hit: CacheHit) -> Self {
        match hit {
            CacheHit::Memory => Self::Memory,
            CacheHit::Disk => Self::Disk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub vector: ContextVector,
    pub source: ContextSource,
}

pub struct ComputeCoordinator {
    cache: Arc<TieredContextCache>,
    in_flight: InFlight,
    /// Cached vectors of any other length are treated as misses.
    context_dim: Option<usize>,
}

impl ComputeCoordinator {
    pub fn new(cache: Arc<TieredContextCache>) -> Self {
        Self {
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            context_dim: None,
        }
    }

    /// Only accept cached vectors of length `dim`; anything else is
    /// recomputed and overwritten.
    pub fn with_context_dim(mut self, dim: usize) -> Self {
        self.context_dim = Some(dim);
        self
    }

    fn fits(&self, vector: &ContextVector) -> bool {
        self.context_dim.is_none_or(|dim| vector.len() == dim)
    }

    pub fn cache(&self) -> &Arc<TieredContextCache> {
        &self.cache
    }

    /// Number of keys currently being computed.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<ContextVector, ComputationError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.resolve(key, compute).await.map(|resolved| resolved.vector)
    }

    /// Cache lookup, then join or start the single computation for `key`.
    ///
    /// The computation runs on its own task: dropping this future (for
    /// example because the requesting session disconnected) neither cancels
    /// it nor prevents its result from being cached.
    pub async fn resolve<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<Resolved, ComputationError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        if let Some((vector, hit)) = self.cache.lookup(key).await {
            if self.fits(&vector) {
                return Ok(Resolved {
                    vector,
                    source: hit.into(),
                });
            }
            tracing::warn!(
                key = %key,
                cached = vector.len(),
                expected = ?self.context_dim,
                "cached context has the wrong dimension; recomputing"
            );
        }

        let (mut receiver, source) = {
            let mut in_flight = lock(&self.in_flight);
            if let Some(receiver) = in_flight.get(key) {
                (receiver.clone(), ContextSource::Coalesced)
            } else if let Some(vector) = self.cache.get_memory(key)
                && self.fits(&vector)
            {
                // finished between our lookup and taking the lock
                return Ok(Resolved {
                    vector,
                    source: ContextSource::Memory,
                });
            } else {
                let (sender, receiver) = watch::channel(None);
                in_flight.insert(key.clone(), receiver.clone());
                self.spawn_computation(key.clone(), sender, compute);
                (receiver, ContextSource::Computed)
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(value) => value
                .as_ref()
                .cloned()
                .unwrap_or_else(|| Err(ComputationError::new("computation produced no result"))),
            Err(_) => Err(ComputationError::new("computation was abandoned")),
        };
        outcome.map(|vector| Resolved { vector, source })
    }

    fn spawn_computation<F, Fut>(
        &self,
        key: CacheKey,
        sender: watch::Sender<Option<Outcome>>,
        compute: F,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: key.clone(),
        };

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(async move { compute().await })
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => Err(ComputationError::new(format!(
                    "computation panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match &outcome {
                Ok(vector) => {
                    tracing::info!(key = %key, elapsed_ms, dim = vector.len(), "context computed");
                    cache.put(key, vector.clone());
                }
                Err(error) => {
                    tracing::warn!(key = %key, elapsed_ms, error = %error, "context computation failed");
                }
            }

            // Leave the in-flight map before publishing so late arrivals see
            // either the cached value or a clean slate for a retry.
            drop(guard);
            let _ = sender.send(Some(outcome));
        });
    }
}

impl std::fmt::Debug for ComputeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeCoordinator")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Removes the key from the in-flight map however the computation task ends.
struct InFlightGuard {
    in_flight: InFlight,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

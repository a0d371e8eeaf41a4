use std::sync::Arc;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the gateway.
///
/// Each subsystem defines its own error type. Request handlers match on these
/// to decide who hears about a failure; startup code keeps using
/// `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Client input ────────────────────────────────────────────────────
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    // ── Context computation ─────────────────────────────────────────────
    #[error("computation: {0}")]
    Computation(#[from] ComputationError),

    // ── Disk cache ──────────────────────────────────────────────────────
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    // ── Sessions / channels ─────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Simulation worker ───────────────────────────────────────────────
    #[error("simulation: {0}")]
    Simulation(#[from] SimulationError),

    // ── Presets / poses ─────────────────────────────────────────────────
    #[error("preset: {0}")]
    Preset(#[from] PresetError),

    // ── Media signaling ─────────────────────────────────────────────────
    #[error("signaling: {0}")]
    Signaling(#[from] SignalingError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable identifier sent to clients in `error` messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Computation(_) => "computation",
            Self::Storage(_) => "storage",
            Self::Transport(_) => "transport",
            Self::Simulation(SimulationError::ResourceExhausted { .. }) => "resource_exhausted",
            Self::Simulation(SimulationError::Computation(_)) => "computation",
            Self::Simulation(_) => "simulation",
            Self::Preset(PresetError::NotFound(_)) => "preset_not_found",
            Self::Preset(PresetError::Validation(_)) => "validation",
            Self::Preset(_) => "preset",
            Self::Signaling(_) => "signaling",
            Self::Config(_) => "config",
            Self::Other(_) => "internal",
        }
    }
}

// ─── Validation errors ───────────────────────────────────────────────────────

/// Malformed client input. Reported to the requesting session only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("malformed reward configuration: {0}")]
    Malformed(String),

    #[error("reward configuration has no terms")]
    EmptyTerms,

    #[error("expected {terms} weights, got {weights}")]
    WeightCount { terms: usize, weights: usize },

    #[error("{field} must be a finite number")]
    NonFinite { field: String },

    #[error("invalid value for {field}: {message}")]
    OutOfRange { field: String, message: String },

    #[error("unknown video quality: {0}")]
    UnknownQuality(String),

    #[error("invalid preset name: {0}")]
    PresetName(String),
}

// ─── Computation errors ──────────────────────────────────────────────────────

/// Model or simulator failure while computing a context vector.
///
/// Cloneable so one failure can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ComputationError {
    message: Arc<str>,
}

impl ComputationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::from(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SimulationError> for ComputationError {
    fn from(error: SimulationError) -> Self {
        match error {
            SimulationError::Computation(inner) => inner,
            other => Self::new(other.to_string()),
        }
    }
}

// ─── Storage errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache file {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("background task failed: {0}")]
    Task(String),
}

// ─── Transport errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("session {0} is not registered")]
    UnknownSession(String),

    #[error("session {0} channel closed")]
    Closed(String),

    #[error("session {0} channel is full")]
    Full(String),

    #[error("session limit reached ({0})")]
    SessionLimit(usize),
}

// ─── Simulation errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("simulation queue is full (capacity {capacity})")]
    ResourceExhausted { capacity: usize },

    #[error("simulation worker has stopped")]
    WorkerStopped,

    #[error("context computation failed: {0}")]
    Computation(ComputationError),

    #[error("failed to start simulation worker: {0}")]
    Spawn(String),
}

// ─── Preset errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset {0} not found")]
    NotFound(String),

    #[error("stored preset {name} is invalid: {source}")]
    Invalid {
        name: String,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
}

// ─── Signaling errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    #[error("no peer transport is configured")]
    Unavailable,

    #[error("unknown media client {0}")]
    UnknownClient(String),

    #[error("peer negotiation failed: {0}")]
    Peer(String),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

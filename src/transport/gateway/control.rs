//! Control-channel request handling, independent of the socket.
//!
//! Replies go through the session registry so that a requester sees its own
//! answer before any broadcast the request triggers.

use super::events::{ClientMessage, ServerMessage};
use crate::app::AppContext;
use crate::error::{ComputationError, GatewayError, ValidationError};
use crate::observability::{ObserverEvent, ObserverMetric};
use crate::reward::{self, RewardConfiguration};
use crate::simulation::VideoQuality;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Upper bound on steps requested by one `step_simulation` message.
pub const MAX_MANUAL_STEPS: u32 = 600;

/// Handle one inbound message from `session_id`.
///
/// Failures are reported to the requester only; nothing here panics.
pub async fn handle_client_message(ctx: &AppContext, session_id: &str, message: ClientMessage) {
    let kind = message_kind(&message);
    if let Err(error) = dispatch(ctx, session_id, message).await {
        tracing::warn!(session_id = %session_id, request = kind, error = %error, "request failed");
        ctx.observer.record_event(&ObserverEvent::Error {
            component: kind.to_string(),
            message: error.to_string(),
        });
        deliver(
            ctx,
            session_id,
            ServerMessage::error(error.code(), error.to_string()),
        );
    }
}

/// Reply to a message that could not be decoded.
pub fn reject_malformed(ctx: &AppContext, session_id: &str, error: &serde_json::Error) {
    deliver(
        ctx,
        session_id,
        ServerMessage::error("invalid_message", format!("invalid message: {error}")),
    );
}

async fn dispatch(
    ctx: &AppContext,
    session_id: &str,
    message: ClientMessage,
) -> Result<(), GatewayError> {
    match message {
        ClientMessage::RequestReward { reward, timestamp } => {
            request_reward(ctx, session_id, reward, timestamp).await?;
        }
        ClientMessage::CleanRewards => {
            let removed = ctx.cache().clear().await?;
            ctx.observer
                .record_event(&ObserverEvent::CacheCleared { removed });
            deliver(ctx, session_id, ServerMessage::RewardsCleaned { removed });
        }
        ClientMessage::Ping { timestamp } => {
            let timestamp = timestamp.unwrap_or_else(now_secs);
            deliver(ctx, session_id, ServerMessage::Pong { timestamp });
        }
        ClientMessage::DebugModelInfo => {
            let body_names = ctx.simulation.body_names().await?;
            deliver(ctx, session_id, ServerMessage::ModelInfo { body_names });
        }
        ClientMessage::SetVideoQuality { quality } => {
            let reply = match VideoQuality::parse(&quality) {
                Ok(parsed) => {
                    ctx.simulation.set_video_quality(parsed).await?;
                    ServerMessage::VideoQuality {
                        success: true,
                        quality: parsed.to_string(),
                    }
                }
                Err(error) => {
                    tracing::debug!(error = %error, "rejected video quality");
                    ServerMessage::VideoQuality {
                        success: false,
                        quality,
                    }
                }
            };
            deliver(ctx, session_id, reply);
        }
        ClientMessage::SavePreset { name, reward } => {
            let reward = RewardConfiguration::from_json(reward)?;
            let preset = ctx.presets.save(&name, &reward).await?;
            deliver(ctx, session_id, ServerMessage::PresetSaved { name: preset.name });
        }
        ClientMessage::LoadPreset { name } => {
            let preset = ctx.presets.load(&name).await?;
            let reward = serde_json::to_value(&preset.reward).map_err(anyhow::Error::from)?;
            deliver(
                ctx,
                session_id,
                ServerMessage::Preset {
                    name: preset.name,
                    reward,
                    created_at: preset.created_at,
                },
            );
        }
        ClientMessage::ListPresets => {
            let names = ctx.presets.list().await?;
            deliver(ctx, session_id, ServerMessage::Presets { names });
        }
        ClientMessage::DeletePreset { name } => {
            let existed = ctx.presets.delete(&name).await?;
            deliver(ctx, session_id, ServerMessage::PresetDeleted { name, existed });
        }
        ClientMessage::CapturePose { label } => {
            let pose = ctx.simulation.capture_pose().await?;
            let active = ctx.simulation.status().active_key;
            let id = ctx
                .presets
                .record_pose(label.as_deref(), &pose, active.as_ref())
                .await?;
            deliver(
                ctx,
                session_id,
                ServerMessage::PoseCaptured {
                    id,
                    step: pose.step,
                },
            );
        }
        ClientMessage::ResetSimulation => {
            ctx.simulation.reset().await?;
            deliver(ctx, session_id, ServerMessage::SimulationReset);
        }
        ClientMessage::StepSimulation { count } => {
            if !(1..=MAX_MANUAL_STEPS).contains(&count) {
                return Err(ValidationError::OutOfRange {
                    field: "count".into(),
                    message: format!("must be within 1..={MAX_MANUAL_STEPS}"),
                }
                .into());
            }
            let step = ctx.simulation.step(count).await?;
            deliver(ctx, session_id, ServerMessage::SimulationStepped { step });
        }
    }
    Ok(())
}

/// Validate, resolve through the coordinator, activate, then announce.
async fn request_reward(
    ctx: &AppContext,
    session_id: &str,
    reward: serde_json::Value,
    timestamp: Option<f64>,
) -> Result<(), GatewayError> {
    let started = Instant::now();
    let config = RewardConfiguration::from_json(reward)?;
    let key = reward::encode(&config);

    let simulation = ctx.simulation.clone();
    ctx.observer.record_metric(&ObserverMetric::QueueDepth(
        simulation.queue_depth() as u64,
    ));
    let resolved = ctx
        .coordinator
        .resolve(&key, move || async move {
            simulation
                .compute_context(config)
                .await
                .map_err(ComputationError::from)
        })
        .await;

    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(error) => {
            ctx.observer.record_event(&ObserverEvent::ComputationFailed {
                key: key.to_string(),
                message: error.to_string(),
            });
            return Err(error.into());
        }
    };

    let elapsed = started.elapsed();
    ctx.observer.record_event(&ObserverEvent::ContextResolved {
        key: key.to_string(),
        source: resolved.source.as_str().to_string(),
        duration: elapsed,
    });
    ctx.observer
        .record_metric(&ObserverMetric::RequestLatency(elapsed));

    deliver(
        ctx,
        session_id,
        ServerMessage::reward_result(
            key.as_str(),
            resolved.source.is_cached(),
            resolved.vector.len(),
            timestamp,
        ),
    );

    ctx.simulation
        .activate(key.clone(), resolved.vector)
        .await?;

    let report = ctx
        .sessions
        .broadcast(&ServerMessage::reward_active(key.as_str()));
    if !report.evicted.is_empty() || report.dropped > 0 {
        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted.len(),
            "reward_active broadcast incomplete"
        );
    }
    ctx.report_metrics();
    Ok(())
}

/// Send to one session. A session that went away simply misses the reply.
fn deliver(ctx: &AppContext, session_id: &str, message: ServerMessage) {
    let kind = message.kind();
    if let Err(error) = ctx.sessions.send_to(session_id, message) {
        tracing::debug!(session_id = %session_id, message = kind, error = %error, "reply not delivered");
    }
}

fn message_kind(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::RequestReward { .. } => "request_reward",
        ClientMessage::CleanRewards => "clean_rewards",
        ClientMessage::Ping { .. } => "ping",
        ClientMessage::DebugModelInfo => "debug_model_info",
        ClientMessage::SetVideoQuality { .. } => "set_video_quality",
        ClientMessage::SavePreset { .. } => "save_preset",
        ClientMessage::LoadPreset { .. } => "load_preset",
        ClientMessage::ListPresets => "list_presets",
        ClientMessage::DeletePreset { .. } => "delete_preset",
        ClientMessage::CapturePose { .. } => "capture_pose",
        ClientMessage::ResetSimulation => "reset_simulation",
        ClientMessage::StepSimulation { .. } => "step_simulation",
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

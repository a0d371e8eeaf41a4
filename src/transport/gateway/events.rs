use serde::{Deserialize, Serialize};

/// Inbound control-channel messages.
///
/// Reward payloads stay as raw JSON here so that a malformed reward is
/// reported as a validation error instead of an unparseable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    RequestReward {
        reward: serde_json::Value,
        #[serde(default)]
        timestamp: Option<f64>,
    },
    CleanRewards,
    Ping {
        #[serde(default)]
        timestamp: Option<f64>,
    },
    DebugModelInfo,
    SetVideoQuality {
        quality: String,
    },
    SavePreset {
        name: String,
        reward: serde_json::Value,
    },
    LoadPreset {
        name: String,
    },
    ListPresets,
    DeletePreset {
        name: String,
    },
    CapturePose {
        #[serde(default)]
        label: Option<String>,
    },
    ResetSimulation,
    StepSimulation {
        #[serde(default = "default_step_count")]
        count: u32,
    },
}

fn default_step_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        session_id: String,
        version: String,
    },
    RewardResult {
        key: String,
        cached: bool,
        context_dim: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
    RewardActive {
        key: String,
    },
    RewardsCleaned {
        removed: usize,
    },
    Pong {
        timestamp: f64,
    },
    ModelInfo {
        body_names: Vec<String>,
    },
    VideoQuality {
        success: bool,
        quality: String,
    },
    PresetSaved {
        name: String,
    },
    Preset {
        name: String,
        reward: serde_json::Value,
        created_at: String,
    },
    Presets {
        names: Vec<String>,
    },
    PresetDeleted {
        name: String,
        existed: bool,
    },
    PoseCaptured {
        id: i64,
        step: u64,
    },
    SimulationReset,
    SimulationStepped {
        /// Step count of the current episode after stepping.
        step: u64,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn connected(session_id: impl Into<String>) -> Self {
        Self::Connected {
            session_id: session_id.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reward_result(
        key: impl Into<String>,
        cached: bool,
        context_dim: usize,
        timestamp: Option<f64>,
    ) -> Self {
        Self::RewardResult {
            key: key.into(),
            cached,
            context_dim,
            timestamp,
        }
    }

    pub fn reward_active(key: impl Into<String>) -> Self {
        Self::RewardActive { key: key.into() }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Name of the `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RewardResult { .. } => "reward_result",
            Self::RewardActive { .. } => "reward_active",
            Self::RewardsCleaned { .. } => "rewards_cleaned",
            Self::Pong { .. } => "pong",
            Self::ModelInfo { .. } => "model_info",
            Self::VideoQuality { .. } => "video_quality",
            Self::PresetSaved { .. } => "preset_saved",
            Self::Preset { .. } => "preset",
            Self::Presets { .. } => "presets",
            Self::PresetDeleted { .. } => "preset_deleted",
            Self::PoseCaptured { .. } => "pose_captured",
            Self::SimulationReset => "simulation_reset",
            Self::SimulationStepped { .. } => "simulation_stepped",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","code":"internal","message":"serialization failed"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientMessage, ServerMessage};

    #[test]
    fn request_reward_keeps_raw_payload() {
        let decoded: ClientMessage = serde_json::from_str(
            r#"{"type":"request_reward","reward":{"terms":[{"name":"split"}]},"timestamp":12.5}"#,
        )
        .unwrap();

        assert!(matches!(
            decoded,
            ClientMessage::RequestReward { reward, timestamp: Some(ts) }
                if reward["terms"][0]["name"] == "split" && ts == 12.5
        ));
    }

    #[test]
    fn unit_and_optional_field_messages_parse() {
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping { timestamp: None }));

        let clean: ClientMessage = serde_json::from_str(r#"{"type":"clean_rewards"}"#).unwrap();
        assert!(matches!(clean, ClientMessage::CleanRewards));

        let capture: ClientMessage = serde_json::from_str(r#"{"type":"capture_pose"}"#).unwrap();
        assert!(matches!(capture, ClientMessage::CapturePose { label: None }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn reward_result_serializes() {
        let value =
            serde_json::to_value(ServerMessage::reward_result("k", true, 256, None)).unwrap();

        assert_eq!(value["type"], "reward_result");
        assert_eq!(value["key"], "k");
        assert_eq!(value["cached"], true);
        assert_eq!(value["context_dim"], 256);
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn connected_includes_session_and_version() {
        let value = serde_json::to_value(ServerMessage::connected("abc")).unwrap();

        assert_eq!(value["type"], "connected");
        assert_eq!(value["session_id"], "abc");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn kind_matches_type_tag() {
        let messages = [
            ServerMessage::SimulationReset,
            ServerMessage::error("validation", "bad"),
            ServerMessage::reward_active("k"),
            ServerMessage::Pong { timestamp: 1.0 },
        ];
        for message in messages {
            let value: serde_json::Value = serde_json::from_str(&message.to_json()).unwrap();
            assert_eq!(value["type"], message.kind());
        }
    }
}

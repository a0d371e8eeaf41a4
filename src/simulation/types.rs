use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Proprioceptive summary of the humanoid used by reward terms and the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub root_position: [f64; 3],
    pub root_velocity: [f64; 3],
    pub angular_velocity: [f64; 3],
    /// Yaw of the torso in radians.
    pub heading: f64,
    pub head_height: f64,
    pub pelvis_height: f64,
    pub left_hand_height: f64,
    pub right_hand_height: f64,
    pub foot_separation: f64,
    /// Torso up-axis dotted with world up: 1 upright, -1 inverted.
    pub uprightness: f64,
    /// Torso forward-axis dotted with world up: 1 lying on the back, -1 face down.
    pub belly_up: f64,
}

impl Observation {
    /// Length of [`Observation::features`].
    pub const FEATURE_DIM: usize = 15;

    pub fn standing() -> Self {
        Self {
            root_position: [0.0, 0.0, 0.95],
            root_velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
            heading: 0.0,
            head_height: 1.6,
            pelvis_height: 0.95,
            left_hand_height: 0.8,
            right_hand_height: 0.8,
            foot_separation: 0.25,
            uprightness: 1.0,
            belly_up: 0.0,
        }
    }

    /// Translation-invariant feature vector fed to the policy.
    pub fn features(&self) -> Vec<f64> {
        vec![
            self.root_velocity[0],
            self.root_velocity[1],
            self.root_velocity[2],
            self.angular_velocity[0],
            self.angular_velocity[1],
            self.angular_velocity[2],
            self.heading.sin(),
            self.heading.cos(),
            self.head_height,
            self.pelvis_height,
            self.left_hand_height,
            self.right_hand_height,
            self.foot_separation,
            self.uprightness,
            self.belly_up,
        ]
    }

    pub fn horizontal_speed(&self) -> f64 {
        self.root_velocity[0].hypot(self.root_velocity[1])
    }
}

/// Result of advancing the environment by one control step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub terminated: bool,
    pub truncated: bool,
}

impl StepOutcome {
    pub fn episode_over(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Resolution presets accepted by `set_video_quality`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoQuality {
    Low,
    #[default]
    Medium,
    High,
    Hd,
}

impl VideoQuality {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Low => (320, 240),
            Self::Medium => (640, 480),
            Self::High => (960, 720),
            Self::Hd => (1280, 720),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        raw.trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| ValidationError::UnknownQuality(raw.to_string()))
    }
}

/// One rendered RGB8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub step: u64,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub const HEADER_LEN: usize = 16;

    /// Binary wire form: `u32 LE width | u32 LE height | u64 LE step | RGB8`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.pixels.len());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.step.to_le_bytes());
        out.extend_from_slice(&self.pixels);
        out
    }
}

/// Joint configuration captured from the running simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub step: u64,
    pub joint_positions: Vec<f64>,
}

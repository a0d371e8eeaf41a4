use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// One named reward term with its typed parameter record.
///
/// The wire form is a flat JSON object tagged by `name`, e.g.
/// `{"name": "move-ego", "move_speed": 2.0, "stand_height": 1.4}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum RewardTerm {
    MoveEgo(MoveEgoParams),
    MoveAndRaiseArms(MoveAndRaiseArmsParams),
    Jump(JumpParams),
    Rotation(RotationParams),
    #[serde(rename = "headstand")]
    Headstand(HeadstandParams),
    #[serde(rename = "crawl")]
    Crawl(CrawlParams),
    #[serde(rename = "raisearms")]
    RaiseArms(RaiseArmsParams),
    #[serde(rename = "lieonground")]
    LieOnGround(LieOnGroundParams),
    #[serde(rename = "sitonground")]
    SitOnGround(SitOnGroundParams),
    #[serde(rename = "split")]
    Split(SplitParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmLevel {
    #[serde(alias = "low")]
    L,
    #[serde(alias = "medium")]
    M,
    #[serde(alias = "high")]
    H,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LieDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveEgoParams {
    pub move_speed: f64,
    #[serde(default = "default_stand_height")]
    pub stand_height: f64,
    #[serde(default)]
    pub move_angle: f64,
    #[serde(default = "default_true")]
    pub egocentric_target: bool,
    #[serde(default = "default_low_height")]
    pub low_height: f64,
    #[serde(default)]
    pub stay_low: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveAndRaiseArmsParams {
    pub move_speed: f64,
    #[serde(default = "default_stand_height")]
    pub stand_height: f64,
    #[serde(default)]
    pub move_angle: f64,
    #[serde(default = "default_arm_level")]
    pub left_pose: ArmLevel,
    #[serde(default = "default_arm_level")]
    pub right_pose: ArmLevel,
    #[serde(default = "default_low_height")]
    pub low_height: f64,
    #[serde(default)]
    pub stay_low: bool,
    #[serde(default = "default_true")]
    pub egocentric_target: bool,
    #[serde(default = "default_coeff")]
    pub arm_coeff: f64,
    #[serde(default = "default_coeff")]
    pub loc_coeff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JumpParams {
    pub jump_height: f64,
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationParams {
    pub axis: Axis,
    pub target_ang_velocity: f64,
    #[serde(default = "default_rotation_pelvis_height")]
    pub stand_pelvis_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadstandParams {
    #[serde(default = "default_headstand_pelvis_height")]
    pub stand_pelvis_height: f64,
}

/// `direction` is the wanted torso facing: -1 belly down, +1 belly up, 0 on
/// the side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlParams {
    #[serde(default = "default_spine_height")]
    pub spine_height: f64,
    #[serde(default)]
    pub move_speed: f64,
    #[serde(default)]
    pub direction: f64,
    #[serde(default)]
    pub move_angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RaiseArmsParams {
    pub left: ArmLevel,
    pub right: ArmLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LieOnGroundParams {
    pub direction: LieDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SitOnGroundParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitParams {
    #[serde(default = "default_split_distance")]
    pub distance: f64,
}

fn default_stand_height() -> f64 {
    1.4
}

fn default_low_height() -> f64 {
    0.6
}

fn default_true() -> bool {
    true
}

fn default_arm_level() -> ArmLevel {
    ArmLevel::L
}

fn default_coeff() -> f64 {
    1.0
}

fn default_max_velocity() -> f64 {
    5.0
}

fn default_rotation_pelvis_height() -> f64 {
    0.8
}

fn default_headstand_pelvis_height() -> f64 {
    0.95
}

fn default_spine_height() -> f64 {
    0.4
}

fn default_split_distance() -> f64 {
    1.5
}

impl RewardTerm {
    /// The wire name of this term (`move-ego`, `jump`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveEgo(_) => "move-ego",
            Self::MoveAndRaiseArms(_) => "move-and-raise-arms",
            Self::Jump(_) => "jump",
            Self::Rotation(_) => "rotation",
            Self::Headstand(_) => "headstand",
            Self::Crawl(_) => "crawl",
            Self::RaiseArms(_) => "raisearms",
            Self::LieOnGround(_) => "lieonground",
            Self::SitOnGround(_) => "sitonground",
            Self::Split(_) => "split",
        }
    }

    /// Reject non-finite and physically meaningless parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name();
        match self {
            Self::MoveEgo(p) => {
                finite(name, "move_speed", p.move_speed)?;
                finite(name, "move_angle", p.move_angle)?;
                non_negative(name, "move_speed", p.move_speed)?;
                positive(name, "stand_height", p.stand_height)?;
                positive(name, "low_height", p.low_height)?;
            }
            Self::MoveAndRaiseArms(p) => {
                finite(name, "move_speed", p.move_speed)?;
                finite(name, "move_angle", p.move_angle)?;
                non_negative(name, "move_speed", p.move_speed)?;
                positive(name, "stand_height", p.stand_height)?;
                positive(name, "low_height", p.low_height)?;
                non_negative(name, "arm_coeff", p.arm_coeff)?;
                non_negative(name, "loc_coeff", p.loc_coeff)?;
                if p.arm_coeff + p.loc_coeff <= 0.0 {
                    return Err(ValidationError::OutOfRange {
                        field: format!("{name}.arm_coeff"),
                        message: "arm_coeff and loc_coeff cannot both be zero".into(),
                    });
                }
            }
            Self::Jump(p) => {
                positive(name, "jump_height", p.jump_height)?;
                positive(name, "max_velocity", p.max_velocity)?;
            }
            Self::Rotation(p) => {
                finite(name, "target_ang_velocity", p.target_ang_velocity)?;
                positive(name, "stand_pelvis_height", p.stand_pelvis_height)?;
            }
            Self::Headstand(p) => positive(name, "stand_pelvis_height", p.stand_pelvis_height)?,
            Self::Crawl(p) => {
                positive(name, "spine_height", p.spine_height)?;
                finite(name, "move_speed", p.move_speed)?;
                non_negative(name, "move_speed", p.move_speed)?;
                finite(name, "direction", p.direction)?;
                finite(name, "move_angle", p.move_angle)?;
                if !(-1.0..=1.0).contains(&p.direction) {
                    return Err(ValidationError::OutOfRange {
                        field: format!("{name}.direction"),
                        message: format!("{} is outside [-1, 1]", p.direction),
                    });
                }
            }
            Self::RaiseArms(_) | Self::LieOnGround(_) | Self::SitOnGround(_) => {}
            Self::Split(p) => positive(name, "distance", p.distance)?,
        }
        Ok(())
    }
}

fn finite(term: &str, field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            field: format!("{term}.{field}"),
        })
    }
}

fn non_negative(term: &str, field: &str, value: f64) -> Result<(), ValidationError> {
    finite(term, field, value)?;
    if value < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: format!("{term}.{field}"),
            message: format!("{value} is negative"),
        });
    }
    Ok(())
}

fn positive(term: &str, field: &str, value: f64) -> Result<(), ValidationError> {
    finite(term, field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::OutOfRange {
            field: format!("{term}.{field}"),
            message: format!("{value} must be greater than zero"),
        });
    }
    Ok(())
}

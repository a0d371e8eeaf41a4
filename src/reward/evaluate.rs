//! Scalar rewards for a single observation.
//!
//! Every term maps into `[0, 1]` through linear tolerance bands so weights and
//! combination modes behave the same way across terms.

use super::config::{CombinationMode, RewardConfiguration};
use super::terms::{ArmLevel, LieDirection, RewardTerm};
use crate::simulation::Observation;

const INF: f64 = f64::INFINITY;

/// 1 inside `[lower, upper]`, falling linearly to 0 at `margin` outside it.
pub fn tolerance(x: f64, lower: f64, upper: f64, margin: f64) -> f64 {
    if (lower..=upper).contains(&x) {
        return 1.0;
    }
    if margin <= 0.0 {
        return 0.0;
    }
    let distance = if x < lower { lower - x } else { x - upper };
    (1.0 - distance / margin).max(0.0)
}

impl RewardTerm {
    pub fn evaluate(&self, obs: &Observation) -> f64 {
        match self {
            Self::MoveEgo(p) => {
                let stand = stand_reward(obs, p.stand_height, p.low_height, p.stay_low);
                let moving = move_reward(obs, p.move_speed, p.move_angle, p.egocentric_target);
                stand * moving
            }
            Self::MoveAndRaiseArms(p) => {
                let stand = stand_reward(obs, p.stand_height, p.low_height, p.stay_low);
                let moving = move_reward(obs, p.move_speed, p.move_angle, p.egocentric_target);
                let arms = arm_reward(obs.left_hand_height, p.left_pose)
                    * arm_reward(obs.right_hand_height, p.right_pose);
                let total = p.loc_coeff + p.arm_coeff;
                stand * (p.loc_coeff * moving + p.arm_coeff * arms) / total
            }
            Self::Jump(p) => {
                let height = tolerance(obs.head_height, p.jump_height, INF, p.jump_height);
                let velocity =
                    tolerance(obs.root_velocity[2].abs(), 0.0, p.max_velocity, p.max_velocity);
                height * velocity
            }
            Self::Rotation(p) => {
                let spin = obs.angular_velocity[p.axis.index()];
                let target = p.target_ang_velocity;
                let margin = target.abs().max(1.0);
                let rotation = if target >= 0.0 {
                    tolerance(spin, target, INF, margin)
                } else {
                    tolerance(spin, -INF, target, margin)
                };
                let height =
                    tolerance(obs.pelvis_height, p.stand_pelvis_height, INF, p.stand_pelvis_height);
                rotation * height
            }
            Self::Headstand(p) => {
                let inverted = tolerance(obs.uprightness, -1.0, -0.9, 1.9);
                let pelvis =
                    tolerance(obs.pelvis_height, p.stand_pelvis_height, INF, p.stand_pelvis_height);
                let head = tolerance(obs.head_height, 0.0, 0.2, 0.5);
                inverted * pelvis * head
            }
            Self::Crawl(p) => {
                let low = tolerance(obs.pelvis_height, 0.0, p.spine_height, p.spine_height);
                let facing =
                    tolerance(obs.belly_up, p.direction - 0.25, p.direction + 0.25, 1.0);
                let moving = move_reward(obs, p.move_speed, p.move_angle, true);
                low * facing * moving
            }
            Self::RaiseArms(p) => {
                let stand = tolerance(obs.head_height, 1.4, INF, 1.4);
                stand
                    * arm_reward(obs.left_hand_height, p.left)
                    * arm_reward(obs.right_hand_height, p.right)
            }
            Self::LieOnGround(p) => {
                let head = tolerance(obs.head_height, 0.0, 0.3, 0.5);
                let pelvis = tolerance(obs.pelvis_height, 0.0, 0.3, 0.5);
                let facing = match p.direction {
                    LieDirection::Up => tolerance(obs.belly_up, 0.8, 1.0, 1.8),
                    LieDirection::Down => tolerance(obs.belly_up, -1.0, -0.8, 1.8),
                };
                head * pelvis * facing
            }
            Self::SitOnGround(_) => {
                let pelvis = tolerance(obs.pelvis_height, 0.0, 0.3, 0.5);
                let head = tolerance(obs.head_height, 0.8, INF, 0.8);
                let upright = tolerance(obs.uprightness, 0.7, 1.0, 1.7);
                pelvis * head * upright
            }
            Self::Split(p) => {
                let spread = tolerance(obs.foot_separation, p.distance, INF, p.distance);
                let pelvis = tolerance(obs.pelvis_height, 0.0, 0.4, 0.8);
                spread * pelvis
            }
        }
    }
}

impl RewardConfiguration {
    /// Combined reward of all weighted terms for one observation.
    pub fn evaluate(&self, obs: &Observation) -> f64 {
        match self.combination_mode() {
            CombinationMode::Multiplicative => self
                .weighted_terms()
                .map(|(term, weight)| {
                    if weight == 0.0 {
                        1.0
                    } else {
                        term.evaluate(obs).powf(weight)
                    }
                })
                .product(),
            CombinationMode::Additive => self
                .weighted_terms()
                .map(|(term, weight)| weight * term.evaluate(obs))
                .sum(),
        }
    }
}

fn stand_reward(obs: &Observation, stand_height: f64, low_height: f64, stay_low: bool) -> f64 {
    if stay_low {
        tolerance(obs.head_height, low_height * 0.5, low_height, low_height * 0.5)
    } else {
        let upright = (1.0 + obs.uprightness) / 2.0;
        tolerance(obs.head_height, stand_height, INF, stand_height) * upright
    }
}

fn move_reward(obs: &Observation, speed: f64, angle_deg: f64, egocentric: bool) -> f64 {
    if speed <= 0.0 {
        return tolerance(obs.horizontal_speed(), 0.0, 0.5, 1.0);
    }
    let mut angle = angle_deg.to_radians();
    if egocentric {
        angle += obs.heading;
    }
    let along = obs.root_velocity[0] * angle.cos() + obs.root_velocity[1] * angle.sin();
    tolerance(along, speed, INF, speed)
}

fn arm_reward(hand_height: f64, level: ArmLevel) -> f64 {
    match level {
        ArmLevel::L => tolerance(hand_height, 0.0, 0.8, 0.4),
        ArmLevel::M => tolerance(hand_height, 1.2, 1.6, 0.4),
        ArmLevel::H => tolerance(hand_height, 1.8, INF, 0.4),
    }
}

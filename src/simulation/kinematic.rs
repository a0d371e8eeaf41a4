//! Lightweight kinematic humanoid used when no physics backend is plugged in.
//!
//! The body is reduced to the handful of quantities reward terms look at.
//! Each action channel drives one of them toward a target with first-order
//! smoothing, plus a ballistic vertical component for jumps.

use super::traits::Environment;
use super::types::{Frame, Observation, StepOutcome, VideoQuality};
use rand::Rng;
use rand::rngs::StdRng;

pub const ACTION_DIM: usize = 12;

const DT: f64 = 1.0 / 30.0;
const GRAVITY: f64 = 9.81;
const SMOOTHING: f64 = 0.2;
const MAX_SPEED: f64 = 3.0;
const MAX_SPIN: f64 = 6.0;
const JUMP_IMPULSE: f64 = 4.0;
const ARENA_HALF_WIDTH: f64 = 50.0;

const BODY_NAMES: [&str; 24] = [
    "Pelvis",
    "L_Hip",
    "R_Hip",
    "Torso",
    "L_Knee",
    "R_Knee",
    "Spine",
    "L_Ankle",
    "R_Ankle",
    "Chest",
    "L_Toe",
    "R_Toe",
    "Neck",
    "L_Thorax",
    "R_Thorax",
    "Head",
    "L_Shoulder",
    "R_Shoulder",
    "L_Elbow",
    "R_Elbow",
    "L_Wrist",
    "R_Wrist",
    "L_Hand",
    "R_Hand",
];

#[derive(Debug, Clone)]
pub struct KinematicEnvironment {
    observation: Observation,
    /// Last applied, clamped action; doubles as the joint configuration.
    joints: [f64; ACTION_DIM],
    /// Height of the feet above the ground while airborne.
    airborne: f64,
    /// Pelvis height without the airborne offset.
    posture: f64,
    steps: u64,
    max_episode_steps: u64,
}

impl KinematicEnvironment {
    pub fn new(max_episode_steps: u64) -> Self {
        let observation = Observation::standing();
        Self {
            posture: observation.pelvis_height,
            observation,
            joints: [0.0; ACTION_DIM],
            airborne: 0.0,
            steps: 0,
            max_episode_steps,
        }
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    fn integrate(&mut self, action: &[f64]) {
        let a = |i: usize| action.get(i).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        for (i, joint) in self.joints.iter_mut().enumerate() {
            *joint = a(i);
        }
        let obs = &mut self.observation;

        for axis in 0..2 {
            obs.root_velocity[axis] = relax(obs.root_velocity[axis], MAX_SPEED * a(axis));
        }
        for axis in 0..3 {
            obs.angular_velocity[axis] = relax(obs.angular_velocity[axis], MAX_SPIN * a(3 + axis));
        }
        obs.heading = wrap_angle(obs.heading + obs.angular_velocity[2] * DT);

        // vertical: jump only from the ground
        if self.airborne <= 0.0 && a(2) > 0.8 {
            obs.root_velocity[2] = JUMP_IMPULSE * a(2);
        }
        obs.root_velocity[2] -= GRAVITY * DT;
        self.airborne += obs.root_velocity[2] * DT;
        if self.airborne <= 0.0 {
            self.airborne = 0.0;
            obs.root_velocity[2] = 0.0;
        }

        self.posture = relax(self.posture, 0.1 + 0.85 * unit(a(6)));
        obs.uprightness = relax(obs.uprightness, a(10));
        obs.belly_up = relax(obs.belly_up, a(11) * (1.0 - obs.uprightness.abs()));
        obs.pelvis_height = self.posture + self.airborne;
        obs.head_height = (obs.pelvis_height + 0.65 * obs.uprightness).max(0.05);
        obs.left_hand_height = (obs.pelvis_height + 0.9 * a(7) * obs.uprightness.abs()).max(0.0);
        obs.right_hand_height = (obs.pelvis_height + 0.9 * a(8) * obs.uprightness.abs()).max(0.0);
        obs.foot_separation = relax(obs.foot_separation, 0.2 + 1.4 * unit(a(9)));

        obs.root_position[0] += obs.root_velocity[0] * DT;
        obs.root_position[1] += obs.root_velocity[1] * DT;
        obs.root_position[2] = obs.pelvis_height;
    }

    fn left_arena(&self) -> bool {
        let [x, y, _] = self.observation.root_position;
        x.abs() > ARENA_HALF_WIDTH || y.abs() > ARENA_HALF_WIDTH
    }
}

impl Environment for KinematicEnvironment {
    fn reset(&mut self) -> Observation {
        *self = Self::new(self.max_episode_steps);
        self.observation.clone()
    }

    fn step(&mut self, action: &[f64]) -> StepOutcome {
        self.integrate(action);
        self.steps += 1;
        let finite = self.observation.features().iter().all(|v| v.is_finite());
        StepOutcome {
            observation: self.observation.clone(),
            terminated: !finite || self.left_arena(),
            truncated: self.steps >= self.max_episode_steps,
        }
    }

    fn render(&mut self, quality: VideoQuality) -> Frame {
        let (width, height) = quality.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut pixels = vec![0_u8; w * h * 3];

        let ground = h * 9 / 10;
        let scale = h as f64 / 2.5;
        let centre = (w as f64 / 2.0 + self.observation.heading.sin() * w as f64 / 8.0) as usize;
        let half_width = (w / 40).max(1);
        let top = ground.saturating_sub((self.observation.head_height * scale) as usize);
        let hips = ground.saturating_sub((self.observation.pelvis_height * scale) as usize);

        for y in 0..h {
            for x in 0..w {
                let rgb: [u8; 3] = if y >= ground {
                    [70, 90, 70]
                } else if x.abs_diff(centre) <= half_width && (top..ground).contains(&y) {
                    if y < hips { [220, 180, 140] } else { [60, 80, 160] }
                } else {
                    [32, 32, 40]
                };
                let at = (y * w + x) * 3;
                pixels[at..at + 3].copy_from_slice(&rgb);
            }
        }

        Frame {
            width,
            height,
            step: self.steps,
            pixels,
        }
    }

    fn body_names(&self) -> Vec<String> {
        BODY_NAMES.iter().map(|name| (*name).to_string()).collect()
    }

    fn joint_positions(&self) -> Vec<f64> {
        let mut positions = self.observation.root_position.to_vec();
        positions.push(self.observation.heading);
        positions.extend_from_slice(&self.joints);
        positions
    }

    fn action_dim(&self) -> usize {
        ACTION_DIM
    }

    fn sample_states(&self, count: usize, rng: &mut StdRng) -> Vec<Observation> {
        (0..count)
            .map(|_| {
                let uprightness = rng.random_range(-1.0..=1.0);
                let pelvis_height: f64 = rng.random_range(0.05..=1.6);
                let reach = 0.9 * f64::abs(uprightness);
                Observation {
                    root_position: [0.0, 0.0, pelvis_height],
                    root_velocity: [
                        rng.random_range(-MAX_SPEED..=MAX_SPEED),
                        rng.random_range(-MAX_SPEED..=MAX_SPEED),
                        rng.random_range(-JUMP_IMPULSE..=JUMP_IMPULSE),
                    ],
                    angular_velocity: [
                        rng.random_range(-MAX_SPIN..=MAX_SPIN),
                        rng.random_range(-MAX_SPIN..=MAX_SPIN),
                        rng.random_range(-MAX_SPIN..=MAX_SPIN),
                    ],
                    heading: rng.random_range(-std::f64::consts::PI..std::f64::consts::PI),
                    head_height: (pelvis_height + 0.65 * uprightness).max(0.05),
                    pelvis_height,
                    left_hand_height: (pelvis_height + rng.random_range(-reach..=reach)).max(0.0),
                    right_hand_height: (pelvis_height + rng.random_range(-reach..=reach)).max(0.0),
                    foot_separation: rng.random_range(0.1..=1.8),
                    uprightness,
                    belly_up: rng.random_range(-1.0..=1.0) * (1.0 - f64::abs(uprightness)),
                }
            })
            .collect()
    }

    fn step_count(&self) -> u64 {
        self.steps
    }
}

fn relax(current: f64, target: f64) -> f64 {
    current + SMOOTHING * (target - current)
}

fn unit(x: f64) -> f64 {
    (x + 1.0) / 2.0
}

fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn forward_action_moves_forward() {
        let mut env = KinematicEnvironment::new(100);
        let mut action = vec![0.0; ACTION_DIM];
        action[0] = 1.0;
        action[6] = 1.0;
        action[10] = 1.0;
        for _ in 0..30 {
            env.step(&action);
        }
        let obs = env.observation();
        assert!(obs.root_velocity[0] > 2.5);
        assert!(obs.root_position[0] > 1.0);
        assert!(obs.head_height > 1.4);
    }

    #[test]
    fn jump_returns_to_ground() {
        let mut env = KinematicEnvironment::new(1000);
        let mut action = vec![0.0; ACTION_DIM];
        action[2] = 1.0;
        action[6] = 1.0;
        env.step(&action);
        assert!(env.airborne > 0.0);

        action[2] = 0.0;
        for _ in 0..120 {
            env.step(&action);
        }
        assert_eq!(env.airborne, 0.0);
        assert_eq!(env.observation().root_velocity[2], 0.0);
    }

    #[test]
    fn truncates_at_episode_limit() {
        let mut env = KinematicEnvironment::new(3);
        let action = vec![0.0; ACTION_DIM];
        assert!(!env.step(&action).truncated);
        assert!(!env.step(&action).truncated);
        let last = env.step(&action);
        assert!(last.truncated);
        assert!(!last.terminated);
        assert!(last.episode_over());

        env.reset();
        assert_eq!(env.step_count(), 0);
    }

    #[test]
    fn leaving_the_arena_terminates() {
        let mut env = KinematicEnvironment::new(u64::MAX);
        env.observation.root_position[0] = ARENA_HALF_WIDTH;
        let mut action = vec![0.0; ACTION_DIM];
        action[0] = 1.0;
        let mut terminated = false;
        for _ in 0..60 {
            terminated |= env.step(&action).terminated;
        }
        assert!(terminated);
    }

    #[test]
    fn render_matches_quality_dimensions() {
        let mut env = KinematicEnvironment::new(10);
        let frame = env.render(VideoQuality::Low);
        assert_eq!((frame.width, frame.height), (320, 240));
        assert_eq!(frame.pixels.len(), 320 * 240 * 3);
    }

    #[test]
    fn sampled_states_are_deterministic_per_seed() {
        let env = KinematicEnvironment::new(10);
        let a = env.sample_states(16, &mut StdRng::seed_from_u64(7));
        let b = env.sample_states(16, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.features().iter().all(|v| v.is_finite())));
    }

    #[test]
    fn body_names_and_joints() {
        let env = KinematicEnvironment::new(10);
        assert_eq!(env.body_names().len(), 24);
        assert_eq!(env.body_names()[0], "Pelvis");
        assert_eq!(env.joint_positions().len(), 4 + ACTION_DIM);
    }
}

pub mod codec;
pub mod config;
pub mod evaluate;
pub mod terms;

pub use codec::{CacheKey, encode};
pub use config::{CombinationMode, RewardConfiguration};
pub use terms::{ArmLevel, Axis, LieDirection, RewardTerm};

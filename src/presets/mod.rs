pub mod store;

pub use store::{PoseRecord, Preset, PresetStore, validate_name};

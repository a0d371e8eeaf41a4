pub mod registry;

pub use registry::{
    BroadcastReport, MediaChannel, MediaKind, Session, SessionChannel, SessionInfo,
    SessionRegistry,
};

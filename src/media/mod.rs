pub mod signaling;

pub use signaling::{IceCandidate, PeerConnector, SessionDescription, SignalingHub};

#[path = "support/mod.rs"]
mod support;

#[path = "gateway/control_flow.rs"]
mod control_flow;
#[path = "gateway/media_stream.rs"]
mod media_stream;
#[path = "gateway/shutdown.rs"]
mod shutdown;

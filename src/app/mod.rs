pub mod context;
pub mod dispatch;

pub use context::AppContext;
pub use dispatch::dispatch;

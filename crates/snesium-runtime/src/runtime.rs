mod control;
mod debug;
mod debug_interceptor;
mod event_capture;
mod handle;
mod machine;
mod pubsub;
mod runner;
mod state;
mod types;

pub use handle::{Runtime, RuntimeHandle};
pub use types::{Pacing, RuntimeConfig, RuntimeError};

use thiserror::Error;

use crate::{context::ProcessorContext, engine::StepKind, session::ViewId};

/// Failures reported by an [`Engine`](crate::engine::Engine) implementation.
///
/// Under correct usage none of these are expected; callers surface them
/// instead of trying to recover the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine control channel disconnected")]
    Disconnected,
    #[error("engine did not respond in time for {op}")]
    Timeout { op: &'static str },
    #[error("engine rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum DebugError {
    /// Only contexts with a registered profile can own a debugger view.
    #[error("no debugger view can be bound to the {0} context")]
    UnsupportedContext(ProcessorContext),
    #[error("{kind} is not available in the {context} debugger")]
    UnsupportedStep {
        context: ProcessorContext,
        kind: StepKind,
    },
    #[error("the loaded game has no coprocessor for the {0} debugger")]
    CoprocessorAbsent(ProcessorContext),
    #[error("debugger view {0} is not open")]
    UnknownView(ViewId),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

//! Execution control and breakpoint core for the snesium debugger.
//!
//! The crate tracks breakpoints for every processor context (main CPU, SPC700
//! sound CPU and the cartridge coprocessors), keeps the execution engine's
//! breakpoint list in sync, drives step/run/pause requests and decodes the
//! break and bus events the engine reports back.
//!
//! Nothing in here talks to a real emulator directly: every engine interaction
//! goes through the [`Engine`] trait, and engine notifications are drained by a
//! single [`DebugSession`] consumer.

pub mod breakpoint;
pub mod classify;
pub mod config;
pub mod context;
pub mod dma;
pub mod engine;
pub mod error;
pub mod event;
pub mod exec;
pub mod memory;
pub mod session;
pub mod state;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use breakpoint::{
    BreakOn, Breakpoint, BreakpointKey, FlattenedBreakpoint,
    activation::CpuActivationSet,
    manager::{BreakpointManager, BreakpointsChanged, CHANGE_QUEUE_DEPTH},
    store::{BreakpointStore, Toggle},
    sync::EngineSync,
};
pub use classify::{BreakClassification, classify_break};
pub use config::{DebuggerConfig, region::Region};
pub use context::{ContextProfile, CpuVector, ProcessorContext};
pub use dma::{DebugEventInfo, DebugEventType, DmaChannelInfo};
pub use engine::{
    BreakpointSink, CoprocessorType, DebuggerFlags, Engine, EventColors, EventFilter,
    EventViewerFrame, EventViewerOptions, NOTIFICATION_QUEUE_DEPTH, Notification, StepKind,
    notification_channel,
};
pub use error::{DebugError, EngineError};
pub use event::{BreakEvent, BreakSource};
pub use exec::{BOOTSTRAP_STEP_COUNT, ExecutionController, PpuStepUnit, RunState};
pub use memory::{AddressInfo, MemoryOperationInfo, MemoryOperationType, MemorySpace};
pub use session::{DebugSession, ViewId, ViewUpdate, view::DebuggerView};
pub use state::DebugState;
pub use transfer::{
    EventDetails, HdmaMode, LabelProvider, RegisterAccess, TransferDecoder, TransferDescription,
};

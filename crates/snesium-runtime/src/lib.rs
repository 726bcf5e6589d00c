//! Threaded scripted engine for the snesium debugger.
//!
//! [`Runtime`] runs a [`Program`] on its own thread and [`RuntimeHandle`]
//! implements [`snesium_debug::Engine`] on top of a control channel, so a
//! [`snesium_debug::DebugSession`] can drive it like any other engine.

pub mod program;
pub mod runtime;

pub use program::{
    DEFAULT_INSTRUCTION_CYCLES, DmaTag, Flow, Instruction, Interrupt, Program, ScriptedOp, Trace,
    Trap,
};
pub use runtime::{Pacing, Runtime, RuntimeConfig, RuntimeError, RuntimeHandle};

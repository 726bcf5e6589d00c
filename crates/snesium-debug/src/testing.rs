//! In-memory engine that records every request.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use crate::{
    breakpoint::FlattenedBreakpoint,
    context::ProcessorContext,
    dma::DebugEventInfo,
    engine::{BreakpointSink, DebuggerFlags, Engine, EventViewerFrame, EventViewerOptions, StepKind},
    error::EngineError,
    memory::MemorySpace,
    state::DebugState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Push(Vec<FlattenedBreakpoint>),
    Step(ProcessorContext, u32, StepKind),
    Resume,
    Flags(DebuggerFlags, bool),
    Snapshot,
}

#[derive(Default)]
pub(crate) struct RecordingEngine {
    calls: Mutex<Vec<Call>>,
    paused: AtomicBool,
    state: Mutex<Option<DebugState>>,
    memory: Mutex<HashMap<(MemorySpace, u32), u8>>,
    event: Mutex<Option<DebugEventInfo>>,
    fail_steps: AtomicBool,
    fail_flags: AtomicBool,
}

impl RecordingEngine {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub(crate) fn pushes(&self) -> Vec<Vec<FlattenedBreakpoint>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Push(list) => Some(list.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn steps(&self) -> Vec<(ProcessorContext, u32, StepKind)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Step(ctx, count, kind) => Some((*ctx, *count, *kind)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub(crate) fn set_state(&self, state: DebugState) {
        *self.state.lock() = Some(state);
    }

    pub(crate) fn poke(&self, space: MemorySpace, address: u32, value: u8) {
        self.memory.lock().insert((space, address), value);
    }

    pub(crate) fn set_event(&self, event: DebugEventInfo) {
        *self.event.lock() = Some(event);
    }

    /// Makes `step` reject every request.
    pub(crate) fn fail_steps(&self, fail: bool) {
        self.fail_steps.store(fail, Ordering::Release);
    }

    /// Makes `set_debugger_flags` time out.
    pub(crate) fn fail_flags(&self, fail: bool) {
        self.fail_flags.store(fail, Ordering::Release);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl BreakpointSink for RecordingEngine {
    fn push_breakpoints(&self, breakpoints: &[FlattenedBreakpoint]) -> Result<(), EngineError> {
        self.record(Call::Push(breakpoints.to_vec()));
        Ok(())
    }
}

impl Engine for RecordingEngine {
    fn step(&self, context: ProcessorContext, count: u32, kind: StepKind) -> Result<(), EngineError> {
        if self.fail_steps.load(Ordering::Acquire) {
            return Err(EngineError::Rejected {
                op: "step",
                reason: format!("no {context} code"),
            });
        }
        self.record(Call::Step(context, count, kind));
        self.set_paused(false);
        Ok(())
    }

    fn resume(&self) -> Result<(), EngineError> {
        self.record(Call::Resume);
        self.set_paused(false);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn get_state(&self) -> Option<DebugState> {
        *self.state.lock()
    }

    fn get_memory_value(&self, space: MemorySpace, address: u32) -> Result<u8, EngineError> {
        Ok(self.memory.lock().get(&(space, address)).copied().unwrap_or(0))
    }

    fn set_debugger_flags(&self, flags: DebuggerFlags, enabled: bool) -> Result<(), EngineError> {
        if self.fail_flags.load(Ordering::Acquire) {
            return Err(EngineError::Timeout {
                op: "set_debugger_flags",
            });
        }
        self.record(Call::Flags(flags, enabled));
        Ok(())
    }

    fn take_event_snapshot(&self, _options: &EventViewerOptions) -> Result<(), EngineError> {
        self.record(Call::Snapshot);
        Ok(())
    }

    fn get_event_viewer_output(
        &self,
        _options: &EventViewerOptions,
    ) -> Result<EventViewerFrame, EngineError> {
        Ok(EventViewerFrame {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        })
    }

    fn get_event_viewer_event(
        &self,
        _scanline: u16,
        _cycle: u16,
        _options: &EventViewerOptions,
    ) -> Result<Option<DebugEventInfo>, EngineError> {
        Ok(self.event.lock().clone())
    }
}

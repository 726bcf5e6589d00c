//! Break detection for the scripted machine.
//!
//! The runner reports every fetch, bus operation, retired instruction and
//! raster cycle here; the interceptor answers with the [`BreakEvent`] that
//! should pause execution, if any. Pausing itself is the runner's job.

use snesium_debug::{
    BreakEvent, BreakSource, DebuggerFlags, FlattenedBreakpoint, MemoryOperationInfo,
    MemoryOperationType, MemorySpace, ProcessorContext,
};

use crate::program::{Instruction, Trap};

use super::debug::StepMode;

#[derive(Debug, Default)]
pub(crate) struct DebugInterceptor {
    breakpoints: Vec<FlattenedBreakpoint>,
    flags: DebuggerFlags,
    step: StepMode,
    /// Fetch the machine paused on; it is not checked again when execution
    /// continues.
    checked_fetch: Option<(ProcessorContext, u32)>,
}

impl DebugInterceptor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_breakpoints(&mut self, breakpoints: Vec<FlattenedBreakpoint>) {
        self.breakpoints = breakpoints;
    }

    pub(crate) fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub(crate) fn set_flags(&mut self, flags: DebuggerFlags, enabled: bool) {
        self.flags.set(flags, enabled);
    }

    pub(crate) fn flags(&self) -> DebuggerFlags {
        self.flags
    }

    pub(crate) fn set_step(&mut self, step: StepMode) {
        self.step = step;
    }

    /// Called when execution pauses. `fetch` is the instruction the machine
    /// stopped in front of, when the break came from a fetch.
    pub(crate) fn paused(&mut self, fetch: Option<(ProcessorContext, u32)>) {
        self.step = StepMode::None;
        self.checked_fetch = fetch;
    }

    /// Forgets per-run state after a load or reset. Breakpoints and flags stay.
    pub(crate) fn reset(&mut self) {
        self.checked_fetch = None;
    }

    fn instrumented(&self, context: ProcessorContext) -> bool {
        context
            .profile()
            .is_some_and(|profile| self.flags.contains(profile.enabled_flag))
    }

    fn find_breakpoint(&self, context: ProcessorContext, op: &MemoryOperationInfo) -> Option<usize> {
        if !self.instrumented(context) {
            return None;
        }
        self.breakpoints
            .iter()
            .find(|fb| {
                let bp = &fb.breakpoint;
                bp.context == context && bp.contains(op.space, op.address) && bp.triggers_on(op.kind)
            })
            .map(|fb| fb.id)
    }

    /// Checked before `instruction` executes, in priority order: engine
    /// conditions, execute breakpoints, then step completion.
    pub(crate) fn on_fetch(
        &mut self,
        context: ProcessorContext,
        instruction: &Instruction,
        depth: u32,
    ) -> Option<BreakEvent> {
        if self.checked_fetch.take() == Some((context, instruction.address)) {
            return None;
        }

        if let Some(source) = instruction.trap.and_then(|trap| self.trap_source(trap)) {
            return Some(BreakEvent::step(source));
        }

        if let Some(profile) = context.profile() {
            let op = MemoryOperationInfo::new(
                profile.memory_space,
                instruction.address,
                instruction.opcode,
                MemoryOperationType::ExecOpCode,
            );
            if let Some(id) = self.find_breakpoint(context, &op) {
                return Some(BreakEvent::breakpoint(id, op));
            }
        }

        let step_done = match self.step {
            StepMode::Instructions { context: c, remaining } => c == context && remaining == 0,
            StepMode::Over {
                context: c,
                depth: target,
                started,
            } => c == context && started && depth <= target,
            StepMode::Out { context: c, depth: target } => c == context && depth < target,
            StepMode::None | StepMode::Dots { .. } | StepMode::Scanline { .. } => false,
        };
        step_done.then(|| BreakEvent::step(BreakSource::CpuStep))
    }

    fn trap_source(&self, trap: Trap) -> Option<BreakSource> {
        let gated = |flag: DebuggerFlags, source: BreakSource| self.flags.contains(flag).then_some(source);
        match trap {
            Trap::Brk => gated(DebuggerFlags::BREAK_ON_BRK, BreakSource::BreakOnBrk),
            Trap::Cop => gated(DebuggerFlags::BREAK_ON_COP, BreakSource::BreakOnCop),
            Trap::Wdm => gated(DebuggerFlags::BREAK_ON_WDM, BreakSource::BreakOnWdm),
            Trap::Stp => gated(DebuggerFlags::BREAK_ON_STP, BreakSource::BreakOnStp),
            Trap::GsuInvalidOpCode => Some(BreakSource::GsuInvalidOpCode),
            Trap::Crash => Some(BreakSource::CpuCrash),
        }
    }

    /// Checked for every bus operation of an executing instruction.
    /// `initialized` tells whether the location was ever written.
    pub(crate) fn on_operation(
        &self,
        context: ProcessorContext,
        op: &MemoryOperationInfo,
        initialized: bool,
    ) -> Option<BreakEvent> {
        let tracks_init = matches!(
            op.space,
            MemorySpace::WorkRam | MemorySpace::SaveRam | MemorySpace::SpcRam
        );
        if tracks_init
            && !initialized
            && op.kind.is_read()
            && self.flags.contains(DebuggerFlags::BREAK_ON_UNINIT_READ)
        {
            return Some(BreakEvent {
                source: BreakSource::BreakOnUninitMemoryRead,
                breakpoint_id: None,
                operation: Some(*op),
            });
        }

        self.find_breakpoint(context, op)
            .map(|id| BreakEvent::breakpoint(id, *op))
    }

    pub(crate) fn on_executed(&mut self, context: ProcessorContext) {
        match &mut self.step {
            StepMode::Instructions { context: c, remaining } if *c == context => {
                *remaining = remaining.saturating_sub(1);
            }
            StepMode::Over { context: c, started, .. } if *c == context => *started = true,
            _ => {}
        }
    }

    /// Called after the raster advanced to (`scanline`, `cycle`).
    pub(crate) fn on_dot(&mut self, scanline: u16, cycle: u16) -> Option<BreakEvent> {
        let done = match &mut self.step {
            StepMode::Dots { remaining } => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            StepMode::Scanline { target } => *target == scanline && cycle == 0,
            _ => false,
        };
        done.then(|| BreakEvent::step(BreakSource::PpuStep))
    }
}

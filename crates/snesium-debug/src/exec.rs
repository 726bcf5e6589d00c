//! Step/run/pause requests and per-context run state.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    config::region::Region,
    context::{ContextProfile, ProcessorContext},
    engine::{Engine, StepKind},
    error::DebugError,
};

/// Instructions executed when a view opens, so the view starts from a
/// well-defined paused state.
pub const BOOTSTRAP_STEP_COUNT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

/// Raster step sizes offered by the debugger toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuStepUnit {
    Cycle,
    Scanline,
    Frame,
}

impl PpuStepUnit {
    pub fn cycles(self, region: Region) -> u32 {
        match self {
            PpuStepUnit::Cycle => 1,
            PpuStepUnit::Scanline => region.cycles_per_scanline(),
            PpuStepUnit::Frame => region.cycles_per_frame(),
        }
    }
}

/// Issues execution requests to the engine.
///
/// Requests are validated against the context's profile before they reach
/// the engine. Run state is tracked per context, but the engine pauses as a
/// whole, so every tracked context transitions together.
#[derive(Debug)]
pub struct ExecutionController<E> {
    engine: E,
    region: Region,
    states: BTreeMap<ProcessorContext, RunState>,
}

impl<E: Engine> ExecutionController<E> {
    pub fn new(engine: E, region: Region) -> Self {
        Self {
            engine,
            region,
            states: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    /// Starts tracking `context`. A freshly tracked context counts as running
    /// until its first break.
    pub fn track(&mut self, context: ProcessorContext) {
        self.states.entry(context).or_insert(RunState::Running);
    }

    pub fn untrack(&mut self, context: ProcessorContext) {
        self.states.remove(&context);
    }

    pub fn state(&self, context: ProcessorContext) -> Option<RunState> {
        self.states.get(&context).copied()
    }

    pub fn step(
        &mut self,
        context: ProcessorContext,
        count: u32,
        kind: StepKind,
    ) -> Result<(), DebugError> {
        let profile = profile(context)?;
        if !profile.supports(kind) {
            return Err(DebugError::UnsupportedStep { context, kind });
        }
        debug!(%context, count, %kind, "step");
        self.engine.step(context, count, kind)?;
        self.set_all(RunState::Running);
        Ok(())
    }

    pub fn step_ppu(&mut self, context: ProcessorContext, unit: PpuStepUnit) -> Result<(), DebugError> {
        self.step(context, unit.cycles(self.region), StepKind::PpuStep)
    }

    /// Runs until cycle 0 of `scanline`.
    pub fn run_to_scanline(&mut self, context: ProcessorContext, scanline: u16) -> Result<(), DebugError> {
        self.step(context, u32::from(scanline), StepKind::SpecificScanline)
    }

    pub fn bootstrap(&mut self, context: ProcessorContext) -> Result<(), DebugError> {
        self.step(context, BOOTSTRAP_STEP_COUNT, StepKind::SingleStep)
    }

    pub fn resume(&mut self, context: ProcessorContext) -> Result<(), DebugError> {
        profile(context)?;
        debug!(%context, "resume");
        self.engine.resume()?;
        self.set_all(RunState::Running);
        Ok(())
    }

    /// Pauses as soon as `context` completes its current instruction.
    pub fn break_now(&mut self, context: ProcessorContext) -> Result<(), DebugError> {
        self.step(context, 1, StepKind::SingleStep)
    }

    pub fn toggle_break_continue(&mut self, context: ProcessorContext) -> Result<(), DebugError> {
        if self.is_paused() {
            self.resume(context)
        } else {
            self.break_now(context)
        }
    }

    /// Engine-wide: all contexts share one timeline.
    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    /// Records a CodeBreak.
    pub fn on_break(&mut self) {
        self.set_all(RunState::Paused);
    }

    fn set_all(&mut self, state: RunState) {
        self.states.values_mut().for_each(|s| *s = state);
    }
}

fn profile(context: ProcessorContext) -> Result<&'static ContextProfile, DebugError> {
    context
        .profile()
        .ok_or(DebugError::UnsupportedContext(context))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{Call, RecordingEngine};

    fn controller(region: Region) -> (ExecutionController<Arc<RecordingEngine>>, Arc<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::default());
        (ExecutionController::new(Arc::clone(&engine), region), engine)
    }

    #[test]
    fn ppu_step_sizes_follow_the_region() {
        let (mut ctl, engine) = controller(Region::Pal);
        ctl.step_ppu(ProcessorContext::Cpu, PpuStepUnit::Cycle).expect("cycle");
        ctl.step_ppu(ProcessorContext::Cpu, PpuStepUnit::Scanline).expect("scanline");
        ctl.step_ppu(ProcessorContext::Cpu, PpuStepUnit::Frame).expect("frame");
        ctl.set_region(Region::Ntsc);
        ctl.step_ppu(ProcessorContext::Cpu, PpuStepUnit::Frame).expect("frame");

        let cycles: Vec<u32> = engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Step(_, count, StepKind::PpuStep) => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, [1, 341, 341 * 312, 341 * 262]);
    }

    #[test]
    fn unsupported_steps_never_reach_the_engine() {
        let (mut ctl, engine) = controller(Region::Ntsc);
        let err = ctl
            .step(ProcessorContext::Gsu, 1, StepKind::StepOver)
            .expect_err("gsu has no step over");
        assert!(matches!(err, DebugError::UnsupportedStep { .. }));
        let err = ctl
            .step(ProcessorContext::Cx4, 1, StepKind::SingleStep)
            .expect_err("cx4 has no profile");
        assert!(matches!(err, DebugError::UnsupportedContext(ProcessorContext::Cx4)));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn toggle_break_continue_follows_engine_pause_state() {
        let (mut ctl, engine) = controller(Region::Ntsc);
        ctl.toggle_break_continue(ProcessorContext::Spc).expect("break");
        engine.set_paused(true);
        ctl.toggle_break_continue(ProcessorContext::Spc).expect("continue");

        assert_eq!(
            engine.calls(),
            [
                Call::Step(ProcessorContext::Spc, 1, StepKind::SingleStep),
                Call::Resume
            ]
        );
    }

    #[test]
    fn run_state_moves_together() {
        let (mut ctl, _engine) = controller(Region::Ntsc);
        ctl.track(ProcessorContext::Cpu);
        ctl.track(ProcessorContext::Spc);
        ctl.bootstrap(ProcessorContext::Cpu).expect("bootstrap");
        assert_eq!(ctl.state(ProcessorContext::Spc), Some(RunState::Running));

        ctl.on_break();
        assert_eq!(ctl.state(ProcessorContext::Cpu), Some(RunState::Paused));
        assert_eq!(ctl.state(ProcessorContext::Spc), Some(RunState::Paused));

        ctl.run_to_scanline(ProcessorContext::Cpu, 100).expect("run to scanline");
        assert_eq!(ctl.state(ProcessorContext::Cpu), Some(RunState::Running));
        ctl.untrack(ProcessorContext::Spc);
        assert_eq!(ctl.state(ProcessorContext::Spc), None);
    }
}

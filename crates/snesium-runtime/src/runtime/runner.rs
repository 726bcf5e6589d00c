use std::{
    sync::{Arc, atomic::Ordering},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use snesium_debug::{BreakEvent, Notification, ProcessorContext};
use tracing::{debug, info};

use super::{
    control::ControlMessage,
    debug::StepMode,
    debug_interceptor::DebugInterceptor,
    event_capture::EventCapture,
    machine::Machine,
    pubsub::NotificationHub,
    state::RuntimeState,
    types::{Pacing, RuntimeConfig, RuntimeError, TICKS_PER_SLICE},
};

enum WaitOutcome {
    /// Runtime thread should exit (channel disconnected or Stop received).
    Exit,
    /// A control message was handled; caller should re-check state/deadlines.
    ControlHandled,
    DeadlineReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    FrameDone,
    Break,
    /// Nothing is loaded or no trace has instructions.
    Idle,
}

const IDLE_POLL: Duration = Duration::from_millis(10);
const MAX_SLEEP_CHUNK: Duration = Duration::from_millis(4);

pub(crate) struct Runner {
    ctrl_rx: Receiver<ControlMessage>,
    state: Arc<RuntimeState>,
    config: RuntimeConfig,
    machine: Machine,
    debug: DebugInterceptor,
    capture: EventCapture,
    hub: NotificationHub,
    frame_duration: Duration,
    next_frame_deadline: Instant,
}

impl Runner {
    pub(crate) fn new(
        config: RuntimeConfig,
        ctrl_rx: Receiver<ControlMessage>,
        state: Arc<RuntimeState>,
    ) -> Self {
        Self {
            ctrl_rx,
            state,
            machine: Machine::new(config.region),
            debug: DebugInterceptor::new(),
            capture: EventCapture::new(),
            hub: NotificationHub::new(),
            frame_duration: config.frame_duration(),
            next_frame_deadline: Instant::now(),
            config,
        }
    }

    pub(crate) fn run(&mut self) {
        info!(region = %self.config.region, pacing = ?self.config.pacing, "runtime thread started");
        loop {
            loop {
                match self.ctrl_rx.try_recv() {
                    Ok(msg) => {
                        if self.handle_control(msg) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            if self.state.paused.load(Ordering::Acquire) || self.machine.next_slot().is_none() {
                match self.ctrl_rx.recv_timeout(IDLE_POLL) {
                    Ok(msg) => {
                        if self.handle_control(msg) {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
                continue;
            }

            if self.config.pacing == Pacing::Realtime {
                match self.wait_until_next_deadline() {
                    WaitOutcome::Exit => return,
                    WaitOutcome::ControlHandled => continue,
                    WaitOutcome::DeadlineReached => {}
                }
            }

            if self.run_slice() == TickOutcome::FrameDone {
                self.next_frame_deadline += self.frame_duration;
                let now = Instant::now();
                if now > self.next_frame_deadline
                    && now.duration_since(self.next_frame_deadline) > self.frame_duration * 2
                {
                    self.next_frame_deadline = now;
                }
            }
        }
    }

    fn wait_until_next_deadline(&mut self) -> WaitOutcome {
        loop {
            let now = Instant::now();
            if now >= self.next_frame_deadline {
                return WaitOutcome::DeadlineReached;
            }
            let sleep_for = (self.next_frame_deadline - now).min(MAX_SLEEP_CHUNK);
            match self.ctrl_rx.recv_timeout(sleep_for) {
                Ok(msg) => {
                    if self.handle_control(msg) {
                        return WaitOutcome::Exit;
                    }
                    return WaitOutcome::ControlHandled;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return WaitOutcome::Exit,
            }
        }
    }

    /// Runs until a frame ends, execution breaks, or the slice runs out.
    fn run_slice(&mut self) -> TickOutcome {
        for _ in 0..TICKS_PER_SLICE {
            match self.tick() {
                TickOutcome::Continue => {}
                other => return other,
            }
        }
        TickOutcome::Continue
    }

    /// Advances to the next fetch and executes it, unless a raster cycle on
    /// the way ends the frame or breaks.
    pub(crate) fn tick(&mut self) -> TickOutcome {
        let Some((slot, due)) = self.machine.next_slot() else {
            return TickOutcome::Idle;
        };

        while self.machine.master_clock() < due {
            let dot = self.machine.advance_dot();
            if dot.frame_done {
                self.end_frame();
            }
            if let Some(event) = self.debug.on_dot(dot.scanline, dot.cycle) {
                self.enter_break(event, None);
                return TickOutcome::Break;
            }
            if dot.frame_done {
                return TickOutcome::FrameDone;
            }
        }

        self.execute(slot)
    }

    fn execute(&mut self, slot: usize) -> TickOutcome {
        let position = self.machine.raster();
        let (context, address, hit) = {
            let Some(fetch) = self.machine.fetch(slot) else {
                return TickOutcome::Idle;
            };
            let insn = fetch.instruction;
            let hit = self.debug.on_fetch(fetch.context, insn, fetch.depth);
            if hit.is_none()
                && let Some(interrupt) = insn.interrupt
            {
                self.capture.record_interrupt(position, insn.address, interrupt);
            }
            (fetch.context, insn.address, hit)
        };
        if let Some(event) = hit {
            self.enter_break_at(position, address, event, Some((context, address)));
            return TickOutcome::Break;
        }

        let mut hit = None;
        let debug = &self.debug;
        let capture = &mut self.capture;
        self.machine.execute(slot, |op, initialized| {
            capture.record_operation(position, address, &op.operation, op.dma);
            if hit.is_none() {
                hit = debug.on_operation(context, &op.operation, initialized);
            }
        });
        self.debug.on_executed(context);

        match hit {
            Some(event) => {
                self.enter_break_at(position, address, event, None);
                TickOutcome::Break
            }
            None => TickOutcome::Continue,
        }
    }

    fn enter_break_at(
        &mut self,
        position: (u16, u16),
        program_counter: u32,
        event: BreakEvent,
        fetch: Option<(ProcessorContext, u32)>,
    ) {
        if let (Some(id), Some(op)) = (event.breakpoint_id, event.operation.as_ref()) {
            self.capture.record_breakpoint(position, program_counter, id, op);
        }
        self.enter_break(event, fetch);
    }

    /// Pauses and announces exactly one CodeBreak.
    fn enter_break(&mut self, event: BreakEvent, fetch: Option<(ProcessorContext, u32)>) {
        self.debug.paused(fetch);
        self.state.paused.store(true, Ordering::Release);
        self.publish_snapshot();
        debug!(source = %event.source, id = ?event.breakpoint_id, "break");
        self.hub.broadcast(Notification::CodeBreak(event));
    }

    fn end_frame(&mut self) {
        self.capture.start_frame();
        self.state.frame_seq.fetch_add(1, Ordering::Relaxed);
        self.publish_snapshot();
        self.hub.broadcast(Notification::FrameDone);
    }

    fn publish_snapshot(&self) {
        *self.state.snapshot.lock() = self.machine.debug_state();
    }

    fn set_running(&mut self) {
        if self.state.paused.swap(false, Ordering::AcqRel) {
            self.next_frame_deadline = Instant::now();
        }
    }

    fn handle_control(&mut self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::Stop => {
                info!("runtime thread stopping");
                return true;
            }
            ControlMessage::Subscribe(sender, reply) => {
                self.hub.subscribe(sender);
                let _ = reply.send(Ok(()));
            }
            ControlMessage::Load(program, reply) => {
                if !program.is_runnable() {
                    let _ = reply.send(Err(RuntimeError::Rejected {
                        op: "load",
                        reason: "program has no instructions".to_string(),
                    }));
                    return false;
                }
                let coprocessor = program.coprocessor;
                self.machine.load(*program);
                // A new game starts without breakpoints until the debugger resyncs.
                self.debug.clear_breakpoints();
                self.debug.reset();
                self.capture.clear();
                self.state.frame_seq.store(0, Ordering::Relaxed);
                self.publish_snapshot();
                self.state.paused.store(false, Ordering::Release);
                self.next_frame_deadline = Instant::now();
                info!(?coprocessor, "program loaded");
                let _ = reply.send(Ok(()));
                self.hub.broadcast(Notification::GameLoaded { coprocessor });
            }
            ControlMessage::Reset(reply) => {
                if !self.machine.is_loaded() {
                    let _ = reply.send(Err(RuntimeError::Rejected {
                        op: "reset",
                        reason: "no program loaded".to_string(),
                    }));
                    return false;
                }
                // A paused machine stays paused at the reset vector.
                self.machine.reset();
                self.debug.reset();
                self.capture.clear();
                self.publish_snapshot();
                info!("machine reset");
                let _ = reply.send(Ok(()));
                self.hub.broadcast(Notification::GameReset);
            }
            ControlMessage::SetRegion(region, reply) => {
                self.config.region = region;
                self.frame_duration = self.config.frame_duration();
                self.machine.set_region(region);
                let _ = reply.send(Ok(()));
            }
            ControlMessage::SetBreakpoints(breakpoints, reply) => {
                debug!(count = breakpoints.len(), "breakpoints replaced");
                self.debug.set_breakpoints(breakpoints);
                let _ = reply.send(Ok(()));
            }
            ControlMessage::SetDebuggerFlags(flags, enabled, reply) => {
                self.debug.set_flags(flags, enabled);
                debug!(flags = ?self.debug.flags(), "debugger flags");
                let _ = reply.send(Ok(()));
            }
            ControlMessage::Step {
                context,
                count,
                kind,
                reply,
            } => {
                if self.machine.is_loaded()
                    && kind.is_instruction_step()
                    && !self.machine.has_context(context)
                {
                    let _ = reply.send(Err(RuntimeError::Rejected {
                        op: "step",
                        reason: format!("no {context} code in the loaded program"),
                    }));
                    return false;
                }
                let depth = self.machine.depth(context);
                match StepMode::from_request(context, count, kind, depth, self.config.region) {
                    Ok(mode) => {
                        self.debug.set_step(mode);
                        self.set_running();
                        let _ = reply.send(Ok(()));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            ControlMessage::Resume(reply) => {
                self.debug.set_step(StepMode::None);
                self.set_running();
                let _ = reply.send(Ok(()));
            }
            ControlMessage::ReadMemory(space, address, reply) => {
                let _ = reply.send(Ok(self.machine.peek(space, address)));
            }
            ControlMessage::TakeEventSnapshot(options, reply) => {
                self.capture.take_snapshot(&options, self.machine.raster());
                let _ = reply.send(Ok(()));
            }
            ControlMessage::EventViewerOutput(options, reply) => {
                let _ = reply.send(Ok(self.capture.render(&options, self.config.region)));
            }
            ControlMessage::EventViewerEvent {
                scanline,
                cycle,
                options,
                reply,
            } => {
                let _ = reply.send(Ok(self.capture.event_at(scanline, cycle, &options)));
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{bounded, unbounded};
    use snesium_debug::{
        BreakSource, Breakpoint, CoprocessorType, DebuggerFlags, FlattenedBreakpoint, MemorySpace, StepKind,
        notification_channel,
    };

    use super::*;
    use crate::{program::Program, runtime::control::ControlReplySender};

    struct Harness {
        runner: Runner,
        notifications: Receiver<Notification>,
    }

    fn harness() -> Harness {
        let (_ctrl_tx, ctrl_rx) = unbounded();
        let mut runner = Runner::new(RuntimeConfig::default(), ctrl_rx, Arc::new(RuntimeState::new()));
        let (tx, notifications) = notification_channel();
        runner.hub.subscribe(tx);
        let (reply, _) = bounded(1);
        runner.handle_control(ControlMessage::Load(Box::new(Program::demo()), reply));
        assert_eq!(
            notifications.try_recv().ok(),
            Some(Notification::GameLoaded {
                coprocessor: CoprocessorType::None
            })
        );
        Harness {
            runner,
            notifications,
        }
    }

    impl Harness {
        fn control(&mut self, build: impl FnOnce(ControlReplySender) -> ControlMessage) {
            let (reply, rx) = bounded(1);
            self.runner.handle_control(build(reply));
            assert_eq!(rx.try_recv().ok(), Some(Ok(())));
        }

        /// Ticks until a break, skipping frame notifications.
        fn run_to_break(&mut self) -> BreakEvent {
            for _ in 0..1_000_000 {
                if self.runner.tick() == TickOutcome::Break {
                    break;
                }
            }
            assert!(self.runner.state.paused.load(Ordering::Acquire));
            self.notifications
                .try_iter()
                .find_map(|n| match n {
                    Notification::CodeBreak(event) => Some(event),
                    _ => None,
                })
                .expect("code break")
        }

        fn cpu_address(&self) -> u32 {
            let state = self.runner.machine.debug_state().expect("state");
            (u32::from(state.cpu.k) << 16) | u32::from(state.cpu.pc)
        }
    }

    #[test]
    fn single_step_stops_at_the_next_cpu_instruction() {
        let mut h = harness();
        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 2,
            kind: StepKind::SingleStep,
            reply,
        });
        let event = h.run_to_break();
        assert_eq!(event, BreakEvent::step(BreakSource::CpuStep));
        assert_eq!(h.cpu_address(), 0x80_8004);
    }

    #[test]
    fn exactly_one_code_break_per_pause() {
        let mut h = harness();
        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 1,
            kind: StepKind::SingleStep,
            reply,
        });
        h.run_to_break();
        assert_eq!(h.runner.tick(), TickOutcome::Continue);
        let breaks = h
            .notifications
            .try_iter()
            .filter(|n| matches!(n, Notification::CodeBreak(_)))
            .count();
        assert_eq!(breaks, 0);
    }

    #[test]
    fn step_over_runs_the_called_routine() {
        let mut h = harness();
        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 3,
            kind: StepKind::SingleStep,
            reply,
        });
        h.run_to_break();
        assert_eq!(h.cpu_address(), 0x80_8007);

        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 1,
            kind: StepKind::StepOver,
            reply,
        });
        h.run_to_break();
        assert_eq!(h.cpu_address(), 0x80_800A);
    }

    #[test]
    fn step_out_returns_to_the_caller() {
        let mut h = harness();
        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 4,
            kind: StepKind::SingleStep,
            reply,
        });
        h.run_to_break();
        assert_eq!(h.cpu_address(), 0x80_9000);

        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 1,
            kind: StepKind::StepOut,
            reply,
        });
        h.run_to_break();
        assert_eq!(h.cpu_address(), 0x80_800A);
    }

    #[test]
    fn exec_breakpoint_reports_its_positional_id() {
        let mut h = harness();
        h.control(|reply| ControlMessage::SetDebuggerFlags(DebuggerFlags::CPU_DEBUGGER_ENABLED, true, reply));
        let breakpoints = vec![FlattenedBreakpoint {
            id: 2,
            breakpoint: Breakpoint::at(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0x80_9003),
        }];
        h.control(|reply| ControlMessage::SetBreakpoints(breakpoints, reply));

        let event = h.run_to_break();
        assert_eq!(event.source, BreakSource::Breakpoint);
        assert_eq!(event.breakpoint_id, Some(2));
        assert_eq!(h.cpu_address(), 0x80_9003);

        h.control(ControlMessage::Resume);
        assert_ne!(h.runner.tick(), TickOutcome::Break);
    }

    #[test]
    fn uninitialized_read_breaks_once_enabled() {
        let mut h = harness();
        h.control(|reply| ControlMessage::SetDebuggerFlags(DebuggerFlags::BREAK_ON_UNINIT_READ, true, reply));
        let event = h.run_to_break();
        assert_eq!(event.source, BreakSource::BreakOnUninitMemoryRead);
        assert_eq!(event.operation.map(|op| op.address), Some(0x10));
    }

    #[test]
    fn ppu_step_counts_raster_cycles() {
        let mut h = harness();
        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 341,
            kind: StepKind::PpuStep,
            reply,
        });
        let event = h.run_to_break();
        assert_eq!(event.source, BreakSource::PpuStep);
        assert_eq!(h.runner.machine.raster(), (1, 0));

        h.control(|reply| ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 100,
            kind: StepKind::SpecificScanline,
            reply,
        });
        h.run_to_break();
        assert_eq!(h.runner.machine.raster(), (100, 0));
    }

    #[test]
    fn out_of_range_scanline_is_rejected() {
        let mut h = harness();
        let (reply, rx) = bounded(1);
        h.runner.handle_control(ControlMessage::Step {
            context: ProcessorContext::Cpu,
            count: 400,
            kind: StepKind::SpecificScanline,
            reply,
        });
        assert!(matches!(rx.try_recv(), Ok(Err(RuntimeError::Rejected { op: "step", .. }))));
    }

    #[test]
    fn load_clears_engine_breakpoints() {
        let mut h = harness();
        h.control(|reply| ControlMessage::SetDebuggerFlags(DebuggerFlags::CPU_DEBUGGER_ENABLED, true, reply));
        let breakpoints = vec![FlattenedBreakpoint {
            id: 0,
            breakpoint: Breakpoint::at(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0x80_8000),
        }];
        h.control(|reply| ControlMessage::SetBreakpoints(breakpoints, reply));
        h.control(|reply| ControlMessage::Load(Box::new(Program::demo()), reply));
        for _ in 0..10_000 {
            assert_ne!(h.runner.tick(), TickOutcome::Break);
        }
    }
}

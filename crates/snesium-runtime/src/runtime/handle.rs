use std::{
    sync::{Arc, atomic::Ordering},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use snesium_debug::{
    BreakpointSink, DebugEventInfo, DebugState, DebuggerFlags, Engine, EngineError,
    EventViewerFrame, EventViewerOptions, FlattenedBreakpoint, MemorySpace, Notification,
    ProcessorContext, Region, StepKind, notification_channel,
};

use crate::program::Program;

use super::{
    control::{ControlMessage, ControlReplySender},
    runner::Runner,
    state::RuntimeState,
    types::{CONTROL_REPLY_TIMEOUT, LOAD_REPLY_TIMEOUT, RuntimeConfig, RuntimeError},
};

struct RuntimeInner {
    ctrl_tx: Sender<ControlMessage>,
    state: Arc<RuntimeState>,
}

/// Owns the runner thread. Dropping it stops the thread.
pub struct Runtime {
    inner: Arc<RuntimeInner>,
    join: Option<JoinHandle<()>>,
}

/// Cheap, cloneable access to a running [`Runtime`]. This is the
/// [`Engine`] a debug session drives.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn start(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        if let Some(fps) = config.fps_override
            && !(fps.is_finite() && fps > 0.0)
        {
            return Err(RuntimeError::InvalidFrameRate { fps });
        }

        let (ctrl_tx, ctrl_rx) = unbounded::<ControlMessage>();
        let state = Arc::new(RuntimeState::new());
        let thread_state = Arc::clone(&state);

        let join = thread::Builder::new()
            .name("snesium-runtime".to_string())
            .spawn(move || {
                let mut runner = Runner::new(config, ctrl_rx, thread_state);
                runner.run();
            })
            .map_err(|e| RuntimeError::SpawnFailed {
                error: e.to_string(),
            })?;

        Ok(Self {
            inner: Arc::new(RuntimeInner { ctrl_tx, state }),
            join: Some(join),
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let _ = self.inner.ctrl_tx.send(ControlMessage::Stop);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl RuntimeHandle {
    fn request<T>(
        &self,
        op: &'static str,
        timeout: Duration,
        build: impl FnOnce(ControlReplySender<T>) -> ControlMessage,
    ) -> Result<T, RuntimeError> {
        let (reply_tx, reply_rx) = bounded::<Result<T, RuntimeError>>(1);
        self.inner
            .ctrl_tx
            .send(build(reply_tx))
            .map_err(|_| RuntimeError::ControlChannelDisconnected)?;
        match reply_rx.recv_timeout(timeout) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => Err(RuntimeError::ControlTimeout { op }),
            Err(RecvTimeoutError::Disconnected) => Err(RuntimeError::ControlChannelDisconnected),
        }
    }

    /// Adds a notification subscriber.
    pub fn subscribe(&self, sender: Sender<Notification>) -> Result<(), RuntimeError> {
        self.request("subscribe", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::Subscribe(sender, reply)
        })
    }

    /// Subscribes a fresh bounded notification queue and returns its receiver.
    pub fn notifications(&self) -> Result<Receiver<Notification>, RuntimeError> {
        let (tx, rx) = notification_channel();
        self.subscribe(tx)?;
        Ok(rx)
    }

    /// Replaces the running program. Engine breakpoints are cleared and
    /// subscribers receive `GameLoaded`.
    pub fn load(&self, program: Program) -> Result<(), RuntimeError> {
        self.request("load", LOAD_REPLY_TIMEOUT, |reply| {
            ControlMessage::Load(Box::new(program), reply)
        })
    }

    pub fn reset(&self) -> Result<(), RuntimeError> {
        self.request("reset", CONTROL_REPLY_TIMEOUT, ControlMessage::Reset)
    }

    pub fn set_region(&self, region: Region) -> Result<(), RuntimeError> {
        self.request("set_region", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::SetRegion(region, reply)
        })
    }

    /// Frames completed since the last load.
    pub fn frame_seq(&self) -> u64 {
        self.inner.state.frame_seq.load(Ordering::Relaxed)
    }
}

impl BreakpointSink for RuntimeHandle {
    fn push_breakpoints(&self, breakpoints: &[FlattenedBreakpoint]) -> Result<(), EngineError> {
        let breakpoints = breakpoints.to_vec();
        Ok(self.request("set_breakpoints", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::SetBreakpoints(breakpoints, reply)
        })?)
    }
}

impl Engine for RuntimeHandle {
    fn step(&self, context: ProcessorContext, count: u32, kind: StepKind) -> Result<(), EngineError> {
        Ok(self.request("step", CONTROL_REPLY_TIMEOUT, |reply| ControlMessage::Step {
            context,
            count,
            kind,
            reply,
        })?)
    }

    fn resume(&self) -> Result<(), EngineError> {
        Ok(self.request("resume", CONTROL_REPLY_TIMEOUT, ControlMessage::Resume)?)
    }

    fn is_paused(&self) -> bool {
        self.inner.state.paused.load(Ordering::Acquire)
    }

    fn get_state(&self) -> Option<DebugState> {
        *self.inner.state.snapshot.lock()
    }

    fn get_memory_value(&self, space: MemorySpace, address: u32) -> Result<u8, EngineError> {
        Ok(self.request("read_memory", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::ReadMemory(space, address, reply)
        })?)
    }

    fn set_debugger_flags(&self, flags: DebuggerFlags, enabled: bool) -> Result<(), EngineError> {
        Ok(self.request("set_debugger_flags", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::SetDebuggerFlags(flags, enabled, reply)
        })?)
    }

    fn take_event_snapshot(&self, options: &EventViewerOptions) -> Result<(), EngineError> {
        let options = *options;
        Ok(self.request("take_event_snapshot", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::TakeEventSnapshot(options, reply)
        })?)
    }

    fn get_event_viewer_output(
        &self,
        options: &EventViewerOptions,
    ) -> Result<EventViewerFrame, EngineError> {
        let options = *options;
        Ok(self.request("get_event_viewer_output", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::EventViewerOutput(options, reply)
        })?)
    }

    fn get_event_viewer_event(
        &self,
        scanline: u16,
        cycle: u16,
        options: &EventViewerOptions,
    ) -> Result<Option<DebugEventInfo>, EngineError> {
        let options = *options;
        Ok(self.request("get_event_viewer_event", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::EventViewerEvent {
                scanline,
                cycle,
                options,
                reply,
            }
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::Pacing;

    fn unthrottled() -> RuntimeConfig {
        RuntimeConfig {
            pacing: Pacing::Unthrottled,
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn rejects_bad_frame_rates() {
        for fps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = RuntimeConfig {
                fps_override: Some(fps),
                ..RuntimeConfig::default()
            };
            assert!(matches!(
                Runtime::start(config),
                Err(RuntimeError::InvalidFrameRate { .. })
            ));
        }
    }

    #[test]
    fn empty_programs_are_rejected() {
        let runtime = Runtime::start(unthrottled()).expect("start");
        let handle = runtime.handle();
        let err = handle
            .load(Program::default())
            .expect_err("empty program");
        assert!(matches!(err, RuntimeError::Rejected { op: "load", .. }));
        assert!(handle.get_state().is_none());
        assert!(matches!(
            handle.reset(),
            Err(RuntimeError::Rejected { op: "reset", .. })
        ));
    }

    #[test]
    fn load_announces_the_game_and_reads_memory() {
        let runtime = Runtime::start(unthrottled()).expect("start");
        let handle = runtime.handle();
        let notifications = handle.notifications().expect("subscribe");
        handle.load(Program::demo()).expect("load");

        assert_eq!(
            notifications.recv_timeout(Duration::from_secs(2)),
            Ok(Notification::GameLoaded {
                coprocessor: snesium_debug::CoprocessorType::None
            })
        );
        assert!(handle.get_state().is_some());
        assert_eq!(handle.get_memory_value(MemorySpace::CpuMemory, 0xFFEA), Ok(0x00));
        assert_eq!(handle.get_memory_value(MemorySpace::CpuMemory, 0xFFEB), Ok(0x81));
    }

    #[test]
    fn requests_fail_after_shutdown() {
        let runtime = Runtime::start(unthrottled()).expect("start");
        let handle = runtime.handle();
        drop(runtime);
        assert_eq!(handle.resume(), Err(EngineError::Disconnected));
    }
}

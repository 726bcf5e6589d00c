use crossbeam_channel::Sender;
use snesium_debug::{
    DebugEventInfo, DebuggerFlags, EventViewerFrame, EventViewerOptions, FlattenedBreakpoint,
    MemorySpace, Notification, ProcessorContext, Region, StepKind,
};

use crate::program::Program;

use super::types::RuntimeError;

pub(crate) type ControlReplySender<T = ()> = Sender<Result<T, RuntimeError>>;

pub(crate) enum ControlMessage {
    Stop,
    Subscribe(Sender<Notification>, ControlReplySender),
    Load(Box<Program>, ControlReplySender),
    Reset(ControlReplySender),
    SetRegion(Region, ControlReplySender),
    SetBreakpoints(Vec<FlattenedBreakpoint>, ControlReplySender),
    SetDebuggerFlags(DebuggerFlags, bool, ControlReplySender),
    Step {
        context: ProcessorContext,
        count: u32,
        kind: StepKind,
        reply: ControlReplySender,
    },
    Resume(ControlReplySender),
    ReadMemory(MemorySpace, u32, ControlReplySender<u8>),
    TakeEventSnapshot(EventViewerOptions, ControlReplySender),
    EventViewerOutput(EventViewerOptions, ControlReplySender<EventViewerFrame>),
    EventViewerEvent {
        scanline: u16,
        cycle: u16,
        options: EventViewerOptions,
        reply: ControlReplySender<Option<DebugEventInfo>>,
    },
}

//! Contract between the debugger core and the execution engine.
//!
//! Every call is a synchronous request that may block while the engine reaches
//! a safe point. Calls are issued by a single logical caller (the
//! [`DebugSession`](crate::session::DebugSession)); nothing here serialises
//! concurrent callers.

use core::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::{
    breakpoint::FlattenedBreakpoint,
    context::ProcessorContext,
    dma::{DebugEventInfo, DebugEventType},
    error::EngineError,
    event::BreakEvent,
    memory::MemorySpace,
    state::DebugState,
};

/// Capacity of the engine → session notification queue.
pub const NOTIFICATION_QUEUE_DEPTH: usize = 256;

bitflags! {
    /// Engine-side debugger switches.
    ///
    /// The low byte holds break conditions the engine evaluates on its own;
    /// the second byte enables per-context instrumentation while a view of
    /// that context is open.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DebuggerFlags: u32 {
        const BREAK_ON_BRK = 1 << 0;
        const BREAK_ON_COP = 1 << 1;
        const BREAK_ON_WDM = 1 << 2;
        const BREAK_ON_STP = 1 << 3;
        const BREAK_ON_UNINIT_READ = 1 << 4;

        const CPU_DEBUGGER_ENABLED = 1 << 8;
        const SPC_DEBUGGER_ENABLED = 1 << 9;
        const SA1_DEBUGGER_ENABLED = 1 << 10;
        const GSU_DEBUGGER_ENABLED = 1 << 11;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Run exactly `count` instructions of the requested context.
    SingleStep,
    /// Step one instruction, running a called subroutine to completion.
    StepOver,
    /// Run until the current subroutine returns.
    StepOut,
    /// Run `count` raster (PPU) cycles.
    PpuStep,
    /// Run until cycle 0 of scanline `count`.
    SpecificScanline,
}

impl StepKind {
    /// Instruction-granular kinds depend on a processor; raster kinds do not.
    pub fn is_instruction_step(self) -> bool {
        matches!(self, Self::SingleStep | Self::StepOver | Self::StepOut)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SingleStep => "step",
            Self::StepOver => "step over",
            Self::StepOut => "step out",
            Self::PpuStep => "PPU step",
            Self::SpecificScanline => "run to scanline",
        };
        f.write_str(s)
    }
}

/// Coprocessor fitted on the loaded cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoprocessorType {
    #[default]
    None,
    Sa1,
    Gsu,
    NecDsp,
    Cx4,
}

/// Typed notifications emitted by the engine, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    GameLoaded { coprocessor: CoprocessorType },
    GameReset,
    FrameDone,
    /// Exactly one per pause transition.
    CodeBreak(BreakEvent),
}

/// Creates the bounded queue the engine delivers notifications into.
pub fn notification_channel() -> (Sender<Notification>, Receiver<Notification>) {
    bounded(NOTIFICATION_QUEUE_DEPTH)
}

bitflags! {
    /// Event categories shown by the event viewer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFilter: u8 {
        const REGISTER_READS = 1 << 0;
        const REGISTER_WRITES = 1 << 1;
        const IRQ = 1 << 2;
        const NMI = 1 << 3;
        const MARKED_BREAKPOINTS = 1 << 4;
        const PREVIOUS_FRAME = 1 << 5;
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all().difference(Self::PREVIOUS_FRAME)
    }
}

/// ARGB colors used when the engine rasterises captured events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventColors {
    pub register_read: u32,
    pub register_write: u32,
    pub dma: u32,
    pub irq: u32,
    pub nmi: u32,
    pub breakpoint: u32,
}

impl Default for EventColors {
    fn default() -> Self {
        Self {
            register_read: 0xFF18_98E4,
            register_write: 0xFFFF_5E5E,
            dma: 0xFFA8_70E0,
            irq: 0xFFF9_FEAC,
            nmi: 0xFFAB_ADAC,
            breakpoint: 0xFF18_FFFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventViewerOptions {
    pub filter: EventFilter,
    /// Bit `n` shows DMA-driven events of channel `n`.
    pub dma_channels: u8,
    pub colors: EventColors,
}

impl Default for EventViewerOptions {
    fn default() -> Self {
        Self {
            filter: EventFilter::default(),
            dma_channels: 0xFF,
            colors: EventColors::default(),
        }
    }
}

impl EventViewerOptions {
    /// Whether `event` passes the category and DMA channel filters.
    pub fn accepts(&self, event: &DebugEventInfo) -> bool {
        match event.event_type {
            DebugEventType::Register => {
                if let Some(channel) = event.dma_channel {
                    if self.dma_channels & (1 << (channel & 0x07)) == 0 {
                        return false;
                    }
                }
                if event.operation.kind.is_write() {
                    self.filter.contains(EventFilter::REGISTER_WRITES)
                } else {
                    self.filter.contains(EventFilter::REGISTER_READS)
                }
            }
            DebugEventType::Breakpoint => self.filter.contains(EventFilter::MARKED_BREAKPOINTS),
            DebugEventType::Irq => self.filter.contains(EventFilter::IRQ),
            DebugEventType::Nmi => self.filter.contains(EventFilter::NMI),
        }
    }

    pub fn color_for(&self, event: &DebugEventInfo) -> u32 {
        match event.event_type {
            DebugEventType::Register if event.dma_channel.is_some() => self.colors.dma,
            DebugEventType::Register if event.operation.kind.is_write() => {
                self.colors.register_write
            }
            DebugEventType::Register => self.colors.register_read,
            DebugEventType::Breakpoint => self.colors.breakpoint,
            DebugEventType::Irq => self.colors.irq,
            DebugEventType::Nmi => self.colors.nmi,
        }
    }
}

/// Raw event-viewer raster: one ARGB pixel per (cycle, scanline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventViewerFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

/// Receiver of the flattened breakpoint list.
pub trait BreakpointSink {
    /// Replaces the engine's active breakpoint set wholesale.
    fn push_breakpoints(&self, breakpoints: &[FlattenedBreakpoint]) -> Result<(), EngineError>;
}

pub trait Engine: BreakpointSink {
    fn step(&self, context: ProcessorContext, count: u32, kind: StepKind) -> Result<(), EngineError>;

    /// Run until the next stop condition.
    fn resume(&self) -> Result<(), EngineError>;

    /// Engine-global: every context shares one execution timeline.
    fn is_paused(&self) -> bool;

    /// `None` when the engine cannot produce a snapshot.
    fn get_state(&self) -> Option<DebugState>;

    fn get_memory_value(&self, space: MemorySpace, address: u32) -> Result<u8, EngineError>;

    fn set_debugger_flags(&self, flags: DebuggerFlags, enabled: bool) -> Result<(), EngineError>;

    fn take_event_snapshot(&self, options: &EventViewerOptions) -> Result<(), EngineError>;

    fn get_event_viewer_output(
        &self,
        options: &EventViewerOptions,
    ) -> Result<EventViewerFrame, EngineError>;

    /// The captured event nearest to (`scanline`, `cycle`), if any.
    fn get_event_viewer_event(
        &self,
        scanline: u16,
        cycle: u16,
        options: &EventViewerOptions,
    ) -> Result<Option<DebugEventInfo>, EngineError>;
}

impl<T: BreakpointSink + ?Sized> BreakpointSink for Arc<T> {
    fn push_breakpoints(&self, breakpoints: &[FlattenedBreakpoint]) -> Result<(), EngineError> {
        (**self).push_breakpoints(breakpoints)
    }
}

impl<T: Engine + ?Sized> Engine for Arc<T> {
    fn step(&self, context: ProcessorContext, count: u32, kind: StepKind) -> Result<(), EngineError> {
        (**self).step(context, count, kind)
    }

    fn resume(&self) -> Result<(), EngineError> {
        (**self).resume()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn get_state(&self) -> Option<DebugState> {
        (**self).get_state()
    }

    fn get_memory_value(&self, space: MemorySpace, address: u32) -> Result<u8, EngineError> {
        (**self).get_memory_value(space, address)
    }

    fn set_debugger_flags(&self, flags: DebuggerFlags, enabled: bool) -> Result<(), EngineError> {
        (**self).set_debugger_flags(flags, enabled)
    }

    fn take_event_snapshot(&self, options: &EventViewerOptions) -> Result<(), EngineError> {
        (**self).take_event_snapshot(options)
    }

    fn get_event_viewer_output(
        &self,
        options: &EventViewerOptions,
    ) -> Result<EventViewerFrame, EngineError> {
        (**self).get_event_viewer_output(options)
    }

    fn get_event_viewer_event(
        &self,
        scanline: u16,
        cycle: u16,
        options: &EventViewerOptions,
    ) -> Result<Option<DebugEventInfo>, EngineError> {
        (**self).get_event_viewer_event(scanline, cycle, options)
    }
}

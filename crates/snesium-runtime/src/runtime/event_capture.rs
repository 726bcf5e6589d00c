//! Event-viewer capture: register accesses, interrupts and breakpoint hits
//! tagged with the raster position they happened at.

use std::mem;

use snesium_debug::{
    DebugEventInfo, DebugEventType, DmaChannelInfo, EventFilter, EventViewerFrame,
    EventViewerOptions, MemoryOperationInfo, MemoryOperationType, MemorySpace, Region,
    config::region::CYCLES_PER_SCANLINE,
};

use crate::program::{DmaTag, Interrupt};

/// Events farther than this from the queried position are not returned.
const SEARCH_RADIUS: u16 = 2;

/// Whether a main-bus access hits the PPU or CPU I/O register blocks.
pub(crate) fn is_register_access(op: &MemoryOperationInfo) -> bool {
    op.space == MemorySpace::CpuMemory
        && (op.address >> 16) & 0x40 == 0
        && matches!(op.address & 0xFFFF, 0x2100..=0x21FF | 0x4200..=0x43FF)
}

#[derive(Debug, Default)]
pub(crate) struct EventCapture {
    current: Vec<DebugEventInfo>,
    previous: Vec<DebugEventInfo>,
    snapshot: Vec<DebugEventInfo>,
}

impl EventCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_operation(
        &mut self,
        (scanline, cycle): (u16, u16),
        program_counter: u32,
        op: &MemoryOperationInfo,
        dma: Option<DmaTag>,
    ) {
        if !is_register_access(op) {
            return;
        }
        self.current.push(DebugEventInfo {
            scanline,
            cycle,
            program_counter,
            event_type: DebugEventType::Register,
            operation: *op,
            breakpoint_id: None,
            dma_channel: dma.map(|tag| tag.channel),
            dma: dma.map(|tag| DmaChannelInfo::from_registers(&tag.registers, tag.hdma)),
        });
    }

    pub(crate) fn record_breakpoint(
        &mut self,
        (scanline, cycle): (u16, u16),
        program_counter: u32,
        id: usize,
        op: &MemoryOperationInfo,
    ) {
        self.current.push(DebugEventInfo {
            scanline,
            cycle,
            program_counter,
            event_type: DebugEventType::Breakpoint,
            operation: *op,
            breakpoint_id: Some(id),
            dma_channel: None,
            dma: None,
        });
    }

    /// Records the vector fetch that starts an interrupt handler.
    pub(crate) fn record_interrupt(
        &mut self,
        (scanline, cycle): (u16, u16),
        program_counter: u32,
        interrupt: Interrupt,
    ) {
        let (event_type, vector) = match interrupt {
            Interrupt::Nmi => (DebugEventType::Nmi, 0xFFEA),
            Interrupt::Irq => (DebugEventType::Irq, 0xFFEE),
        };
        self.current.push(DebugEventInfo {
            scanline,
            cycle,
            program_counter,
            event_type,
            operation: MemoryOperationInfo::new(
                MemorySpace::CpuMemory,
                vector,
                0,
                MemoryOperationType::Read,
            ),
            breakpoint_id: None,
            dma_channel: None,
            dma: None,
        });
    }

    /// The frame that just ended becomes the previous frame.
    pub(crate) fn start_frame(&mut self) {
        self.previous = mem::take(&mut self.current);
    }

    pub(crate) fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
        self.snapshot.clear();
    }

    /// Freezes the events the viewer will query. With
    /// [`EventFilter::PREVIOUS_FRAME`], the part of the previous frame the
    /// raster has not reached yet is included.
    pub(crate) fn take_snapshot(&mut self, options: &EventViewerOptions, position: (u16, u16)) {
        self.snapshot = self.current.clone();
        if options.filter.contains(EventFilter::PREVIOUS_FRAME) {
            self.snapshot.extend(
                self.previous
                    .iter()
                    .filter(|event| (event.scanline, event.cycle) > position)
                    .cloned(),
            );
        }
    }

    /// Nearest snapshot event passing `options`, within the search radius.
    pub(crate) fn event_at(
        &self,
        scanline: u16,
        cycle: u16,
        options: &EventViewerOptions,
    ) -> Option<DebugEventInfo> {
        self.snapshot
            .iter()
            .filter(|event| options.accepts(event))
            .filter_map(|event| {
                let dy = event.scanline.abs_diff(scanline);
                let dx = event.cycle.abs_diff(cycle);
                (dy <= SEARCH_RADIUS && dx <= SEARCH_RADIUS).then_some((dx + dy, event))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, event)| event.clone())
    }

    pub(crate) fn render(&self, options: &EventViewerOptions, region: Region) -> EventViewerFrame {
        let width = CYCLES_PER_SCANLINE;
        let height = region.scanlines_per_frame();
        let mut pixels = vec![0; (width * height) as usize];
        for event in self.snapshot.iter().filter(|event| options.accepts(event)) {
            let (x, y) = (u32::from(event.cycle), u32::from(event.scanline));
            if x < width && y < height {
                pixels[(y * width + x) as usize] = options.color_for(event);
            }
        }
        EventViewerFrame {
            width,
            height,
            pixels,
        }
    }
}

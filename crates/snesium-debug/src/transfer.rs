//! Decoding of captured events into inspection text.
//!
//! Transfer-size and source-address share a role depending on the HDMA mode:
//! indirect HDMA reads through the address held in the size register, plain
//! DMA and direct HDMA read from the source address. The two are never
//! interchangeable.

use core::fmt;

use crate::{
    breakpoint::store::BreakpointStore,
    dma::{DebugEventInfo, DebugEventType, DmaChannelInfo},
    memory::{AddressInfo, MemoryOperationInfo, MemorySpace},
};

/// Symbolic names for addresses, supplied by the front end.
pub trait LabelProvider {
    fn label(&self, address: AddressInfo) -> Option<String>;
}

impl<F> LabelProvider for F
where
    F: Fn(AddressInfo) -> Option<String>,
{
    fn label(&self, address: AddressInfo) -> Option<String> {
        self(address)
    }
}

/// Direction and origin of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAccess {
    pub address: u32,
    pub value: u8,
    pub is_write: bool,
    /// Performed by a DMA channel rather than an instruction.
    pub is_dma: bool,
}

impl RegisterAccess {
    pub fn decode(op: &MemoryOperationInfo) -> Self {
        Self {
            address: op.address,
            value: op.value,
            is_write: op.kind.is_write(),
            is_dma: op.kind.is_dma(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdmaMode {
    /// General-purpose DMA.
    None,
    Direct,
    Indirect,
}

/// Structured description of a DMA-driven access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescription {
    pub channel: u8,
    pub hdma: HdmaMode,
    pub transfer_mode: u8,
    /// Effective A-bus address, bank included.
    pub a_bus_address: u32,
    /// B-bus register offset from $2100.
    pub b_bus_address: u8,
    /// B-bus to A-bus when set.
    pub inverted: bool,
    /// Only meaningful for HDMA.
    pub line_counter: Option<u8>,
}

impl TransferDescription {
    pub fn decode(channel: u8, info: &DmaChannelInfo) -> Self {
        let hdma = match (info.interrupted_by_hdma, info.hdma_indirect_addressing) {
            (false, _) => HdmaMode::None,
            (true, false) => HdmaMode::Direct,
            (true, true) => HdmaMode::Indirect,
        };
        Self {
            channel,
            hdma,
            transfer_mode: info.transfer_mode,
            a_bus_address: effective_a_bus_address(info),
            b_bus_address: info.dest_address,
            inverted: info.invert_direction,
            line_counter: (hdma != HdmaMode::None).then_some(info.hdma_line_counter_and_repeat),
        }
    }

    fn channel_text(&self) -> String {
        match self.hdma {
            HdmaMode::None => self.channel.to_string(),
            HdmaMode::Direct => format!("{} (HDMA)", self.channel),
            HdmaMode::Indirect => format!("{} (Indirect HDMA)", self.channel),
        }
    }
}

impl fmt::Display for TransferDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.inverted { "<-" } else { "->" };
        write!(f, "${:04X} {arrow} ${:02X}", self.a_bus_address, self.b_bus_address)
    }
}

/// A-bus address a channel reads or writes.
pub fn effective_a_bus_address(info: &DmaChannelInfo) -> u32 {
    let bank = u32::from(info.src_bank) << 16;
    if info.interrupted_by_hdma && info.hdma_indirect_addressing {
        bank | u32::from(info.transfer_size)
    } else {
        bank | u32::from(info.src_address)
    }
}

/// Ordered `(label, value)` pairs describing one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    entries: Vec<(&'static str, String)>,
    pub transfer: Option<TransferDescription>,
}

impl EventDetails {
    fn push(&mut self, key: &'static str, value: impl Into<String>) {
        self.entries.push((key, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }
}

impl fmt::Display for EventDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

/// Turns captured events into [`EventDetails`].
#[derive(Default)]
pub struct TransferDecoder<'a> {
    labels: Option<&'a dyn LabelProvider>,
    breakpoints: Option<&'a BreakpointStore>,
}

impl<'a> TransferDecoder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(mut self, labels: &'a dyn LabelProvider) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Resolves breakpoint ids of breakpoint events.
    pub fn with_breakpoints(mut self, store: &'a BreakpointStore) -> Self {
        self.breakpoints = Some(store);
        self
    }

    pub fn describe(&self, event: &DebugEventInfo) -> EventDetails {
        let mut details = EventDetails::default();
        details.push("Type", event.event_type.to_string());
        details.push("Scanline", event.scanline.to_string());
        details.push("Cycle", event.cycle.to_string());
        details.push("PC", format!("${:06X}", event.program_counter));

        match event.event_type {
            DebugEventType::Register => self.describe_register(event, &mut details),
            DebugEventType::Breakpoint => self.describe_breakpoint(event, &mut details),
            DebugEventType::Irq | DebugEventType::Nmi => {}
        }
        details
    }

    fn describe_register(&self, event: &DebugEventInfo, details: &mut EventDetails) {
        let access = RegisterAccess::decode(&event.operation);

        let mut register = format!("${:04X}", access.address);
        let label = self.labels.and_then(|labels| {
            i32::try_from(access.address)
                .ok()
                .and_then(|address| labels.label(AddressInfo::new(address, MemorySpace::CpuMemory)))
        });
        if let Some(label) = label {
            register = format!("{label} ({register})");
        }
        register.push_str(if access.is_write { " (Write)" } else { " (Read)" });
        if access.is_dma {
            register.push_str(" (DMA)");
        }
        details.push("Register", register);
        details.push("Value", format!("${:02X}", access.value));

        if !access.is_dma {
            return;
        }
        let (Some(channel), Some(info)) = (event.dma_channel, event.dma.as_ref()) else {
            return;
        };
        let transfer = TransferDescription::decode(channel, info);
        details.push("Channel", transfer.channel_text());
        if let Some(counter) = transfer.line_counter {
            details.push("Line Counter", format!("${counter:02X}"));
        }
        details.push("Mode", transfer.transfer_mode.to_string());
        details.push("Transfer", transfer.to_string());
        details.transfer = Some(transfer);
    }

    fn describe_breakpoint(&self, event: &DebugEventInfo, details: &mut EventDetails) {
        let Some(bp) = self
            .breakpoints
            .zip(event.breakpoint_id)
            .and_then(|(store, id)| store.by_id(id))
        else {
            return;
        };
        details.push("BP Type", bp.readable_type());
        details.push("BP Addresses", bp.address_string());
        if let Some(condition) = &bp.condition {
            details.push("BP Condition", condition.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        breakpoint::{BreakOn, Breakpoint},
        context::ProcessorContext,
        memory::MemoryOperationType,
    };

    fn dma_event(kind: MemoryOperationType, info: DmaChannelInfo) -> DebugEventInfo {
        DebugEventInfo {
            scanline: 12,
            cycle: 40,
            program_counter: 0x80_8123,
            event_type: DebugEventType::Register,
            operation: MemoryOperationInfo::new(MemorySpace::CpuMemory, 0x2118, 0x5A, kind),
            breakpoint_id: None,
            dma_channel: Some(3),
            dma: Some(info),
        }
    }

    fn hdma_channel(indirect: bool) -> DmaChannelInfo {
        DmaChannelInfo {
            src_bank: 0x7E,
            src_address: 0x1234,
            transfer_size: 0x0010,
            dest_address: 0x18,
            interrupted_by_hdma: true,
            hdma_indirect_addressing: indirect,
            hdma_line_counter_and_repeat: 0x81,
            transfer_mode: 1,
            ..DmaChannelInfo::default()
        }
    }

    #[test]
    fn indirect_hdma_reads_through_the_size_register() {
        assert_eq!(effective_a_bus_address(&hdma_channel(true)), 0x7E_0010);
        assert_eq!(effective_a_bus_address(&hdma_channel(false)), 0x7E_1234);
    }

    #[test]
    fn indirect_flag_without_hdma_uses_the_source_address() {
        let info = DmaChannelInfo {
            interrupted_by_hdma: false,
            ..hdma_channel(true)
        };
        assert_eq!(effective_a_bus_address(&info), 0x7E_1234);
        assert_eq!(TransferDescription::decode(0, &info).line_counter, None);
    }

    #[test]
    fn describes_indirect_hdma_write_in_order() {
        let details = TransferDecoder::new()
            .describe(&dma_event(MemoryOperationType::DmaWrite, hdma_channel(true)));

        let keys: Vec<_> = details.keys().collect();
        assert_eq!(
            keys,
            [
                "Type",
                "Scanline",
                "Cycle",
                "PC",
                "Register",
                "Value",
                "Channel",
                "Line Counter",
                "Mode",
                "Transfer"
            ]
        );
        assert_eq!(details.get("PC"), Some("$808123"));
        assert_eq!(details.get("Register"), Some("$2118 (Write) (DMA)"));
        assert_eq!(details.get("Value"), Some("$5A"));
        assert_eq!(details.get("Channel"), Some("3 (Indirect HDMA)"));
        assert_eq!(details.get("Line Counter"), Some("$81"));
        assert_eq!(details.get("Transfer"), Some("$7E0010 -> $18"));
    }

    #[test]
    fn inverted_transfer_points_back_to_the_a_bus() {
        let info = DmaChannelInfo {
            invert_direction: true,
            interrupted_by_hdma: false,
            ..hdma_channel(false)
        };
        let details = TransferDecoder::new().describe(&dma_event(MemoryOperationType::DmaRead, info));
        assert_eq!(details.get("Register"), Some("$2118 (Read) (DMA)"));
        assert_eq!(details.get("Channel"), Some("3"));
        assert_eq!(details.get("Line Counter"), None);
        assert_eq!(details.get("Transfer"), Some("$7E1234 <- $18"));
    }

    #[test]
    fn cpu_register_access_uses_labels() {
        let labels = |address: AddressInfo| (address.address == 0x2100).then(|| "INIDISP".to_string());
        let event = DebugEventInfo {
            operation: MemoryOperationInfo::new(MemorySpace::CpuMemory, 0x2100, 0x0F, MemoryOperationType::Write),
            dma_channel: None,
            dma: None,
            ..dma_event(MemoryOperationType::Write, DmaChannelInfo::default())
        };
        let details = TransferDecoder::new().with_labels(&labels).describe(&event);
        assert_eq!(details.get("Register"), Some("INIDISP ($2100) (Write)"));
        assert!(details.transfer.is_none());
        assert_eq!(details.get("Channel"), None);
    }

    #[test]
    fn breakpoint_events_resolve_through_the_store() {
        let mut store = BreakpointStore::new();
        store.add(
            Breakpoint::range(ProcessorContext::Cpu, MemorySpace::WorkRam, 0x100, 0x1FF)
                .with_break_on(BreakOn::WRITE)
                .with_condition("A == 0"),
        );
        let mut event = dma_event(MemoryOperationType::Write, DmaChannelInfo::default());
        event.event_type = DebugEventType::Breakpoint;
        event.breakpoint_id = Some(0);

        let details = TransferDecoder::new().with_breakpoints(&store).describe(&event);
        assert_eq!(details.get("Type"), Some("Breakpoint"));
        assert_eq!(details.get("BP Type"), Some("WRAM:-W-"));
        assert_eq!(details.get("BP Addresses"), Some("$0100 - $01FF"));
        assert_eq!(details.get("BP Condition"), Some("A == 0"));

        event.breakpoint_id = Some(7);
        let details = TransferDecoder::new().with_breakpoints(&store).describe(&event);
        assert_eq!(details.get("BP Type"), None);
    }
}

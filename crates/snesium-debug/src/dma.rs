//! Captured bus events and the DMA channel state attached to them.

use core::fmt;

use crate::memory::MemoryOperationInfo;

/// Number of register bytes per channel in the $43x0-$43xA block.
pub const DMA_CHANNEL_REGISTERS: usize = 11;

/// Snapshot of one DMA channel at the time of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaChannelInfo {
    /// B-bus write pattern, 0-7.
    pub transfer_mode: u8,
    pub src_bank: u8,
    pub src_address: u16,
    /// B-bus register offset from $2100.
    pub dest_address: u8,
    /// Byte count for DMA; the indirect address for indirect HDMA.
    pub transfer_size: u16,
    /// B-bus to A-bus when set.
    pub invert_direction: bool,
    pub decrement: bool,
    pub fixed_transfer: bool,
    /// The access was performed by HDMA rather than general-purpose DMA.
    pub interrupted_by_hdma: bool,
    pub hdma_indirect_addressing: bool,
    pub hdma_bank: u8,
    pub hdma_table_address: u16,
    pub hdma_line_counter_and_repeat: u8,
}

impl DmaChannelInfo {
    /// Decodes a channel's register block ($43x0 through $43xA).
    ///
    /// `interrupted_by_hdma` is runtime state and does not live in the
    /// registers.
    pub fn from_registers(regs: &[u8; DMA_CHANNEL_REGISTERS], interrupted_by_hdma: bool) -> Self {
        let word = |lo: usize| u16::from_le_bytes([regs[lo], regs[lo + 1]]);
        let dmap = regs[0];
        Self {
            transfer_mode: dmap & 0x07,
            fixed_transfer: dmap & 0x08 != 0,
            decrement: dmap & 0x10 != 0,
            hdma_indirect_addressing: dmap & 0x40 != 0,
            invert_direction: dmap & 0x80 != 0,
            dest_address: regs[1],
            src_address: word(2),
            src_bank: regs[4],
            transfer_size: word(5),
            hdma_bank: regs[7],
            hdma_table_address: word(8),
            hdma_line_counter_and_repeat: regs[10],
            interrupted_by_hdma,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugEventType {
    Register,
    Breakpoint,
    Irq,
    Nmi,
}

impl fmt::Display for DebugEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Register => "Register",
            Self::Breakpoint => "Breakpoint",
            Self::Irq => "IRQ",
            Self::Nmi => "NMI",
        };
        f.write_str(s)
    }
}

/// One event captured for the event viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEventInfo {
    pub scanline: u16,
    pub cycle: u16,
    pub program_counter: u32,
    pub event_type: DebugEventType,
    pub operation: MemoryOperationInfo,
    /// Positional id of the breakpoint, for breakpoint events.
    pub breakpoint_id: Option<usize>,
    /// Channel number, for DMA-driven accesses.
    pub dma_channel: Option<u8>,
    pub dma: Option<DmaChannelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_channel_registers() {
        let regs = [0xC1, 0x18, 0x34, 0x12, 0x7E, 0x10, 0x00, 0x7F, 0x00, 0x90, 0x85];
        let info = DmaChannelInfo::from_registers(&regs, true);
        assert_eq!(info.transfer_mode, 1);
        assert!(info.invert_direction);
        assert!(info.hdma_indirect_addressing);
        assert!(!info.fixed_transfer);
        assert!(!info.decrement);
        assert_eq!(info.dest_address, 0x18);
        assert_eq!(info.src_address, 0x1234);
        assert_eq!(info.src_bank, 0x7E);
        assert_eq!(info.transfer_size, 0x0010);
        assert_eq!(info.hdma_bank, 0x7F);
        assert_eq!(info.hdma_table_address, 0x9000);
        assert_eq!(info.hdma_line_counter_and_repeat, 0x85);
        assert!(info.interrupted_by_hdma);
    }
}

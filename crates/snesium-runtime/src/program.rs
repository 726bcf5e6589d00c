//! Pre-decoded instruction traces replayed by the runtime.
//!
//! A [`Program`] stands in for a cartridge: one [`Trace`] per processor
//! context, each a looping list of [`Instruction`]s with the bus operations
//! they perform. The runtime never decodes opcodes; it only replays what the
//! trace says happened.

use std::collections::BTreeMap;

use snesium_debug::{
    CoprocessorType, MemoryOperationInfo, MemoryOperationType, MemorySpace, ProcessorContext,
    dma::DMA_CHANNEL_REGISTERS,
};

/// Raster cycles an instruction takes when none is given.
pub const DEFAULT_INSTRUCTION_CYCLES: u32 = 4;

/// Call-stack effect of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Next,
    Call,
    Return,
}

/// Engine-detected condition raised when the instruction is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Brk,
    Cop,
    Wdm,
    Stp,
    GsuInvalidOpCode,
    Crash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Nmi,
    Irq,
}

/// DMA channel state attached to a DMA-driven operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaTag {
    pub channel: u8,
    /// $43x0-$43xA at the time of the transfer.
    pub registers: [u8; DMA_CHANNEL_REGISTERS],
    pub hdma: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedOp {
    pub operation: MemoryOperationInfo,
    pub dma: Option<DmaTag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address in the owning context's memory space.
    pub address: u32,
    pub opcode: u8,
    pub cycles: u32,
    pub ops: Vec<ScriptedOp>,
    pub flow: Flow,
    pub trap: Option<Trap>,
    /// The instruction is the first of an interrupt handler.
    pub interrupt: Option<Interrupt>,
}

impl Instruction {
    pub fn new(address: u32, opcode: u8) -> Self {
        Self {
            address,
            opcode,
            cycles: DEFAULT_INSTRUCTION_CYCLES,
            ops: Vec::new(),
            flow: Flow::Next,
            trap: None,
            interrupt: None,
        }
    }

    /// Raster cycles consumed; at least one.
    pub fn cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles.max(1);
        self
    }

    pub fn op(mut self, space: MemorySpace, address: u32, value: u8, kind: MemoryOperationType) -> Self {
        self.ops.push(ScriptedOp {
            operation: MemoryOperationInfo::new(space, address, value, kind),
            dma: None,
        });
        self
    }

    pub fn read(self, space: MemorySpace, address: u32, value: u8) -> Self {
        self.op(space, address, value, MemoryOperationType::Read)
    }

    pub fn write(self, space: MemorySpace, address: u32, value: u8) -> Self {
        self.op(space, address, value, MemoryOperationType::Write)
    }

    /// A DMA write to the B-bus register `address`.
    pub fn dma_write(mut self, address: u32, value: u8, tag: DmaTag) -> Self {
        self.ops.push(ScriptedOp {
            operation: MemoryOperationInfo::new(
                MemorySpace::CpuMemory,
                address,
                value,
                MemoryOperationType::DmaWrite,
            ),
            dma: Some(tag),
        });
        self
    }

    pub fn call(mut self) -> Self {
        self.flow = Flow::Call;
        self
    }

    pub fn ret(mut self) -> Self {
        self.flow = Flow::Return;
        self
    }

    pub fn trap(mut self, trap: Trap) -> Self {
        self.trap = Some(trap);
        self
    }

    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

/// Looping instruction list for one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub context: ProcessorContext,
    pub instructions: Vec<Instruction>,
    /// Index execution continues at after the last instruction.
    pub loop_to: usize,
}

impl Trace {
    pub fn new(context: ProcessorContext) -> Self {
        Self {
            context,
            instructions: Vec::new(),
            loop_to: 0,
        }
    }

    pub fn push(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Marks the next pushed instruction as the loop target.
    pub fn loop_here(mut self) -> Self {
        self.loop_to = self.instructions.len();
        self
    }

    pub(crate) fn next_index(&self, index: usize) -> usize {
        if index + 1 < self.instructions.len() {
            index + 1
        } else {
            self.loop_to.min(self.instructions.len().saturating_sub(1))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub coprocessor: CoprocessorType,
    pub traces: Vec<Trace>,
    /// Initial memory contents.
    pub memory: BTreeMap<(MemorySpace, u32), u8>,
}

impl Program {
    pub fn new(coprocessor: CoprocessorType) -> Self {
        Self {
            coprocessor,
            ..Self::default()
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.traces.push(trace);
        self
    }

    pub fn poke(mut self, space: MemorySpace, address: u32, value: u8) -> Self {
        self.memory.insert((space, address), value);
        self
    }

    /// Writes a little-endian word.
    pub fn poke_word(self, space: MemorySpace, address: u32, value: u16) -> Self {
        let [lo, hi] = value.to_le_bytes();
        self.poke(space, address, lo).poke(space, address + 1, hi)
    }

    pub fn is_runnable(&self) -> bool {
        self.traces.iter().any(|t| !t.instructions.is_empty())
    }

    /// A small main-CPU/SPC program: a main loop that calls a VRAM upload
    /// routine using HDMA, next to an SPC idle loop.
    pub fn demo() -> Self {
        let hdma = DmaTag {
            channel: 3,
            registers: [0x41, 0x18, 0x34, 0x12, 0x7E, 0x10, 0x00, 0x7E, 0x00, 0x90, 0x81],
            hdma: true,
        };

        let cpu = Trace::new(ProcessorContext::Cpu)
            .push(Instruction::new(0x80_8000, 0x78).cycles(2))
            .push(
                Instruction::new(0x80_8001, 0x8D)
                    .write(MemorySpace::CpuMemory, 0x2100, 0x8F)
                    .cycles(4),
            )
            .loop_here()
            .push(
                Instruction::new(0x80_8004, 0xAD)
                    .read(MemorySpace::WorkRam, 0x0010, 0x00)
                    .cycles(4),
            )
            .push(Instruction::new(0x80_8007, 0x20).call().cycles(6))
            .push(
                Instruction::new(0x80_9000, 0x8D)
                    .write(MemorySpace::CpuMemory, 0x2115, 0x80)
                    .cycles(4),
            )
            .push(
                Instruction::new(0x80_9003, 0x8D)
                    .dma_write(0x2118, 0x5A, hdma)
                    .dma_write(0x2118, 0xA5, hdma)
                    .cycles(16),
            )
            .push(Instruction::new(0x80_9006, 0x60).ret().cycles(6))
            .push(
                Instruction::new(0x80_800A, 0xEE)
                    .read(MemorySpace::WorkRam, 0x0010, 0x00)
                    .write(MemorySpace::WorkRam, 0x0010, 0x01)
                    .cycles(6),
            )
            .push(Instruction::new(0x80_800D, 0x4C).cycles(3));

        let spc = Trace::new(ProcessorContext::Spc)
            .push(Instruction::new(0xFFC0, 0xCD).cycles(2))
            .loop_here()
            .push(
                Instruction::new(0xFFC2, 0xE4)
                    .read(MemorySpace::SpcMemory, 0x00F4, 0xAA)
                    .cycles(3),
            )
            .push(Instruction::new(0xFFC4, 0xD0).cycles(4));

        Program::new(CoprocessorType::None)
            .with_trace(cpu)
            .with_trace(spc)
            .poke_word(MemorySpace::CpuMemory, 0xFFFC, 0x8000)
            .poke_word(MemorySpace::CpuMemory, 0xFFEA, 0x8100)
            .poke_word(MemorySpace::CpuMemory, 0xFFEE, 0x8200)
            .poke_word(MemorySpace::CpuMemory, 0xFFE6, 0x8300)
            .poke_word(MemorySpace::CpuMemory, 0xFFE4, 0x8400)
            .poke_word(MemorySpace::SpcMemory, 0xFFFE, 0xFFC0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traces_loop_to_their_marker() {
        let trace = Trace::new(ProcessorContext::Spc)
            .push(Instruction::new(0, 0))
            .loop_here()
            .push(Instruction::new(1, 0))
            .push(Instruction::new(2, 0));
        assert_eq!(trace.next_index(0), 1);
        assert_eq!(trace.next_index(1), 2);
        assert_eq!(trace.next_index(2), 1);
    }

    #[test]
    fn demo_addresses_are_unique_per_trace() {
        for trace in Program::demo().traces {
            let mut addresses: Vec<u32> = trace.instructions.iter().map(|i| i.address).collect();
            let len = addresses.len();
            addresses.sort_unstable();
            addresses.dedup();
            assert_eq!(addresses.len(), len);
        }
    }
}

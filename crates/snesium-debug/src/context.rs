//! Processor contexts and the per-context profile table.
//!
//! Everything that differs between processors (which memory space a view
//! shows, how wide its addresses are, where its vectors live, how to read its
//! program counter) is a row in [`PROFILES`]. Adding a context means adding a
//! row, not touching call sites.

use core::fmt;

use crate::{
    engine::{CoprocessorType, DebuggerFlags, StepKind},
    memory::MemorySpace,
    state::DebugState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessorContext {
    Cpu,
    Spc,
    Sa1,
    Gsu,
    NecDsp,
    Cx4,
}

impl ProcessorContext {
    pub const ALL: [ProcessorContext; 6] = [
        Self::Cpu,
        Self::Spc,
        Self::Sa1,
        Self::Gsu,
        Self::NecDsp,
        Self::Cx4,
    ];

    /// The profile for this context, or `None` when no debugger view can be
    /// bound to it.
    pub fn profile(self) -> Option<&'static ContextProfile> {
        PROFILES.iter().find(|p| p.context == self)
    }
}

impl fmt::Display for ProcessorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpu => "CPU",
            Self::Spc => "SPC",
            Self::Sa1 => "SA-1",
            Self::Gsu => "GSU",
            Self::NecDsp => "DSP",
            Self::Cx4 => "CX4",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuVector {
    Reset,
    Nmi,
    Irq,
    Brk,
    Cop,
}

impl CpuVector {
    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "Reset",
            Self::Nmi => "NMI",
            Self::Irq => "IRQ",
            Self::Brk => "BRK",
            Self::Cop => "COP",
        }
    }
}

impl fmt::Display for CpuVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Location of one interrupt vector in the context's own address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorEntry {
    pub vector: CpuVector,
    pub address: u32,
}

/// Native-mode 65816 vectors, shared by the CPU and the SA-1.
const W65C816_VECTORS: &[VectorEntry] = &[
    VectorEntry { vector: CpuVector::Reset, address: 0xFFFC },
    VectorEntry { vector: CpuVector::Nmi, address: 0xFFEA },
    VectorEntry { vector: CpuVector::Irq, address: 0xFFEE },
    VectorEntry { vector: CpuVector::Brk, address: 0xFFE6 },
    VectorEntry { vector: CpuVector::Cop, address: 0xFFE4 },
];

const SPC700_VECTORS: &[VectorEntry] = &[VectorEntry {
    vector: CpuVector::Reset,
    address: 0xFFFE,
}];

const ALL_STEPS: &[StepKind] = &[StepKind::SingleStep, StepKind::StepOver, StepKind::StepOut];

pub struct ContextProfile {
    pub context: ProcessorContext,
    /// Window title of a debugger view bound to this context.
    pub title: &'static str,
    /// Space addresses shown in the view refer to.
    pub memory_space: MemorySpace,
    /// Width of a formatted address, in bits.
    pub address_width: u8,
    pub vectors: &'static [VectorEntry],
    /// Instruction-granular steps the context supports.
    pub steps: &'static [StepKind],
    /// Engine instrumentation switched on while a view is open.
    pub enabled_flag: DebuggerFlags,
    /// The view only makes sense when this coprocessor is fitted.
    pub required_coprocessor: Option<CoprocessorType>,
    pub has_callstack: bool,
    active_address: fn(&DebugState) -> u32,
}

impl fmt::Debug for ContextProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextProfile")
            .field("context", &self.context)
            .field("memory_space", &self.memory_space)
            .field("address_width", &self.address_width)
            .finish_non_exhaustive()
    }
}

impl ContextProfile {
    /// Address of the next instruction, in the profile's memory space.
    pub fn active_address(&self, state: &DebugState) -> u32 {
        (self.active_address)(state)
    }

    /// Raster steps are processor independent and always allowed.
    pub fn supports(&self, kind: StepKind) -> bool {
        !kind.is_instruction_step() || self.steps.contains(&kind)
    }

    /// Formats `address` with as many hex digits as the address width needs.
    pub fn format_address(&self, address: u32) -> String {
        let digits = usize::from(self.address_width.div_ceil(4));
        format!("${address:0digits$X}")
    }

    pub fn vector(&self, vector: CpuVector) -> Option<&'static VectorEntry> {
        self.vectors.iter().find(|v| v.vector == vector)
    }
}

pub static PROFILES: [ContextProfile; 4] = [
    ContextProfile {
        context: ProcessorContext::Cpu,
        title: "Debugger",
        memory_space: MemorySpace::CpuMemory,
        address_width: 24,
        vectors: W65C816_VECTORS,
        steps: ALL_STEPS,
        enabled_flag: DebuggerFlags::CPU_DEBUGGER_ENABLED,
        required_coprocessor: None,
        has_callstack: true,
        active_address: |s| (u32::from(s.cpu.k) << 16) | u32::from(s.cpu.pc),
    },
    ContextProfile {
        context: ProcessorContext::Spc,
        title: "SPC Debugger",
        memory_space: MemorySpace::SpcMemory,
        address_width: 16,
        vectors: SPC700_VECTORS,
        steps: ALL_STEPS,
        enabled_flag: DebuggerFlags::SPC_DEBUGGER_ENABLED,
        required_coprocessor: None,
        has_callstack: true,
        active_address: |s| u32::from(s.spc.pc),
    },
    ContextProfile {
        context: ProcessorContext::Sa1,
        title: "SA-1 Debugger",
        memory_space: MemorySpace::Sa1Memory,
        address_width: 24,
        vectors: W65C816_VECTORS,
        steps: ALL_STEPS,
        enabled_flag: DebuggerFlags::SA1_DEBUGGER_ENABLED,
        required_coprocessor: Some(CoprocessorType::Sa1),
        has_callstack: true,
        active_address: |s| (u32::from(s.sa1.k) << 16) | u32::from(s.sa1.pc),
    },
    ContextProfile {
        context: ProcessorContext::Gsu,
        title: "GSU Debugger",
        memory_space: MemorySpace::GsuMemory,
        address_width: 24,
        vectors: &[],
        steps: &[StepKind::SingleStep],
        enabled_flag: DebuggerFlags::GSU_DEBUGGER_ENABLED,
        required_coprocessor: Some(CoprocessorType::Gsu),
        has_callstack: false,
        active_address: |s| (u32::from(s.gsu.program_bank) << 16) | u32::from(s.gsu.r[15]),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CpuState, GsuState, SpcState};

    #[test]
    fn only_debuggable_contexts_have_profiles() {
        for ctx in ProcessorContext::ALL {
            let expected = !matches!(ctx, ProcessorContext::NecDsp | ProcessorContext::Cx4);
            assert_eq!(ctx.profile().is_some(), expected, "{ctx}");
        }
    }

    #[test]
    fn active_address_reads_each_context_program_counter() {
        let mut gsu = GsuState::default();
        gsu.r[15] = 0x8123;
        gsu.program_bank = 0x01;
        let state = DebugState {
            cpu: CpuState { k: 0x80, pc: 0x8000, ..CpuState::default() },
            spc: SpcState { pc: 0xFFC0, ..SpcState::default() },
            sa1: CpuState { k: 0x00, pc: 0x1234, ..CpuState::default() },
            gsu,
            ..DebugState::default()
        };
        let addr = |ctx: ProcessorContext| ctx.profile().map(|p| p.active_address(&state));
        assert_eq!(addr(ProcessorContext::Cpu), Some(0x80_8000));
        assert_eq!(addr(ProcessorContext::Spc), Some(0xFFC0));
        assert_eq!(addr(ProcessorContext::Sa1), Some(0x1234));
        assert_eq!(addr(ProcessorContext::Gsu), Some(0x01_8123));
    }

    #[test]
    fn gsu_cannot_step_over_or_out() {
        let gsu = ProcessorContext::Gsu.profile().expect("gsu profile");
        assert!(gsu.supports(StepKind::SingleStep));
        assert!(gsu.supports(StepKind::PpuStep));
        assert!(!gsu.supports(StepKind::StepOver));
        assert!(!gsu.supports(StepKind::StepOut));
    }

    #[test]
    fn addresses_are_padded_to_the_profile_width() {
        let cpu = ProcessorContext::Cpu.profile().expect("cpu profile");
        let spc = ProcessorContext::Spc.profile().expect("spc profile");
        assert_eq!(cpu.format_address(0x8000), "$008000");
        assert_eq!(spc.format_address(0xFFC0), "$FFC0");
        assert_eq!(spc.vector(CpuVector::Reset).map(|v| v.address), Some(0xFFFE));
        assert!(spc.vector(CpuVector::Nmi).is_none());
    }
}

use core::fmt;

use crate::memory::MemoryOperationInfo;

/// Why execution halted.
///
/// Variants are declared in severity order; everything ranked above
/// [`BreakSource::PpuStep`] is an engine-detected condition rather than a
/// user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BreakSource {
    Breakpoint,
    CpuStep,
    PpuStep,
    BreakOnBrk,
    BreakOnCop,
    BreakOnWdm,
    BreakOnStp,
    BreakOnUninitMemoryRead,
    GsuInvalidOpCode,
    GsuInvalidRamAccess,
    CpuCrash,
}

impl BreakSource {
    /// Sources that always concern every open view.
    pub fn outranks_steps(self) -> bool {
        self > Self::PpuStep
    }
}

impl fmt::Display for BreakSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Breakpoint => "Breakpoint",
            Self::CpuStep => "CPU Step",
            Self::PpuStep => "PPU Step",
            Self::BreakOnBrk => "BRK",
            Self::BreakOnCop => "COP",
            Self::BreakOnWdm => "WDM",
            Self::BreakOnStp => "STP",
            Self::BreakOnUninitMemoryRead => "Uninitialized memory read",
            Self::GsuInvalidOpCode => "GSU invalid opcode",
            Self::GsuInvalidRamAccess => "GSU invalid RAM access",
            Self::CpuCrash => "CPU crashed",
        };
        f.write_str(s)
    }
}

/// Payload of a `CodeBreak` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakEvent {
    pub source: BreakSource,
    /// Engine-facing (positional) id of the breakpoint that fired.
    pub breakpoint_id: Option<usize>,
    pub operation: Option<MemoryOperationInfo>,
}

impl BreakEvent {
    pub fn step(source: BreakSource) -> Self {
        Self {
            source,
            breakpoint_id: None,
            operation: None,
        }
    }

    pub fn breakpoint(id: usize, operation: MemoryOperationInfo) -> Self {
        Self {
            source: BreakSource::Breakpoint,
            breakpoint_id: Some(id),
            operation: Some(operation),
        }
    }
}

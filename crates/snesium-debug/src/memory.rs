use core::fmt;

/// Addressable region a numeric address refers to.
///
/// The first four variants are the buses as seen by each processor (relative
/// addresses); the rest are absolute offsets into a physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemorySpace {
    CpuMemory,
    SpcMemory,
    Sa1Memory,
    GsuMemory,
    PrgRom,
    WorkRam,
    SaveRam,
    SpcRam,
    SpcRom,
    VideoRam,
    SpriteRam,
    CgRam,
    Register,
    DspProgramRom,
}

impl MemorySpace {
    /// Read-only program storage. Breakpoints toggled here only break on
    /// execution since the program can neither read-trap nor write it usefully.
    pub fn is_program_rom(self) -> bool {
        matches!(self, Self::PrgRom)
    }

    /// Whether the space is a processor's view of its bus rather than a
    /// physical memory.
    pub fn is_relative(self) -> bool {
        matches!(
            self,
            Self::CpuMemory | Self::SpcMemory | Self::Sa1Memory | Self::GsuMemory
        )
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::CpuMemory => "CPU",
            Self::SpcMemory => "SPC",
            Self::Sa1Memory => "SA1",
            Self::GsuMemory => "GSU",
            Self::PrgRom => "PRG",
            Self::WorkRam => "WRAM",
            Self::SaveRam => "SRAM",
            Self::SpcRam => "SPCRAM",
            Self::SpcRom => "SPCROM",
            Self::VideoRam => "VRAM",
            Self::SpriteRam => "OAM",
            Self::CgRam => "CGRAM",
            Self::Register => "REG",
            Self::DspProgramRom => "DSPROM",
        }
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CpuMemory => "CPU Memory",
            Self::SpcMemory => "SPC Memory",
            Self::Sa1Memory => "SA-1 Memory",
            Self::GsuMemory => "GSU Memory",
            Self::PrgRom => "PRG ROM",
            Self::WorkRam => "Work RAM",
            Self::SaveRam => "Save RAM",
            Self::SpcRam => "SPC RAM",
            Self::SpcRom => "SPC ROM",
            Self::VideoRam => "Video RAM",
            Self::SpriteRam => "Sprite RAM",
            Self::CgRam => "CG RAM",
            Self::Register => "Register",
            Self::DspProgramRom => "DSP Program ROM",
        };
        f.write_str(s)
    }
}

/// A numeric address tagged with the space it belongs to.
///
/// A negative address means the location has no mapping in `space` (for
/// example a relative address that maps to open bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressInfo {
    pub address: i32,
    pub space: MemorySpace,
}

impl AddressInfo {
    pub const fn new(address: i32, space: MemorySpace) -> Self {
        Self { address, space }
    }

    pub fn is_mapped(&self) -> bool {
        self.address >= 0
    }

    /// The address as an unsigned value, or `None` when unmapped.
    pub fn mapped_address(&self) -> Option<u32> {
        u32::try_from(self.address).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOperationType {
    Read,
    Write,
    ExecOpCode,
    ExecOperand,
    DmaRead,
    DmaWrite,
}

impl MemoryOperationType {
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::DmaWrite)
    }

    pub fn is_read(self) -> bool {
        matches!(self, Self::Read | Self::DmaRead)
    }

    pub fn is_dma(self) -> bool {
        matches!(self, Self::DmaRead | Self::DmaWrite)
    }

    pub fn is_exec(self) -> bool {
        matches!(self, Self::ExecOpCode | Self::ExecOperand)
    }
}

impl fmt::Display for MemoryOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::ExecOpCode => "Exec",
            Self::ExecOperand => "Exec operand",
            Self::DmaRead => "DMA Read",
            Self::DmaWrite => "DMA Write",
        };
        f.write_str(s)
    }
}

/// One bus access as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOperationInfo {
    pub space: MemorySpace,
    pub address: u32,
    pub value: u8,
    pub kind: MemoryOperationType,
}

impl MemoryOperationInfo {
    pub const fn new(space: MemorySpace, address: u32, value: u8, kind: MemoryOperationType) -> Self {
        Self {
            space,
            address,
            value,
            kind,
        }
    }
}

//! Register snapshots returned by [`Engine::get_state`](crate::engine::Engine::get_state).

/// 65816 register file, shared by the main CPU and the SA-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuState {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub sp: u16,
    pub d: u16,
    pub pc: u16,
    /// Program bank.
    pub k: u8,
    pub dbr: u8,
    pub ps: u8,
    pub emulation_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpcState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub psw: u8,
    pub pc: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsuState {
    /// `r[15]` is the program counter.
    pub r: [u16; 16],
    pub program_bank: u8,
    pub sfr: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PpuState {
    pub scanline: u16,
    pub cycle: u16,
    pub frame_count: u32,
}

/// Engine-wide snapshot. Coprocessor fields are zeroed when the cartridge has
/// no such chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugState {
    pub master_clock: u64,
    pub cpu: CpuState,
    pub spc: SpcState,
    pub sa1: CpuState,
    pub gsu: GsuState,
    pub ppu: PpuState,
}

//! Scripted machine: replays a [`Program`]'s traces against a raster clock.
//!
//! One master-clock tick is one raster cycle. Each trace has a due time; the
//! earliest due trace fetches next (ties go to the earlier trace) and its due
//! time moves forward by the instruction's cycle count.

use std::collections::{BTreeMap, BTreeSet};

use snesium_debug::{
    CoprocessorType, DebugState, MemorySpace, ProcessorContext, Region,
    state::{CpuState, GsuState, PpuState, SpcState},
};

use crate::program::{Flow, Instruction, Program, ScriptedOp, Trace};

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    index: usize,
    depth: u32,
    due: u64,
}

/// Raster position after one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dot {
    pub(crate) scanline: u16,
    pub(crate) cycle: u16,
    /// The raster wrapped to the top of a new frame.
    pub(crate) frame_done: bool,
}

pub(crate) struct Fetch<'a> {
    pub(crate) context: ProcessorContext,
    pub(crate) instruction: &'a Instruction,
    pub(crate) depth: u32,
}

#[derive(Debug)]
pub(crate) struct Machine {
    region: Region,
    coprocessor: Option<CoprocessorType>,
    initial_memory: BTreeMap<(MemorySpace, u32), u8>,
    traces: Vec<Trace>,
    cursors: Vec<Cursor>,
    memory: BTreeMap<(MemorySpace, u32), u8>,
    initialized: BTreeSet<(MemorySpace, u32)>,
    scanline: u16,
    cycle: u16,
    frame: u32,
    master_clock: u64,
}

impl Machine {
    pub(crate) fn new(region: Region) -> Self {
        Self {
            region,
            coprocessor: None,
            initial_memory: BTreeMap::new(),
            traces: Vec::new(),
            cursors: Vec::new(),
            memory: BTreeMap::new(),
            initialized: BTreeSet::new(),
            scanline: 0,
            cycle: 0,
            frame: 0,
            master_clock: 0,
        }
    }

    pub(crate) fn load(&mut self, program: Program) {
        self.coprocessor = Some(program.coprocessor);
        self.initial_memory = program.memory;
        self.traces = program.traces;
        self.reset();
    }

    /// Restarts every trace and restores the program's memory image.
    pub(crate) fn reset(&mut self) {
        self.cursors = vec![Cursor::default(); self.traces.len()];
        self.memory = self.initial_memory.clone();
        self.initialized = self.initial_memory.keys().copied().collect();
        self.scanline = 0;
        self.cycle = 0;
        self.frame = 0;
        self.master_clock = 0;
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.coprocessor.is_some()
    }

    pub(crate) fn set_region(&mut self, region: Region) {
        self.region = region;
        if u32::from(self.scanline) >= region.scanlines_per_frame() {
            self.scanline = 0;
        }
    }

    pub(crate) fn has_context(&self, context: ProcessorContext) -> bool {
        self.slot(context).is_some()
    }

    fn slot(&self, context: ProcessorContext) -> Option<usize> {
        self.traces
            .iter()
            .position(|t| t.context == context && !t.instructions.is_empty())
    }

    pub(crate) fn depth(&self, context: ProcessorContext) -> u32 {
        self.slot(context)
            .and_then(|slot| self.cursors.get(slot))
            .map_or(0, |cursor| cursor.depth)
    }

    pub(crate) fn master_clock(&self) -> u64 {
        self.master_clock
    }

    pub(crate) fn raster(&self) -> (u16, u16) {
        (self.scanline, self.cycle)
    }

    /// The trace that fetches next and when.
    pub(crate) fn next_slot(&self) -> Option<(usize, u64)> {
        self.cursors
            .iter()
            .enumerate()
            .filter(|(slot, _)| !self.traces[*slot].instructions.is_empty())
            .map(|(slot, cursor)| (slot, cursor.due))
            .min_by_key(|(slot, due)| (*due, *slot))
    }

    pub(crate) fn advance_dot(&mut self) -> Dot {
        self.master_clock += 1;
        self.cycle += 1;
        let mut frame_done = false;
        if u32::from(self.cycle) >= self.region.cycles_per_scanline() {
            self.cycle = 0;
            self.scanline += 1;
            if u32::from(self.scanline) >= self.region.scanlines_per_frame() {
                self.scanline = 0;
                self.frame = self.frame.wrapping_add(1);
                frame_done = true;
            }
        }
        Dot {
            scanline: self.scanline,
            cycle: self.cycle,
            frame_done,
        }
    }

    pub(crate) fn fetch(&self, slot: usize) -> Option<Fetch<'_>> {
        let trace = self.traces.get(slot)?;
        let cursor = self.cursors.get(slot)?;
        Some(Fetch {
            context: trace.context,
            instruction: trace.instructions.get(cursor.index)?,
            depth: cursor.depth,
        })
    }

    /// Runs the fetched instruction of `slot`. `visit` sees every bus
    /// operation before it lands, with whether the location was initialized.
    pub(crate) fn execute(&mut self, slot: usize, mut visit: impl FnMut(&ScriptedOp, bool)) {
        let (Some(trace), Some(cursor)) = (self.traces.get(slot), self.cursors.get_mut(slot)) else {
            return;
        };
        let Some(instruction) = trace.instructions.get(cursor.index) else {
            return;
        };

        for op in &instruction.ops {
            let key = (op.operation.space, op.operation.address);
            visit(op, self.initialized.contains(&key));
            if op.operation.kind.is_write() {
                self.memory.insert(key, op.operation.value);
                self.initialized.insert(key);
            }
        }

        match instruction.flow {
            Flow::Next => {}
            Flow::Call => cursor.depth += 1,
            Flow::Return => cursor.depth = cursor.depth.saturating_sub(1),
        }
        cursor.due += u64::from(instruction.cycles);
        cursor.index = trace.next_index(cursor.index);
    }

    /// Unmapped locations read as zero.
    pub(crate) fn peek(&self, space: MemorySpace, address: u32) -> u8 {
        self.memory.get(&(space, address)).copied().unwrap_or(0)
    }

    fn next_address(&self, context: ProcessorContext) -> Option<u32> {
        let slot = self.slot(context)?;
        let cursor = self.cursors.get(slot)?;
        self.traces[slot]
            .instructions
            .get(cursor.index)
            .map(|i| i.address)
    }

    /// `None` until a program is loaded.
    pub(crate) fn debug_state(&self) -> Option<DebugState> {
        if !self.is_loaded() {
            return None;
        }
        let cpu_like = |context| {
            self.next_address(context)
                .map(|address| CpuState {
                    k: (address >> 16) as u8,
                    pc: address as u16,
                    sp: 0x01FF,
                    ..CpuState::default()
                })
                .unwrap_or_default()
        };
        let spc = self
            .next_address(ProcessorContext::Spc)
            .map(|address| SpcState {
                pc: address as u16,
                sp: 0xEF,
                ..SpcState::default()
            })
            .unwrap_or_default();
        let gsu = self
            .next_address(ProcessorContext::Gsu)
            .map(|address| {
                let mut gsu = GsuState {
                    program_bank: (address >> 16) as u8,
                    ..GsuState::default()
                };
                gsu.r[15] = address as u16;
                gsu
            })
            .unwrap_or_default();

        Some(DebugState {
            master_clock: self.master_clock,
            cpu: cpu_like(ProcessorContext::Cpu),
            spc,
            sa1: cpu_like(ProcessorContext::Sa1),
            gsu,
            ppu: PpuState {
                scanline: self.scanline,
                cycle: self.cycle,
                frame_count: self.frame,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use snesium_debug::MemoryOperationType;

    use super::*;

    fn two_trace_program() -> Program {
        Program::new(CoprocessorType::None)
            .with_trace(
                Trace::new(ProcessorContext::Cpu)
                    .push(Instruction::new(0x80_8000, 0x20).call().cycles(6))
                    .push(
                        Instruction::new(0x80_9000, 0x8D)
                            .write(MemorySpace::WorkRam, 0x10, 0x42)
                            .cycles(4),
                    )
                    .push(Instruction::new(0x80_9003, 0x60).ret().cycles(6)),
            )
            .with_trace(Trace::new(ProcessorContext::Spc).push(Instruction::new(0xFFC0, 0xCD).cycles(5)))
            .poke(MemorySpace::CpuMemory, 0xFFFC, 0x00)
    }

    fn run_slot(machine: &mut Machine) -> (ProcessorContext, u32) {
        let (slot, due) = machine.next_slot().expect("runnable");
        while machine.master_clock() < due {
            machine.advance_dot();
        }
        let fetch = machine.fetch(slot).expect("fetch");
        let fetched = (fetch.context, fetch.instruction.address);
        machine.execute(slot, |_, _| {});
        fetched
    }

    #[test]
    fn earliest_due_trace_runs_first() {
        let mut machine = Machine::new(Region::Ntsc);
        machine.load(two_trace_program());

        assert_eq!(run_slot(&mut machine), (ProcessorContext::Cpu, 0x80_8000));
        assert_eq!(run_slot(&mut machine), (ProcessorContext::Spc, 0xFFC0));
        assert_eq!(run_slot(&mut machine), (ProcessorContext::Spc, 0xFFC0));
        assert_eq!(run_slot(&mut machine), (ProcessorContext::Cpu, 0x80_9000));
        assert_eq!(machine.master_clock(), 6);
        assert_eq!(machine.depth(ProcessorContext::Cpu), 1);
    }

    #[test]
    fn writes_initialize_memory() {
        let mut machine = Machine::new(Region::Ntsc);
        machine.load(two_trace_program());
        let mut seen = Vec::new();
        machine.execute(0, |_, _| {});
        machine.execute(0, |op, initialized| seen.push((op.operation.kind, initialized)));
        assert_eq!(seen, vec![(MemoryOperationType::Write, false)]);
        assert_eq!(machine.peek(MemorySpace::WorkRam, 0x10), 0x42);

        machine.reset();
        assert_eq!(machine.peek(MemorySpace::WorkRam, 0x10), 0);
        assert_eq!(machine.depth(ProcessorContext::Cpu), 0);
    }

    #[test]
    fn raster_wraps_into_new_frames() {
        let mut machine = Machine::new(Region::Ntsc);
        let mut frames = 0;
        for _ in 0..Region::Ntsc.cycles_per_frame() {
            if machine.advance_dot().frame_done {
                frames += 1;
            }
        }
        assert_eq!(frames, 1);
        assert_eq!(machine.raster(), (0, 0));
    }

    #[test]
    fn state_reports_next_instructions() {
        let mut machine = Machine::new(Region::Ntsc);
        assert!(machine.debug_state().is_none());
        machine.load(two_trace_program());
        machine.execute(0, |_, _| {});

        let state = machine.debug_state().expect("state");
        assert_eq!((state.cpu.k, state.cpu.pc), (0x80, 0x9000));
        assert_eq!(state.spc.pc, 0xFFC0);
        let profile = ProcessorContext::Cpu.profile().expect("cpu profile");
        assert_eq!(profile.active_address(&state), 0x80_9000);
    }
}

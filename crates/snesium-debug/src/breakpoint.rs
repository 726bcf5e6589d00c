//! Breakpoint definitions and their lifecycle.
//!
//! [`store::BreakpointStore`] owns the definitions, [`activation::CpuActivationSet`]
//! gates which contexts are live, and [`sync::EngineSync`] pushes the flattened
//! result to the engine. [`manager::BreakpointManager`] ties the three together
//! so every mutation is followed by exactly one re-sync.

pub mod activation;
pub mod manager;
pub mod store;
pub mod sync;

use core::fmt;

use bitflags::bitflags;

use crate::{
    context::ProcessorContext,
    memory::{MemoryOperationType, MemorySpace},
};

bitflags! {
    /// Access kinds a breakpoint fires on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BreakOn: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl BreakOn {
    /// Category an access falls into. Operand fetches count as reads.
    pub fn for_operation(kind: MemoryOperationType) -> Self {
        match kind {
            MemoryOperationType::Read
            | MemoryOperationType::DmaRead
            | MemoryOperationType::ExecOperand => Self::READ,
            MemoryOperationType::Write | MemoryOperationType::DmaWrite => Self::WRITE,
            MemoryOperationType::ExecOpCode => Self::EXECUTE,
        }
    }
}

/// Store-issued identity of a breakpoint.
///
/// Stays valid across removals of other breakpoints, unlike the positional id
/// the engine sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointKey(pub(crate) u64);

impl fmt::Display for BreakpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub context: ProcessorContext,
    pub space: MemorySpace,
    start_address: u32,
    end_address: u32,
    is_range: bool,
    pub break_on: BreakOn,
    pub enabled: bool,
    /// Evaluated by the engine; opaque here.
    pub condition: Option<String>,
}

impl Breakpoint {
    /// An enabled execute breakpoint on a single address.
    pub fn at(context: ProcessorContext, space: MemorySpace, address: u32) -> Self {
        Self {
            context,
            space,
            start_address: address,
            end_address: address,
            is_range: false,
            break_on: BreakOn::EXECUTE,
            enabled: true,
            condition: None,
        }
    }

    /// An enabled execute breakpoint over `[start, end]`. The bounds are
    /// swapped when given in reverse; equal bounds make a single-address
    /// breakpoint.
    pub fn range(context: ProcessorContext, space: MemorySpace, start: u32, end: u32) -> Self {
        let (start_address, end_address) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start_address,
            end_address,
            is_range: start_address != end_address,
            ..Self::at(context, space, start_address)
        }
    }

    pub fn with_break_on(mut self, break_on: BreakOn) -> Self {
        self.break_on = break_on;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.condition = (!condition.trim().is_empty()).then_some(condition);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn start_address(&self) -> u32 {
        self.start_address
    }

    pub fn end_address(&self) -> u32 {
        self.end_address
    }

    pub fn is_range(&self) -> bool {
        self.is_range
    }

    /// Whether this is exactly the single-address breakpoint shown at
    /// `address`. Range breakpoints never match.
    pub fn matches_address(&self, context: ProcessorContext, space: MemorySpace, address: u32) -> bool {
        !self.is_range && self.context == context && self.space == space && self.start_address == address
    }

    /// Exact identity lookup by bounds; never containment.
    pub fn matches_range(&self, space: MemorySpace, start: u32, end: u32) -> bool {
        if self.space != space {
            return false;
        }
        if start == end {
            !self.is_range && self.start_address == start
        } else {
            self.is_range && self.start_address == start && self.end_address == end
        }
    }

    /// Containment test used when evaluating a bus access.
    pub fn contains(&self, space: MemorySpace, address: u32) -> bool {
        self.space == space && (self.start_address..=self.end_address).contains(&address)
    }

    /// Whether an enabled breakpoint fires on an access of `kind`.
    pub fn triggers_on(&self, kind: MemoryOperationType) -> bool {
        self.enabled && self.break_on.intersects(BreakOn::for_operation(kind))
    }

    /// Compact access description, e.g. `CPU:RW-`.
    pub fn readable_type(&self) -> String {
        let flag = |f: BreakOn, c: char| if self.break_on.contains(f) { c } else { '-' };
        format!(
            "{}:{}{}{}",
            self.space.short_name(),
            flag(BreakOn::READ, 'R'),
            flag(BreakOn::WRITE, 'W'),
            flag(BreakOn::EXECUTE, 'X'),
        )
    }

    /// `$1234` or `$1000 - $10FF`.
    pub fn address_string(&self) -> String {
        if self.is_range {
            format!("${:04X} - ${:04X}", self.start_address, self.end_address)
        } else {
            format!("${:04X}", self.start_address)
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.context, self.readable_type(), self.address_string())?;
        if !self.enabled {
            f.write_str(" (disabled)")?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " if {condition}")?;
        }
        Ok(())
    }
}

/// Engine-facing record: a live breakpoint tagged with its positional id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedBreakpoint {
    pub id: usize,
    pub breakpoint: Breakpoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_constructor_normalises_bounds() {
        let bp = Breakpoint::range(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0x2000, 0x1000);
        assert_eq!((bp.start_address(), bp.end_address()), (0x1000, 0x2000));
        assert!(bp.is_range());

        let single = Breakpoint::range(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0x10, 0x10);
        assert!(!single.is_range());
    }

    #[test]
    fn range_lookup_never_uses_containment() {
        let bp = Breakpoint::range(ProcessorContext::Cpu, MemorySpace::WorkRam, 0x100, 0x1FF);
        assert!(bp.matches_range(MemorySpace::WorkRam, 0x100, 0x1FF));
        assert!(!bp.matches_range(MemorySpace::WorkRam, 0x100, 0x1FE));
        assert!(!bp.matches_range(MemorySpace::WorkRam, 0x100, 0x100));
        assert!(!bp.matches_address(ProcessorContext::Cpu, MemorySpace::WorkRam, 0x100));
        assert!(bp.contains(MemorySpace::WorkRam, 0x180));
    }

    #[test]
    fn operand_fetch_counts_as_read() {
        let bp = Breakpoint::at(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0)
            .with_break_on(BreakOn::READ);
        assert!(bp.triggers_on(MemoryOperationType::ExecOperand));
        assert!(bp.triggers_on(MemoryOperationType::DmaRead));
        assert!(!bp.triggers_on(MemoryOperationType::ExecOpCode));
        assert!(!bp.clone().with_enabled(false).triggers_on(MemoryOperationType::Read));
    }

    #[test]
    fn readable_forms() {
        let bp = Breakpoint::range(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0x2100, 0x21FF)
            .with_break_on(BreakOn::READ | BreakOn::WRITE)
            .with_condition("A == $10");
        assert_eq!(bp.readable_type(), "CPU:RW-");
        assert_eq!(bp.address_string(), "$2100 - $21FF");
        assert_eq!(bp.condition.as_deref(), Some("A == $10"));
        assert_eq!(bp.clone().with_condition("  ").condition, None);
    }
}

use crate::{
    context::ProcessorContext,
    memory::{AddressInfo, MemorySpace},
};

use super::{BreakOn, Breakpoint, BreakpointKey};

/// Outcome of [`BreakpointStore::toggle_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added(BreakpointKey),
    Removed(BreakpointKey),
    /// The address has no mapping; nothing changed.
    Ignored,
}

impl Toggle {
    pub fn changed(self) -> bool {
        !matches!(self, Toggle::Ignored)
    }
}

/// Ordered list of breakpoint definitions.
///
/// Order is significant: a breakpoint's index is the id the engine reports
/// back, so it only changes when the list itself is mutated.
#[derive(Debug, Default)]
pub struct BreakpointStore {
    entries: Vec<(BreakpointKey, Breakpoint)>,
    next_key: u64,
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BreakpointKey, &Breakpoint)> {
        self.entries.iter().map(|(key, bp)| (*key, bp))
    }

    pub fn get(&self, key: BreakpointKey) -> Option<&Breakpoint> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, bp)| bp)
    }

    /// Current positional id of `key`.
    pub fn position(&self, key: BreakpointKey) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }

    /// Appends `bp`. Structurally equal breakpoints may coexist; each gets its
    /// own key.
    pub fn add(&mut self, bp: Breakpoint) -> BreakpointKey {
        let key = BreakpointKey(self.next_key);
        self.next_key += 1;
        self.entries.push((key, bp));
        key
    }

    /// Removes by identity. Absent keys are a no-op.
    pub fn remove(&mut self, key: BreakpointKey) -> Option<Breakpoint> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }

    /// Replaces the breakpoint tracked under `key`, or appends `bp` when the
    /// key is missing or no longer tracked.
    pub fn edit(&mut self, key: Option<BreakpointKey>, bp: Breakpoint) -> BreakpointKey {
        if let Some(key) = key {
            if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
                *slot = bp;
                return key;
            }
        }
        self.add(bp)
    }

    /// Removes the breakpoint shown at `address`, or creates one.
    ///
    /// A new breakpoint always breaks on execution, and also on read and
    /// write unless the space is program ROM.
    pub fn toggle_at(&mut self, address: AddressInfo, context: ProcessorContext) -> Toggle {
        let Some(addr) = address.mapped_address() else {
            return Toggle::Ignored;
        };

        if let Some((key, _)) = self.find_match(address, context) {
            self.remove(key);
            return Toggle::Removed(key);
        }

        let break_on = if address.space.is_program_rom() {
            BreakOn::EXECUTE
        } else {
            BreakOn::all()
        };
        let bp = Breakpoint::at(context, address.space, addr).with_break_on(break_on);
        Toggle::Added(self.add(bp))
    }

    /// The single-address breakpoint of `context` at exactly `address`.
    pub fn find_match(
        &self,
        address: AddressInfo,
        context: ProcessorContext,
    ) -> Option<(BreakpointKey, &Breakpoint)> {
        let addr = address.mapped_address()?;
        self.iter()
            .find(|(_, bp)| bp.matches_address(context, address.space, addr))
    }

    /// The breakpoint whose bounds are exactly `[start, end]`.
    pub fn find_range_match(
        &self,
        space: MemorySpace,
        start: u32,
        end: u32,
    ) -> Option<(BreakpointKey, &Breakpoint)> {
        self.iter().find(|(_, bp)| bp.matches_range(space, start, end))
    }

    /// Flips `enabled` on the breakpoint at `address`. Returns `false`, having
    /// changed nothing, when there is no match.
    pub fn enable_disable(&mut self, address: AddressInfo, context: ProcessorContext) -> bool {
        let Some((key, _)) = self.find_match(address, context) else {
            return false;
        };
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bp)) => {
                bp.enabled = !bp.enabled;
                true
            }
            None => false,
        }
    }

    /// Positional lookup. Out-of-range ids are routine and yield `None`.
    pub fn by_id(&self, id: usize) -> Option<&Breakpoint> {
        self.entries.get(id).map(|(_, bp)| bp)
    }

    pub fn key_at(&self, id: usize) -> Option<BreakpointKey> {
        self.entries.get(id).map(|(key, _)| *key)
    }

    /// Replaces the whole list, as a workspace import does.
    pub fn replace_all(&mut self, breakpoints: impl IntoIterator<Item = Breakpoint>) {
        self.entries.clear();
        for bp in breakpoints {
            self.add(bp);
        }
    }
}

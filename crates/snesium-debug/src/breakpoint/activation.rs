use std::collections::BTreeSet;

use crate::context::ProcessorContext;

/// Contexts with at least one open debugger view.
///
/// Stored as a set: activating an already-active context is a no-op. Both
/// mutators report whether membership changed so callers only re-sync on a
/// real transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuActivationSet {
    active: BTreeSet<ProcessorContext>,
}

impl CpuActivationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, context: ProcessorContext) -> bool {
        self.active.insert(context)
    }

    pub fn deactivate(&mut self, context: ProcessorContext) -> bool {
        self.active.remove(&context)
    }

    pub fn is_active(&self, context: ProcessorContext) -> bool {
        self.active.contains(&context)
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessorContext> + '_ {
        self.active.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_is_idempotent() {
        let mut set = CpuActivationSet::new();
        assert!(set.activate(ProcessorContext::Cpu));
        assert!(!set.activate(ProcessorContext::Cpu));
        assert_eq!(set.iter().count(), 1);

        assert!(set.deactivate(ProcessorContext::Cpu));
        assert!(!set.deactivate(ProcessorContext::Cpu));
        assert!(set.is_empty());
    }
}

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, info};

use crate::{
    context::ProcessorContext,
    engine::BreakpointSink,
    error::EngineError,
    memory::AddressInfo,
};

use super::{
    Breakpoint, BreakpointKey,
    activation::CpuActivationSet,
    store::{BreakpointStore, Toggle},
    sync::EngineSync,
};

/// Change events a subscriber can fall behind by before new ones are dropped.
pub const CHANGE_QUEUE_DEPTH: usize = 16;

/// Broadcast after every mutation that reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointsChanged {
    /// Breakpoints in the store.
    pub total: usize,
    /// Breakpoints pushed to the engine.
    pub live: usize,
}

/// The session's breakpoint service.
///
/// Owns the store and the activation set and re-syncs the engine after each
/// mutation that changed something. Lives exactly as long as its debugging
/// session.
pub struct BreakpointManager<S> {
    store: BreakpointStore,
    active: CpuActivationSet,
    sync: EngineSync<S>,
    subscribers: Vec<Sender<BreakpointsChanged>>,
}

impl<S: BreakpointSink> BreakpointManager<S> {
    pub fn new(sink: S) -> Self {
        Self {
            store: BreakpointStore::new(),
            active: CpuActivationSet::new(),
            sync: EngineSync::new(sink),
            subscribers: Vec::new(),
        }
    }

    pub fn store(&self) -> &BreakpointStore {
        &self.store
    }

    pub fn activation(&self) -> &CpuActivationSet {
        &self.active
    }

    pub fn push_count(&self) -> u64 {
        self.sync.push_count()
    }

    pub fn by_id(&self, id: usize) -> Option<&Breakpoint> {
        self.store.by_id(id)
    }

    /// Change notifications for list views. A subscriber that stops draining
    /// misses events once [`CHANGE_QUEUE_DEPTH`] are queued.
    pub fn subscribe(&mut self) -> Receiver<BreakpointsChanged> {
        let (tx, rx) = bounded(CHANGE_QUEUE_DEPTH);
        self.subscribers.push(tx);
        rx
    }

    pub fn add(&mut self, bp: Breakpoint) -> Result<BreakpointKey, EngineError> {
        debug!(%bp, "adding breakpoint");
        let key = self.store.add(bp);
        self.changed()?;
        Ok(key)
    }

    pub fn remove(&mut self, key: BreakpointKey) -> Result<Option<Breakpoint>, EngineError> {
        let removed = self.store.remove(key);
        if removed.is_some() {
            debug!(%key, "removed breakpoint");
            self.changed()?;
        }
        Ok(removed)
    }

    pub fn edit(
        &mut self,
        key: Option<BreakpointKey>,
        bp: Breakpoint,
    ) -> Result<BreakpointKey, EngineError> {
        debug!(?key, %bp, "editing breakpoint");
        let key = self.store.edit(key, bp);
        self.changed()?;
        Ok(key)
    }

    pub fn toggle_at(
        &mut self,
        address: AddressInfo,
        context: ProcessorContext,
    ) -> Result<Toggle, EngineError> {
        let outcome = self.store.toggle_at(address, context);
        if outcome.changed() {
            debug!(?outcome, address = address.address, space = %address.space, "toggled breakpoint");
            self.changed()?;
        }
        Ok(outcome)
    }

    pub fn enable_disable(
        &mut self,
        address: AddressInfo,
        context: ProcessorContext,
    ) -> Result<bool, EngineError> {
        let found = self.store.enable_disable(address, context);
        if found {
            self.changed()?;
        }
        Ok(found)
    }

    /// Replaces every breakpoint, as a workspace import does.
    pub fn replace_all(
        &mut self,
        breakpoints: impl IntoIterator<Item = Breakpoint>,
    ) -> Result<(), EngineError> {
        self.store.replace_all(breakpoints);
        info!(count = self.store.len(), "imported breakpoints");
        self.changed()
    }

    /// Returns whether the context was newly activated. Only a new activation
    /// reaches the engine.
    pub fn activate(&mut self, context: ProcessorContext) -> Result<bool, EngineError> {
        let changed = self.active.activate(context);
        if changed {
            debug!(%context, "context activated");
            self.changed()?;
        }
        Ok(changed)
    }

    pub fn deactivate(&mut self, context: ProcessorContext) -> Result<bool, EngineError> {
        let changed = self.active.deactivate(context);
        if changed {
            debug!(%context, "context deactivated");
            self.changed()?;
        }
        Ok(changed)
    }

    /// Pushes the current set again without a mutation (after a game load,
    /// the engine starts with an empty set).
    pub fn resync(&mut self) -> Result<(), EngineError> {
        self.changed()
    }

    fn changed(&mut self) -> Result<(), EngineError> {
        let live = self.sync.sync(&self.store, &self.active)?;
        let event = BreakpointsChanged {
            total: self.store.len(),
            live,
        };
        self.subscribers
            .retain(|tx| !matches!(tx.try_send(event), Err(TrySendError::Disconnected(_))));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::{breakpoint::FlattenedBreakpoint, memory::MemorySpace};

    #[derive(Default)]
    struct Capture(Mutex<Vec<Vec<FlattenedBreakpoint>>>);

    impl BreakpointSink for Capture {
        fn push_breakpoints(&self, breakpoints: &[FlattenedBreakpoint]) -> Result<(), EngineError> {
            self.0.lock().push(breakpoints.to_vec());
            Ok(())
        }
    }

    fn manager() -> (BreakpointManager<Arc<Capture>>, Arc<Capture>) {
        let capture = Arc::new(Capture::default());
        (BreakpointManager::new(Arc::clone(&capture)), capture)
    }

    #[test]
    fn every_mutation_pushes_once() {
        let (mut mgr, capture) = manager();
        mgr.activate(ProcessorContext::Cpu).expect("activate");
        let key = mgr
            .add(Breakpoint::at(ProcessorContext::Cpu, MemorySpace::CpuMemory, 0x8000))
            .expect("add");
        mgr.remove(key).expect("remove");
        mgr.remove(key).expect("remove absent");

        let pushes = capture.0.lock();
        assert_eq!(pushes.len(), 3);
        assert_eq!(pushes[1].len(), 1);
        assert!(pushes[2].is_empty());
    }

    #[test]
    fn repeated_activation_does_not_push() {
        let (mut mgr, capture) = manager();
        assert_eq!(mgr.activate(ProcessorContext::Spc), Ok(true));
        assert_eq!(mgr.activate(ProcessorContext::Spc), Ok(false));
        assert_eq!(capture.0.lock().len(), 1);
        assert_eq!(mgr.push_count(), 1);
    }

    #[test]
    fn no_op_mutations_stay_silent() {
        let (mut mgr, capture) = manager();
        let unmapped = AddressInfo::new(-1, MemorySpace::CpuMemory);
        assert_eq!(mgr.toggle_at(unmapped, ProcessorContext::Cpu), Ok(Toggle::Ignored));
        let missing = AddressInfo::new(0x10, MemorySpace::CpuMemory);
        assert_eq!(mgr.enable_disable(missing, ProcessorContext::Cpu), Ok(false));
        assert!(capture.0.lock().is_empty());
    }

    #[test]
    fn subscribers_see_changes_and_are_dropped_when_gone() {
        let (mut mgr, _capture) = manager();
        let rx = mgr.subscribe();
        let dropped = mgr.subscribe();
        drop(dropped);

        mgr.activate(ProcessorContext::Cpu).expect("activate");
        mgr.add(Breakpoint::at(ProcessorContext::Cpu, MemorySpace::CpuMemory, 1))
            .expect("add");

        assert_eq!(rx.try_recv(), Ok(BreakpointsChanged { total: 0, live: 0 }));
        assert_eq!(rx.try_recv(), Ok(BreakpointsChanged { total: 1, live: 1 }));
        assert_eq!(mgr.subscribers.len(), 1);
    }

    #[test]
    fn a_stalled_subscriber_is_capped_but_kept() {
        let (mut mgr, _capture) = manager();
        let rx = mgr.subscribe();
        mgr.activate(ProcessorContext::Cpu).expect("activate");
        for address in 0..(CHANGE_QUEUE_DEPTH as u32 * 2) {
            mgr.add(Breakpoint::at(ProcessorContext::Cpu, MemorySpace::CpuMemory, address))
                .expect("add");
        }

        assert_eq!(rx.len(), CHANGE_QUEUE_DEPTH);
        assert_eq!(mgr.subscribers.len(), 1);
        while rx.try_recv().is_ok() {}
        mgr.resync().expect("resync");
        assert_eq!(
            rx.try_recv().map(|change| change.total),
            Ok(CHANGE_QUEUE_DEPTH * 2)
        );
    }
}

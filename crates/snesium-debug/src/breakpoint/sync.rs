use tracing::debug;

use crate::{engine::BreakpointSink, error::EngineError};

use super::{FlattenedBreakpoint, activation::CpuActivationSet, store::BreakpointStore};

/// Engine view of the breakpoint list: store order, id = index, inactive
/// contexts dropped. Ids of surviving entries keep their positional value, so
/// gaps appear where inactive breakpoints were skipped.
pub fn flatten(store: &BreakpointStore, active: &CpuActivationSet) -> Vec<FlattenedBreakpoint> {
    store
        .iter()
        .enumerate()
        .filter(|(_, (_, bp))| active.is_active(bp.context))
        .map(|(id, (_, bp))| FlattenedBreakpoint {
            id,
            breakpoint: bp.clone(),
        })
        .collect()
}

/// Pushes the full flattened set to the engine on every trigger.
///
/// The engine's set is always a pure function of the current store and
/// activation state; no incremental updates are ever sent.
#[derive(Debug)]
pub struct EngineSync<S> {
    sink: S,
    pushes: u64,
}

impl<S: BreakpointSink> EngineSync<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, pushes: 0 }
    }

    pub fn sync(
        &mut self,
        store: &BreakpointStore,
        active: &CpuActivationSet,
    ) -> Result<usize, EngineError> {
        let flattened = flatten(store, active);
        self.sink.push_breakpoints(&flattened)?;
        self.pushes += 1;
        debug!(
            live = flattened.len(),
            total = store.len(),
            push = self.pushes,
            "pushed breakpoints to engine"
        );
        Ok(flattened.len())
    }

    /// Successful pushes so far.
    pub fn push_count(&self) -> u64 {
        self.pushes
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64};

use parking_lot::Mutex;
use snesium_debug::DebugState;

/// State shared between the runner thread and handles without a round trip.
pub(crate) struct RuntimeState {
    pub(crate) paused: AtomicBool,
    pub(crate) frame_seq: AtomicU64,
    /// Published at every pause and frame end; `None` until a program loads.
    pub(crate) snapshot: Mutex<Option<DebugState>>,
}

impl RuntimeState {
    pub(crate) fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            frame_seq: AtomicU64::new(0),
            snapshot: Mutex::new(None),
        }
    }
}

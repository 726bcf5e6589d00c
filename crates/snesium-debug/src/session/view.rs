use crate::{
    classify::BreakClassification,
    context::{ContextProfile, ProcessorContext},
    state::DebugState,
};

use super::ViewId;

/// Debugger view bound to one processor context for its whole lifetime.
#[derive(Debug)]
pub struct DebuggerView {
    id: ViewId,
    profile: &'static ContextProfile,
    state: Option<DebugState>,
    active_address: Option<u32>,
    can_continue: bool,
    last_break: Option<BreakClassification>,
    /// No break has reached this view yet.
    pub(super) first_break: bool,
}

impl DebuggerView {
    pub(super) fn new(id: ViewId, profile: &'static ContextProfile) -> Self {
        Self {
            id,
            profile,
            state: None,
            active_address: None,
            can_continue: false,
            last_break: None,
            first_break: true,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn context(&self) -> ProcessorContext {
        self.profile.context
    }

    pub fn profile(&self) -> &'static ContextProfile {
        self.profile
    }

    pub fn title(&self) -> &'static str {
        self.profile.title
    }

    pub fn state(&self) -> Option<&DebugState> {
        self.state.as_ref()
    }

    /// Next instruction of the view's context; `None` while running.
    pub fn active_address(&self) -> Option<u32> {
        self.active_address
    }

    pub fn formatted_active_address(&self) -> Option<String> {
        self.active_address
            .map(|address| self.profile.format_address(address))
    }

    /// Whether "continue" is the available action (otherwise "break").
    pub fn can_continue(&self) -> bool {
        self.can_continue
    }

    pub fn last_break(&self) -> Option<&BreakClassification> {
        self.last_break.as_ref()
    }

    pub(super) fn refresh(&mut self, state: Option<DebugState>, paused: bool) {
        self.state = state;
        self.active_address = match (paused, state) {
            (true, Some(state)) => Some(self.profile.active_address(&state)),
            _ => None,
        };
    }

    /// Returns whether the available action changed.
    pub(super) fn update_continue_action(&mut self, paused: bool) -> bool {
        if !paused {
            self.active_address = None;
        }
        let changed = self.can_continue != paused;
        self.can_continue = paused;
        changed
    }

    pub(super) fn record_break(&mut self, classification: BreakClassification) {
        self.last_break = Some(classification);
    }
}

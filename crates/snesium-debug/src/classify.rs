use crate::{breakpoint::store::BreakpointStore, context::ProcessorContext, event::BreakEvent};

/// What a view should do with a break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakClassification {
    /// Raise the view owning `view_context`.
    pub focus: bool,
    pub message: String,
}

/// Classifies `event` for the view bound to `view_context`.
///
/// A view is focused when its own breakpoint fired, or when the source is an
/// engine condition that outranks user steps; `bring_to_front` gates both.
pub fn classify_break(
    event: &BreakEvent,
    view_context: ProcessorContext,
    store: &BreakpointStore,
    bring_to_front: bool,
) -> BreakClassification {
    let owns_breakpoint = event
        .breakpoint_id
        .and_then(|id| store.by_id(id))
        .is_some_and(|bp| bp.context == view_context);
    let focus = bring_to_front && (owns_breakpoint || event.source.outranks_steps());

    let message = match &event.operation {
        Some(op) if event.breakpoint_id.is_some() => format!(
            "{}: {} {} (${:04X}:${:02X})",
            event.source,
            op.kind,
            op.space.short_name(),
            op.address,
            op.value
        ),
        _ => event.source.to_string(),
    };

    BreakClassification { focus, message }
}

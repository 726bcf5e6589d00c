//! The single consumer that owns all debugger state.
//!
//! A [`DebugSession`] owns the breakpoint service, the execution controller
//! and the open views. Engine notifications arrive on a bounded queue and are
//! only ever applied here, so no debugger state is touched from the engine
//! thread.

pub mod view;

use core::fmt;
use std::{collections::BTreeMap, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    breakpoint::{manager::BreakpointManager, store::Toggle},
    classify::{BreakClassification, classify_break},
    config::DebuggerConfig,
    context::{ContextProfile, CpuVector, ProcessorContext},
    engine::{CoprocessorType, DebuggerFlags, Engine, EventViewerOptions, Notification, StepKind},
    error::{DebugError, EngineError},
    event::BreakEvent,
    exec::{ExecutionController, PpuStepUnit},
    memory::AddressInfo,
    transfer::{EventDetails, LabelProvider, TransferDecoder},
};

use self::view::DebuggerView;

/// Break conditions owned by [`DebuggerConfig`].
const BREAK_OPTION_FLAGS: DebuggerFlags = DebuggerFlags::BREAK_ON_BRK
    .union(DebuggerFlags::BREAK_ON_COP)
    .union(DebuggerFlags::BREAK_ON_WDM)
    .union(DebuggerFlags::BREAK_ON_STP)
    .union(DebuggerFlags::BREAK_ON_UNINIT_READ);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u32);

impl ViewId {
    /// Rebuilds an id from the number a front end displayed.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something a front end should redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Register state was re-read; `active_address` is `None` while running.
    Refreshed {
        view: ViewId,
        active_address: Option<u32>,
    },
    /// "Continue" became available (paused) or unavailable (running).
    ContinueAction { view: ViewId, can_continue: bool },
    Break {
        view: ViewId,
        classification: BreakClassification,
    },
    /// The session closed the view on its own.
    Closed {
        view: ViewId,
        context: ProcessorContext,
    },
}

pub struct DebugSession<E> {
    engine: E,
    config: DebuggerConfig,
    breakpoints: BreakpointManager<E>,
    exec: ExecutionController<E>,
    views: BTreeMap<ViewId, DebuggerView>,
    view_counts: BTreeMap<ProcessorContext, usize>,
    next_view: u32,
    coprocessor: CoprocessorType,
    notifications: Receiver<Notification>,
    event_options: EventViewerOptions,
}

impl<E: Engine + Clone> DebugSession<E> {
    /// Starts a session and pushes the configured break conditions.
    pub fn new(
        engine: E,
        notifications: Receiver<Notification>,
        config: DebuggerConfig,
    ) -> Result<Self, DebugError> {
        let session = Self {
            breakpoints: BreakpointManager::new(engine.clone()),
            exec: ExecutionController::new(engine.clone(), config.region),
            engine,
            config,
            views: BTreeMap::new(),
            view_counts: BTreeMap::new(),
            next_view: 1,
            coprocessor: CoprocessorType::None,
            notifications,
            event_options: EventViewerOptions::default(),
        };
        session.apply_engine_flags()?;
        info!(region = %session.config.region, "debug session started");
        Ok(session)
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DebuggerConfig) -> Result<(), DebugError> {
        self.config = config;
        self.exec.set_region(self.config.region);
        self.apply_engine_flags()?;
        Ok(())
    }

    fn apply_engine_flags(&self) -> Result<(), EngineError> {
        let enabled = self.config.engine_flags();
        let disabled = BREAK_OPTION_FLAGS.difference(enabled);
        if !enabled.is_empty() {
            self.engine.set_debugger_flags(enabled, true)?;
        }
        if !disabled.is_empty() {
            self.engine.set_debugger_flags(disabled, false)?;
        }
        Ok(())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn breakpoints(&self) -> &BreakpointManager<E> {
        &self.breakpoints
    }

    /// Direct access for breakpoint-list views (add, edit, import).
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointManager<E> {
        &mut self.breakpoints
    }

    pub fn execution(&self) -> &ExecutionController<E> {
        &self.exec
    }

    pub fn coprocessor(&self) -> CoprocessorType {
        self.coprocessor
    }

    pub fn is_paused(&self) -> bool {
        self.exec.is_paused()
    }

    pub fn view(&self, id: ViewId) -> Option<&DebuggerView> {
        self.views.get(&id)
    }

    pub fn views(&self) -> impl Iterator<Item = &DebuggerView> {
        self.views.values()
    }

    pub fn view_count(&self, context: ProcessorContext) -> usize {
        self.view_counts.get(&context).copied().unwrap_or(0)
    }

    /// Opens a view on `context`: enables the context's engine
    /// instrumentation, activates its breakpoints and runs the bootstrap step.
    pub fn open_view(&mut self, context: ProcessorContext) -> Result<ViewId, DebugError> {
        let profile = context
            .profile()
            .ok_or(DebugError::UnsupportedContext(context))?;
        if profile
            .required_coprocessor
            .is_some_and(|required| required != self.coprocessor)
        {
            return Err(DebugError::CoprocessorAbsent(context));
        }

        if !self.view_counts.contains_key(&context) {
            self.engine.set_debugger_flags(profile.enabled_flag, true)?;
            self.exec.track(context);
            if let Err(err) = self.enter_context(context) {
                if let Err(release) = self.release_context(context, profile) {
                    warn!(%context, %release, "could not release context after failed open");
                }
                return Err(err);
            }
        } else {
            self.exec.bootstrap(context)?;
        }

        let id = ViewId(self.next_view);
        self.next_view += 1;
        *self.view_counts.entry(context).or_insert(0) += 1;
        self.views.insert(id, DebuggerView::new(id, profile));
        info!(view = %id, %context, "debugger view opened");
        Ok(id)
    }

    fn enter_context(&mut self, context: ProcessorContext) -> Result<(), DebugError> {
        self.breakpoints.activate(context)?;
        self.exec.bootstrap(context)
    }

    /// Drops every trace of `context` from the session, then tells the
    /// engine. Session state is consistent even when the engine fails.
    fn release_context(
        &mut self,
        context: ProcessorContext,
        profile: &ContextProfile,
    ) -> Result<(), DebugError> {
        self.view_counts.remove(&context);
        self.exec.untrack(context);
        let disabled = self.engine.set_debugger_flags(profile.enabled_flag, false);
        let deactivated = self.breakpoints.deactivate(context);
        disabled?;
        deactivated?;
        Ok(())
    }

    /// Closes a view. The context is deactivated when its last view closes.
    pub fn close_view(&mut self, id: ViewId) -> Result<(), DebugError> {
        let view = self.views.remove(&id).ok_or(DebugError::UnknownView(id))?;
        let context = view.context();
        info!(view = %id, %context, "debugger view closed");

        let remaining = match self.view_counts.get_mut(&context) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.release_context(context, view.profile())?;
        }
        Ok(())
    }

    /// Closes every view and ends the session.
    pub fn close(mut self) -> Result<(), DebugError> {
        let ids: Vec<ViewId> = self.views.keys().copied().collect();
        for id in ids {
            self.close_view(id)?;
        }
        info!("debug session closed");
        Ok(())
    }

    fn view_context(&self, id: ViewId) -> Result<ProcessorContext, DebugError> {
        self.views
            .get(&id)
            .map(DebuggerView::context)
            .ok_or(DebugError::UnknownView(id))
    }

    pub fn step(&mut self, id: ViewId, count: u32, kind: StepKind) -> Result<(), DebugError> {
        let context = self.view_context(id)?;
        self.exec.step(context, count, kind)
    }

    pub fn step_ppu(&mut self, id: ViewId, unit: PpuStepUnit) -> Result<(), DebugError> {
        let context = self.view_context(id)?;
        self.exec.step_ppu(context, unit)
    }

    pub fn run_to_scanline(&mut self, id: ViewId, scanline: u16) -> Result<(), DebugError> {
        let context = self.view_context(id)?;
        self.exec.run_to_scanline(context, scanline)
    }

    pub fn resume(&mut self, id: ViewId) -> Result<(), DebugError> {
        let context = self.view_context(id)?;
        self.exec.resume(context)
    }

    pub fn break_now(&mut self, id: ViewId) -> Result<(), DebugError> {
        let context = self.view_context(id)?;
        self.exec.break_now(context)
    }

    pub fn toggle_break_continue(&mut self, id: ViewId) -> Result<(), DebugError> {
        let context = self.view_context(id)?;
        self.exec.toggle_break_continue(context)
    }

    /// Click-to-toggle in a view's code listing.
    pub fn toggle_breakpoint(&mut self, id: ViewId, address: AddressInfo) -> Result<Toggle, DebugError> {
        let context = self.view_context(id)?;
        Ok(self.breakpoints.toggle_at(address, context)?)
    }

    pub fn enable_disable_breakpoint(
        &mut self,
        id: ViewId,
        address: AddressInfo,
    ) -> Result<bool, DebugError> {
        let context = self.view_context(id)?;
        Ok(self.breakpoints.enable_disable(address, context)?)
    }

    /// Handler address stored in `vector`, read little-endian from the view's
    /// memory space. `None` when the context has no such vector.
    pub fn vector_address(&self, id: ViewId, vector: CpuVector) -> Result<Option<u32>, DebugError> {
        let view = self.views.get(&id).ok_or(DebugError::UnknownView(id))?;
        let profile = view.profile();
        let Some(entry) = profile.vector(vector) else {
            return Ok(None);
        };
        let lsb = self.engine.get_memory_value(profile.memory_space, entry.address)?;
        let msb = self
            .engine
            .get_memory_value(profile.memory_space, entry.address + 1)?;
        Ok(Some(u32::from(u16::from_le_bytes([lsb, msb]))))
    }

    /// Menu entries for every vector of the view's context, e.g.
    /// `NMI Handler ($8000)`.
    pub fn vector_labels(&self, id: ViewId) -> Result<Vec<(CpuVector, String)>, DebugError> {
        let view = self.views.get(&id).ok_or(DebugError::UnknownView(id))?;
        let mut labels = Vec::with_capacity(view.profile().vectors.len());
        for entry in view.profile().vectors {
            if let Some(address) = self.vector_address(id, entry.vector)? {
                labels.push((
                    entry.vector,
                    format!("{} Handler (${address:04X})", entry.vector.name()),
                ));
            }
        }
        Ok(labels)
    }

    pub fn event_viewer_options(&self) -> &EventViewerOptions {
        &self.event_options
    }

    pub fn set_event_viewer_options(&mut self, options: EventViewerOptions) {
        self.event_options = options;
    }

    pub fn take_event_snapshot(&self) -> Result<(), DebugError> {
        Ok(self.engine.take_event_snapshot(&self.event_options)?)
    }

    /// Describes the captured event nearest to (`scanline`, `cycle`).
    pub fn describe_event(
        &self,
        scanline: u16,
        cycle: u16,
        labels: Option<&dyn LabelProvider>,
    ) -> Result<Option<EventDetails>, DebugError> {
        let Some(event) = self
            .engine
            .get_event_viewer_event(scanline, cycle, &self.event_options)?
        else {
            return Ok(None);
        };
        let mut decoder = TransferDecoder::new().with_breakpoints(self.breakpoints.store());
        if let Some(labels) = labels {
            decoder = decoder.with_labels(labels);
        }
        Ok(Some(decoder.describe(&event)))
    }

    /// Applies every queued notification without blocking.
    pub fn pump(&mut self) -> Result<Vec<ViewUpdate>, DebugError> {
        let mut updates = Vec::new();
        loop {
            match self.notifications.try_recv() {
                Ok(notification) => updates.extend(self.handle_notification(notification)?),
                Err(TryRecvError::Empty) => return Ok(updates),
                Err(TryRecvError::Disconnected) => {
                    return Err(EngineError::Disconnected.into());
                }
            }
        }
    }

    /// Blocks up to `timeout` for the next notification, then drains the rest
    /// of the queue. An elapsed timeout yields no updates.
    pub fn wait(&mut self, timeout: Duration) -> Result<Vec<ViewUpdate>, DebugError> {
        match self.notifications.recv_timeout(timeout) {
            Ok(notification) => {
                let mut updates = self.handle_notification(notification)?;
                updates.extend(self.pump()?);
                Ok(updates)
            }
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Disconnected.into()),
        }
    }

    pub fn handle_notification(
        &mut self,
        notification: Notification,
    ) -> Result<Vec<ViewUpdate>, DebugError> {
        debug!(?notification, "notification");
        match notification {
            Notification::GameLoaded { coprocessor } => self.on_game_loaded(coprocessor),
            Notification::GameReset => {
                self.power_cycle_break()?;
                Ok(Vec::new())
            }
            Notification::FrameDone => Ok(self.on_frame_done()),
            Notification::CodeBreak(event) => self.on_code_break(event),
        }
    }

    fn on_game_loaded(&mut self, coprocessor: CoprocessorType) -> Result<Vec<ViewUpdate>, DebugError> {
        self.coprocessor = coprocessor;
        let mut updates = Vec::new();

        let orphaned: Vec<(ViewId, ProcessorContext)> = self
            .views
            .values()
            .filter(|view| {
                view.profile()
                    .required_coprocessor
                    .is_some_and(|required| required != coprocessor)
            })
            .map(|view| (view.id(), view.context()))
            .collect();
        for (view, context) in orphaned {
            warn!(view = %view, %context, "coprocessor absent, closing view");
            self.close_view(view)?;
            updates.push(ViewUpdate::Closed { view, context });
        }

        self.power_cycle_break()?;

        let state = self.engine.get_state();
        let paused = self.engine.is_paused();
        for view in self.views.values_mut() {
            view.refresh(state, paused);
            updates.push(ViewUpdate::Refreshed {
                view: view.id(),
                active_address: view.active_address(),
            });
        }

        // The engine starts a new game with no breakpoints.
        self.breakpoints.resync()?;
        Ok(updates)
    }

    fn power_cycle_break(&mut self) -> Result<(), DebugError> {
        if !self.config.break_on_power_cycle_reset {
            return Ok(());
        }
        if let Some(context) = self.views.values().next().map(DebuggerView::context) {
            self.exec.step_ppu(context, PpuStepUnit::Cycle)?;
        }
        Ok(())
    }

    fn on_frame_done(&mut self) -> Vec<ViewUpdate> {
        let paused = self.engine.is_paused();
        self.views
            .values_mut()
            .filter_map(|view| {
                view.update_continue_action(paused)
                    .then(|| ViewUpdate::ContinueAction {
                        view: view.id(),
                        can_continue: paused,
                    })
            })
            .collect()
    }

    fn on_code_break(&mut self, event: BreakEvent) -> Result<Vec<ViewUpdate>, DebugError> {
        self.exec.on_break();
        let state = self.engine.get_state();
        let mut updates = Vec::new();
        let mut first_break = None;

        for view in self.views.values_mut() {
            view.refresh(state, true);
            if view.update_continue_action(true) {
                updates.push(ViewUpdate::ContinueAction {
                    view: view.id(),
                    can_continue: true,
                });
            }
            updates.push(ViewUpdate::Refreshed {
                view: view.id(),
                active_address: view.active_address(),
            });

            let classification = classify_break(
                &event,
                view.context(),
                self.breakpoints.store(),
                self.config.bring_to_front_on_break,
            );
            view.record_break(classification.clone());
            updates.push(ViewUpdate::Break {
                view: view.id(),
                classification,
            });

            if std::mem::replace(&mut view.first_break, false) && first_break.is_none() {
                first_break = Some(view.context());
            }
        }
        info!(source = %event.source, id = ?event.breakpoint_id, "code break");

        if let Some(context) = first_break.filter(|_| !self.config.break_on_open) {
            debug!(%context, "resuming after first break");
            self.exec.resume(context)?;
            for view in self.views.values_mut() {
                if view.update_continue_action(false) {
                    updates.push(ViewUpdate::ContinueAction {
                        view: view.id(),
                        can_continue: false,
                    });
                }
            }
        }
        Ok(updates)
    }
}

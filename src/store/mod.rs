//! The single owner of [`ThemeState`].
//!
//! Every public mutator runs to completion before returning: update the
//! in-memory state, hand the now-current snapshot to the renderer, trigger
//! persistence when committed state changed, then notify subscribers. Only
//! the remote half of persistence outlives the call.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use crate::bus::{NotificationBus, Subscription};
use crate::error::{AppError, AppResult};
use crate::render::ThemeRenderer;
use crate::state::{StateError, TransactionEvent, TransactionMachine, TransactionPhase};
use crate::storage::{PersistenceAdapter, StorageResult};
use crate::theme::{
    builtin_settings, clamp_opacity, PreviewOverlay, ResolvedTheme, ThemeColors, ThemeMode,
    ThemeSettings, ThemeState,
};
use crate::validation::{validate_colors, DefaultsResolver, ValidationErrors};

pub struct ThemeStore {
    state: ThemeState,
    machine: TransactionMachine,
    persistence: PersistenceAdapter,
    defaults: DefaultsResolver,
    renderer: Box<dyn ThemeRenderer>,
    bus: NotificationBus,
}

impl ThemeStore {
    pub fn new(persistence: PersistenceAdapter, renderer: impl ThemeRenderer + 'static) -> Self {
        Self {
            state: ThemeState::default(),
            machine: TransactionMachine::new(),
            persistence,
            defaults: DefaultsResolver::new(),
            renderer: Box::new(renderer),
            bus: NotificationBus::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: DefaultsResolver) -> Self {
        self.defaults = defaults;
        self
    }

    /// Load committed settings and become ready. A second call is a no-op.
    ///
    /// Falls back through persisted state (remote, then local), `user_settings`,
    /// the global default, and the built-in palette. Never fails.
    pub fn initialize(&mut self, user_settings: Option<&Value>) {
        if self.machine.phase().is_ready() {
            tracing::debug!("theme store already initialized");
            return;
        }

        let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
            self.resolve_initial_settings(user_settings)
        }));
        let (settings, source) = resolved.unwrap_or_else(|_| {
            tracing::error!("theme load panicked; falling back to defaults");
            (self.defaults.default_settings(), "defaults after failure")
        });
        tracing::info!(source, mode = ?settings.mode, "theme store initialized");

        if !self.advance(TransactionEvent::Initialize) {
            return;
        }
        self.state = ThemeState::with_settings(settings);
        self.state.is_ready = true;
        self.render();
        self.notify();
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_ready
    }

    pub fn phase(&self) -> TransactionPhase {
        self.machine.phase()
    }

    /// Snapshot copy of the full state.
    pub fn get_state(&self) -> ThemeState {
        self.state.clone()
    }

    pub fn resolved(&self) -> ResolvedTheme {
        self.state.resolved()
    }

    /// Register `listener`; it immediately receives the current snapshot.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ThemeState) + 'static,
    {
        let subscription = self.bus.subscribe(listener);
        self.bus.deliver(&subscription, &self.state);
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.len()
    }

    /// Open a preview transaction. Already previewing: nothing happens.
    pub fn enter_preview_mode(&mut self) {
        if self.machine.phase().is_previewing() {
            return;
        }
        if self.advance(TransactionEvent::EnterPreview) {
            self.state.preview = Some(PreviewOverlay::default());
            self.state.refresh_unsaved_changes();
            self.notify();
        }
    }

    pub fn preview_theme_mode(&mut self, mode: ThemeMode) {
        self.update_preview(|preview| preview.mode = Some(mode));
    }

    /// An invalid palette is rejected and the preview is left as it was.
    pub fn preview_light_theme(&mut self, colors: ThemeColors) -> Result<(), ValidationErrors> {
        let colors = checked_palette(LIGHT_THEME_KEY, colors)?;
        self.update_preview(|preview| preview.light_theme = Some(colors));
        Ok(())
    }

    pub fn preview_dark_theme(&mut self, colors: ThemeColors) -> Result<(), ValidationErrors> {
        let colors = checked_palette(DARK_THEME_KEY, colors)?;
        self.update_preview(|preview| preview.dark_theme = Some(colors));
        Ok(())
    }

    /// `None` previews the theme without any background image.
    pub fn preview_background_image(&mut self, image: Option<String>) {
        self.update_preview(|preview| preview.background_image = Some(image));
    }

    pub fn preview_background_opacity(&mut self, opacity: f64) {
        let opacity = clamp_opacity(opacity);
        self.update_preview(|preview| preview.background_opacity = Some(opacity));
    }

    /// Close the preview transaction, committing (`save`) or discarding it.
    /// Outside a preview this does nothing.
    pub fn exit_preview_mode(&mut self, save: bool) {
        let event = if save {
            TransactionEvent::Commit
        } else {
            TransactionEvent::Discard
        };
        if !self.machine.can_transition(event) {
            tracing::debug!(save, phase = ?self.machine.phase(), "no preview to exit");
            return;
        }
        self.advance(event);

        let preview = self.state.preview.take();
        self.state.has_unsaved_changes = false;
        if save {
            if let Some(preview) = preview {
                preview.merge_into(&mut self.state.committed);
            }
            self.render();
            if self.persist().is_err() {
                tracing::debug!("committed preview kept in memory only");
            }
        } else {
            self.render();
        }
        self.notify();
    }

    pub fn set_mode(&mut self, mode: ThemeMode) {
        self.update_committed(|committed| committed.mode = mode);
    }

    pub fn toggle_mode(&mut self) {
        let mode = self.state.committed.mode.toggled();
        self.set_mode(mode);
    }

    /// An invalid palette is rejected and committed state is left as it was.
    pub fn set_light_theme(&mut self, colors: ThemeColors) -> Result<(), ValidationErrors> {
        let colors = checked_palette(LIGHT_THEME_KEY, colors)?;
        self.update_committed(|committed| committed.light_theme = colors);
        Ok(())
    }

    pub fn set_dark_theme(&mut self, colors: ThemeColors) -> Result<(), ValidationErrors> {
        let colors = checked_palette(DARK_THEME_KEY, colors)?;
        self.update_committed(|committed| committed.dark_theme = colors);
        Ok(())
    }

    pub fn set_background_image(&mut self, image: Option<String>) {
        self.update_committed(|committed| committed.background_image = image);
    }

    pub fn set_background_opacity(&mut self, opacity: f64) {
        let opacity = clamp_opacity(opacity);
        self.update_committed(|committed| committed.background_opacity = opacity);
    }

    /// Replace committed settings with the default tier (global default, else
    /// built-in). An open preview stays open on top of the new values.
    pub fn load_default_theme(&mut self) -> AppResult<()> {
        self.machine
            .next_phase(TransactionEvent::DirectChange)
            .ok_or(StateError::InvalidTransition {
                from: self.machine.phase(),
                event: TransactionEvent::DirectChange,
            })?;

        let defaults = self.defaults.default_settings();
        self.update_committed(|committed| *committed = defaults)
            .transpose()?;
        Ok(())
    }

    /// Install a freshly fetched administrator default. Committed state is not touched.
    pub fn set_global_default(&mut self, candidate: &Value) -> Result<(), ValidationErrors> {
        self.defaults.set_global_default(candidate)
    }

    pub fn defaults(&self) -> &DefaultsResolver {
        &self.defaults
    }

    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.persistence
    }

    /// Sign-in/out and backend attachment go through here.
    pub fn persistence_mut(&mut self) -> &mut PersistenceAdapter {
        &mut self.persistence
    }

    /// Back to `Uninitialized` with built-in settings so `initialize` runs again.
    /// Subscribers stay registered and are not notified.
    pub fn reset(&mut self) {
        self.advance(TransactionEvent::Reset);
        self.state = ThemeState::with_settings(builtin_settings());
    }

    fn resolve_initial_settings(&self, user_settings: Option<&Value>) -> (ThemeSettings, &'static str) {
        if let Some(settings) = self.persistence.load(&self.defaults) {
            return (settings, "persisted");
        }

        if let Some(candidate) = user_settings {
            match self.defaults.validate(candidate) {
                Ok(settings) => return (settings, "user settings"),
                Err(err) => tracing::warn!(%err, "ignoring invalid user theme settings"),
            }
        }

        match self.defaults.global_default() {
            Some(settings) => (settings.clone(), "global default"),
            None => (builtin_settings(), "built-in"),
        }
    }

    fn advance(&mut self, event: TransactionEvent) -> bool {
        match self.machine.transition(event) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(%err, "theme operation ignored");
                false
            }
        }
    }

    fn update_preview(&mut self, apply: impl FnOnce(&mut PreviewOverlay)) {
        if !self.advance(TransactionEvent::PreviewChange) {
            return;
        }
        apply(self.state.preview.get_or_insert_with(PreviewOverlay::default));
        self.state.refresh_unsaved_changes();
        self.render();
        self.notify();
    }

    /// `None` when the transition was refused. A candidate that fails
    /// validation leaves committed state untouched.
    fn update_committed(&mut self, apply: impl FnOnce(&mut ThemeSettings)) -> Option<AppResult<()>> {
        if !self.advance(TransactionEvent::DirectChange) {
            return None;
        }

        let mut candidate = self.state.committed.clone();
        apply(&mut candidate);
        if let Err(err) = self.defaults.validate(&candidate.to_json()) {
            tracing::warn!(%err, "rejected committed theme change");
            return Some(Err(AppError::Validation(err)));
        }

        if self.machine.phase().is_previewing() {
            tracing::debug!("committed theme changed beneath an open preview");
        }
        self.state.committed = candidate;
        self.state.refresh_unsaved_changes();
        self.render();
        let saved = self.persist().map_err(AppError::from);
        self.notify();
        Some(saved)
    }

    fn render(&self) {
        self.renderer.apply_snapshot(&self.state);
    }

    fn persist(&self) -> StorageResult<()> {
        let result = self.persistence.save(&self.state.committed);
        if let Err(err) = &result {
            tracing::warn!(?err, "failed to persist committed theme");
        }
        result
    }

    fn notify(&self) {
        let delivered = self.bus.notify(&self.state);
        tracing::trace!(delivered, "theme snapshot broadcast");
    }
}

const LIGHT_THEME_KEY: &str = "lightTheme";
const DARK_THEME_KEY: &str = "darkTheme";

fn checked_palette(key: &str, colors: ThemeColors) -> Result<ThemeColors, ValidationErrors> {
    validate_colors(key, &colors.with_clamped_opacities())
        .inspect_err(|err| tracing::warn!(%err, "rejected theme palette"))
}

impl std::fmt::Debug for ThemeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeStore")
            .field("phase", &self.machine.phase())
            .field("state", &self.state)
            .field("persistence", &self.persistence)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

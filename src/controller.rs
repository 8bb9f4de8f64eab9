//! Delay controller
//!
//! Authority over the configured delay and pause flag. Keeps the set of
//! known sources and an explicit registry `SourceId -> Session`, and enforces
//! the session lifecycle rule:
//!
//! | Settings                  | Sessions                                  |
//! |---------------------------|-------------------------------------------|
//! | `delay_ms > 0`, not paused | one active session per known source      |
//! | `delay_ms == 0` or paused  | none (sources are remembered)            |
//!
//! Delay changes while engaged are pushed into live sessions in place,
//! without resetting their buffers.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::frame::Capacity;
use crate::session::{EngineContext, Session};
use crate::source::{SourceId, VisualSource};

/// User-facing delay settings delivered by the configuration feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DelaySettings {
    /// Delay in milliseconds (0 disables delaying)
    pub delay_ms: u64,
    /// Globally suspend delaying
    pub paused: bool,
}

impl DelaySettings {
    /// Settings with a delay and no pause
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            paused: false,
        }
    }

    /// True if sources should currently be delayed
    pub fn is_engaged(&self) -> bool {
        self.delay_ms > 0 && !self.paused
    }
}

struct ControllerState {
    settings: DelaySettings,
    sources: HashMap<SourceId, Arc<dyn VisualSource>>,
    sessions: HashMap<SourceId, Arc<Session>>,
}

/// Creates, updates and destroys sessions as settings and sources change
///
/// Operations that may activate sessions must be called from within a Tokio
/// runtime.
pub struct DelayController {
    context: EngineContext,
    default_capacity: Capacity,
    state: Mutex<ControllerState>,
}

impl DelayController {
    /// Create a controller with no known sources
    pub fn new(settings: DelaySettings, context: EngineContext, default_capacity: Capacity) -> Self {
        debug!(
            "Delay controller created: delay {}ms, paused {}, {} slots per session",
            settings.delay_ms, settings.paused, default_capacity
        );
        Self {
            context,
            default_capacity,
            state: Mutex::new(ControllerState {
                settings,
                sources: HashMap::new(),
                sessions: HashMap::new(),
            }),
        }
    }

    /// Current settings
    pub fn settings(&self) -> DelaySettings {
        self.state.lock().settings
    }

    /// Remember a source and start delaying it if settings are engaged
    pub fn register_source(&self, source: Arc<dyn VisualSource>) {
        let mut state = self.state.lock();
        let id = source.id();
        debug!("Registering {}", id);
        state.sources.insert(id, Arc::clone(&source));

        if state.settings.is_engaged() {
            let session = self.get_or_create_locked(&mut state, source);
            session.activate();
        }
    }

    /// Stop delaying a source and forget it
    pub fn forget_source(&self, id: SourceId) {
        let mut state = self.state.lock();
        state.sources.remove(&id);
        if let Some(session) = state.sessions.remove(&id) {
            session.deactivate();
        }
        debug!("Forgot {}", id);
    }

    /// Stop delaying one source and unlink its session
    ///
    /// The source stays known, so the next engage transition or
    /// [`DelayController::get_or_create`] gives it a fresh session. Returns
    /// `false` if no session was registered.
    pub fn deactivate(&self, id: SourceId) -> bool {
        let mut state = self.state.lock();
        match state.sessions.remove(&id) {
            Some(session) => {
                session.deactivate();
                debug!("Deactivated session for {}", id);
                true
            }
            None => false,
        }
    }

    /// Session for `source`, creating it if none is registered
    ///
    /// An existing session is returned as-is apart from picking up the
    /// current delay. A new session is registered but not activated.
    pub fn get_or_create(&self, source: Arc<dyn VisualSource>) -> Arc<Session> {
        let mut state = self.state.lock();
        state.sources.entry(source.id()).or_insert_with(|| Arc::clone(&source));
        self.get_or_create_locked(&mut state, source)
    }

    /// Change the delay
    ///
    /// Live sessions keep their buffers. Dropping to zero deactivates all
    /// sessions; rising from zero while not paused creates them.
    pub fn set_delay(&self, delay_ms: u64) {
        let mut state = self.state.lock();
        let previous = state.settings;
        state.settings.delay_ms = delay_ms;
        self.apply_locked(&mut state, previous);
    }

    /// Engage or release the global pause
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        let previous = state.settings;
        state.settings.paused = paused;
        self.apply_locked(&mut state, previous);
    }

    /// Apply a complete settings update
    pub fn apply(&self, settings: DelaySettings) {
        let mut state = self.state.lock();
        let previous = state.settings;
        state.settings = settings;
        self.apply_locked(&mut state, previous);
    }

    /// Follow a configuration feed until it closes or `cancel` fires
    ///
    /// The feed's current value is applied immediately.
    pub fn spawn_settings_listener(
        self: &Arc<Self>,
        mut settings_rx: watch::Receiver<DelaySettings>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let initial = *settings_rx.borrow_and_update();
            controller.apply(initial);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = settings_rx.changed() => {
                        if changed.is_err() {
                            debug!("Settings feed closed");
                            break;
                        }
                        let settings = *settings_rx.borrow_and_update();
                        controller.apply(settings);
                    }
                }
            }
        })
    }

    /// Registered session for `id`
    pub fn session(&self, id: SourceId) -> Option<Arc<Session>> {
        self.state.lock().sessions.get(&id).cloned()
    }

    /// All registered sessions
    pub fn live_sessions(&self) -> Vec<Arc<Session>> {
        self.state.lock().sessions.values().cloned().collect()
    }

    /// Number of known sources
    pub fn known_sources(&self) -> usize {
        self.state.lock().sources.len()
    }

    /// Deactivate every session, keeping sources and settings
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let count = state.sessions.len();
        Self::deactivate_all_locked(&mut state);
        info!("Delay controller shut down ({} sessions stopped)", count);
    }

    fn get_or_create_locked(
        &self,
        state: &mut ControllerState,
        source: Arc<dyn VisualSource>,
    ) -> Arc<Session> {
        let delay_ms = state.settings.delay_ms;
        if let Some(existing) = state.sessions.get(&source.id()) {
            existing.set_delay(delay_ms);
            return Arc::clone(existing);
        }

        let id = source.id();
        let session = Arc::new(Session::new(
            source,
            self.default_capacity,
            delay_ms,
            self.context.clone(),
        ));
        state.sessions.insert(id, Arc::clone(&session));
        session
    }

    fn apply_locked(&self, state: &mut ControllerState, previous: DelaySettings) {
        let settings = state.settings;
        if settings == previous {
            return;
        }

        if settings.delay_ms != previous.delay_ms {
            for session in state.sessions.values() {
                session.set_delay(settings.delay_ms);
            }
        }

        match (previous.is_engaged(), settings.is_engaged()) {
            (false, true) => {
                info!(
                    "Delay engaged at {}ms for {} sources",
                    settings.delay_ms,
                    state.sources.len()
                );
                let sources: Vec<_> = state.sources.values().cloned().collect();
                for source in sources {
                    let session = self.get_or_create_locked(state, source);
                    session.activate();
                }
            }
            (true, false) => {
                info!(
                    "Delay released (delay {}ms, paused {})",
                    settings.delay_ms, settings.paused
                );
                Self::deactivate_all_locked(state);
            }
            (true, true) => {
                debug!("Delay now {}ms", settings.delay_ms);
            }
            (false, false) => {}
        }
    }

    fn deactivate_all_locked(state: &mut ControllerState) {
        for (_, session) in state.sessions.drain() {
            session.deactivate();
        }
    }
}

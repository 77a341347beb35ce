//! Host-facing session handle and its background connection tasks.
//!
//! [`Session`] is the single entry point a host uses. All mutable state lives
//! in a [`SessionMachine`] behind a mutex shared with the transport callbacks
//! and the connect/reconnect tasks. Callbacks only touch that state and queue
//! events; host handlers run inside [`Session::poll`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crowdplay_config::Config;
use crowdplay_input::Scope;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::capability::{AuthHttpClient, TokenStore, Transport, TransportListener};
use crate::entities::{Control, Group, Participant, Scene};
use crate::error::SessionError;
use crate::event::{
    ButtonEvent, ErrorEvent, ErrorKind, JoystickEvent, ParticipantStateChange, SessionEvent,
};
use crate::machine::{SessionMachine, now_ms};
use crate::settings::SessionSettings;
use crate::state::InteractivityState;

/// Only one session may exist per process.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Platform capabilities the session runs on.
#[derive(Clone)]
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub auth: Arc<dyn AuthHttpClient>,
    pub tokens: Arc<dyn TokenStore>,
}

/// Why a connect attempt failed, already classified for the error event.
#[derive(Debug)]
pub(crate) struct ConnectFailure {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
}

impl ConnectFailure {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
        }
    }

    pub(crate) fn authorization(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Authorization,
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct Tasks {
    connect: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

/// State shared between the host handle, transport callbacks and tasks.
///
/// Lock order: `core` and `tasks` are never held together, and neither is
/// held across an await.
pub(crate) struct Shared {
    pub(crate) core: Mutex<SessionMachine>,
    pub(crate) services: Services,
    pub(crate) settings: SessionSettings,
    runtime: Handle,
    tasks: Mutex<Tasks>,
}

impl Shared {
    pub(crate) fn push_error(&self, kind: ErrorKind, message: impl Into<String>) {
        self.core.lock().push_error(kind, message);
    }

    /// Hand frames to the transport while `core` is still locked, so request
    /// ids reach the wire in the order they were allocated. Transport sends
    /// only queue the frame and never call back into the session.
    fn send_locked(&self, core: &mut SessionMachine, frames: Vec<String>) {
        for frame in frames {
            if let Err(e) = self.services.transport.send(frame) {
                core.push_error(ErrorKind::Transport, e.to_string());
            }
        }
    }

    /// Start a connect attempt unless one is already running.
    fn spawn_connect(self: &Arc<Self>) {
        let Some(generation) = self.core.lock().begin_connect() else {
            return;
        };
        let shared = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            shared.connect(generation).await;
        });
        if let Some(previous) = self.tasks.lock().connect.replace(handle) {
            previous.abort();
        }
    }

    async fn connect(self: Arc<Self>, generation: u64) {
        let result = self.establish(generation).await;

        let mut core = self.core.lock();
        if core.generation() != generation {
            return;
        }
        core.end_connect();
        let Err(failure) = result else {
            return;
        };
        core.push_error(failure.kind, failure.message);
        drop(core);
        self.schedule_reconnect();
    }

    async fn establish(self: &Arc<Self>, generation: u64) -> Result<(), ConnectFailure> {
        let url = match &self.settings.socket_url {
            Some(url) => url.clone(),
            None => self.discover().await?,
        };
        let tokens = self.authorize(&url).await?;

        tracing::info!(url = %url, "connecting");
        let request = self.settings.connect_request(&url, &tokens.access_token);
        let listener: Arc<dyn TransportListener> = Arc::new(Listener {
            shared: Arc::downgrade(self),
            generation,
        });
        self.services
            .transport
            .connect(request, listener)
            .await
            .map_err(|e| ConnectFailure::transport(e.to_string()))
    }

    async fn discover(&self) -> Result<String, ConnectFailure> {
        let hosts = self
            .services
            .auth
            .discover_hosts()
            .await
            .map_err(|e| ConnectFailure::transport(format!("host discovery failed: {e}")))?;
        tracing::debug!(count = hosts.len(), "discovered hosts");
        hosts
            .into_iter()
            .next()
            .ok_or_else(|| ConnectFailure::transport("host discovery returned no hosts"))
    }

    /// Retry after the fixed interval. At most one retry is pending.
    fn schedule_reconnect(self: &Arc<Self>) {
        let Some(delay) = self.core.lock().begin_reconnect() else {
            return;
        };
        tracing::info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        let shared = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.core.lock().reconnect_scheduled = false;
            shared.spawn_connect();
        });
        if let Some(previous) = self.tasks.lock().reconnect.replace(handle) {
            previous.abort();
        }
    }

    fn abort_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in [tasks.connect, tasks.reconnect].into_iter().flatten() {
            task.abort();
        }
    }
}

/// Transport callbacks for one connection. Holds the session weakly and drops
/// callbacks from connections that have been superseded.
struct Listener {
    shared: Weak<Shared>,
    generation: u64,
}

impl Listener {
    fn current(&self) -> Option<Arc<Shared>> {
        let shared = self.shared.upgrade()?;
        let current = shared.core.lock().generation() == self.generation;
        current.then_some(shared)
    }
}

impl TransportListener for Listener {
    fn on_open(&self) {
        let Some(shared) = self.current() else {
            return;
        };
        {
            let mut core = shared.core.lock();
            let frames = core.on_open();
            shared.send_locked(&mut core, frames);
        }
        if let Some(task) = shared.tasks.lock().reconnect.take() {
            task.abort();
        }
    }

    fn on_message(&self, text: &str) {
        let Some(shared) = self.current() else {
            return;
        };
        let mut core = shared.core.lock();
        let frames = core.handle_frame(text, now_ms());
        shared.send_locked(&mut core, frames);
    }

    fn on_close(&self, reason: Option<String>) {
        let Some(shared) = self.current() else {
            return;
        };
        let reconnect = shared.core.lock().on_close(reason.as_deref());
        if reconnect {
            shared.schedule_reconnect();
        }
    }
}

type Handler<T> = Option<Box<dyn FnMut(&Session, &T) + Send>>;

#[derive(Default)]
struct EventHandlers {
    state_changed: Handler<InteractivityState>,
    participant: Handler<ParticipantStateChange>,
    button: Handler<ButtonEvent>,
    joystick: Handler<JoystickEvent>,
    error: Handler<ErrorEvent>,
}

impl EventHandlers {
    fn dispatch(&mut self, session: &Session, event: &SessionEvent) {
        match event {
            SessionEvent::InteractivityStateChanged(state) => {
                if let Some(handler) = &mut self.state_changed {
                    handler(session, state);
                }
            }
            SessionEvent::ParticipantStateChanged(change) => {
                if let Some(handler) = &mut self.participant {
                    handler(session, change);
                }
            }
            SessionEvent::Button(button) => {
                if let Some(handler) = &mut self.button {
                    handler(session, button);
                }
            }
            SessionEvent::Joystick(joystick) => {
                if let Some(handler) = &mut self.joystick {
                    handler(session, joystick);
                }
            }
            SessionEvent::Error(error) => {
                if let Some(handler) = &mut self.error {
                    handler(session, error);
                }
            }
        }
    }
}

/// A connection to the interactive service on behalf of one host.
///
/// # Usage
///
/// 1. Build with [`Session::new`] and register handlers.
/// 2. Call [`initialize`](Self::initialize) once.
/// 3. Call [`poll`](Self::poll) once per host frame; handlers run there.
/// 4. Drop the session (or call [`dispose`](Self::dispose)) to shut down.
pub struct Session {
    shared: Arc<Shared>,
    handlers: EventHandlers,
}

impl Session {
    /// Create the process's session. Background tasks run on `runtime`.
    pub fn new(config: &Config, services: Services, runtime: Handle) -> Result<Self, SessionError> {
        if SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::SessionAlreadyActive);
        }
        let settings = SessionSettings::from_config(config);
        let core = SessionMachine::new(settings.reconnect_interval, settings.log_frames);
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                services,
                settings,
                runtime,
                tasks: Mutex::new(Tasks::default()),
            }),
            handlers: EventHandlers::default(),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    pub fn on_interactivity_state_changed(
        &mut self,
        handler: impl FnMut(&Session, &InteractivityState) + Send + 'static,
    ) {
        self.handlers.state_changed = Some(Box::new(handler));
    }

    pub fn on_participant_state_changed(
        &mut self,
        handler: impl FnMut(&Session, &ParticipantStateChange) + Send + 'static,
    ) {
        self.handlers.participant = Some(Box::new(handler));
    }

    pub fn on_button(&mut self, handler: impl FnMut(&Session, &ButtonEvent) + Send + 'static) {
        self.handlers.button = Some(Box::new(handler));
    }

    pub fn on_joystick(&mut self, handler: impl FnMut(&Session, &JoystickEvent) + Send + 'static) {
        self.handlers.joystick = Some(Box::new(handler));
    }

    pub fn on_error(&mut self, handler: impl FnMut(&Session, &ErrorEvent) + Send + 'static) {
        self.handlers.error = Some(Box::new(handler));
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start connecting. With `auto_go_interactive` the session sends
    /// `ready` as soon as it reaches `Initialized`. Does nothing if the
    /// session is already initialized.
    pub fn initialize(&self, auto_go_interactive: bool) -> Result<(), SessionError> {
        if !self.shared.settings.is_complete() {
            return Err(SessionError::MissingProjectConfig);
        }
        {
            let mut core = self.shared.core.lock();
            if core.state() != InteractivityState::NotInitialized {
                tracing::debug!(state = %core.state(), "initialize ignored");
                return Ok(());
            }
            core.reset();
            core.set_pending_interactive(auto_go_interactive);
            core.set_state(InteractivityState::Initializing);
        }
        self.shared.spawn_connect();
        Ok(())
    }

    /// Ask the service to start delivering input. Deferred until the session
    /// is initialized if it is still connecting.
    pub fn start_interactive(&self) -> Result<(), SessionError> {
        let mut core = self.shared.core.lock();
        let frame = core.start_interactive()?;
        self.shared.send_locked(&mut core, frame.into_iter().collect());
        Ok(())
    }

    pub fn stop_interactive(&self) {
        let mut core = self.shared.core.lock();
        let frame = core.stop_interactive();
        self.shared.send_locked(&mut core, frame.into_iter().collect());
    }

    /// Rotate the input counters and run handlers for every queued event.
    pub fn poll(&mut self) {
        let events = self.shared.core.lock().begin_frame();
        if events.is_empty() {
            return;
        }
        let mut handlers = std::mem::take(&mut self.handlers);
        for event in &events {
            handlers.dispatch(self, event);
        }
        self.handlers = handlers;
    }

    /// Drain queued events without running handlers.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.shared.core.lock().begin_frame()
    }

    /// Stop every background task, close the transport and return to
    /// `NotInitialized`. The session can be initialized again afterwards.
    pub fn dispose(&self) {
        self.shared.core.lock().reset();
        self.shared.abort_tasks();
        self.shared.services.transport.close();
    }

    // -----------------------------------------------------------------------
    // Server operations
    // -----------------------------------------------------------------------

    fn send_op(
        &self,
        op: impl FnOnce(&mut SessionMachine) -> Result<String, SessionError>,
    ) -> Result<(), SessionError> {
        let mut core = self.shared.core.lock();
        let frame = op(&mut core)?;
        self.shared.send_locked(&mut core, vec![frame]);
        Ok(())
    }

    pub fn create_group(&self, group_id: &str, scene_id: &str) -> Result<(), SessionError> {
        self.send_op(|core| core.create_group(group_id, scene_id))
    }

    pub fn set_group_scene(&self, group_id: &str, scene_id: &str) -> Result<(), SessionError> {
        self.send_op(|core| core.set_group_scene(group_id, scene_id))
    }

    /// Scene shown to the default group.
    pub fn current_scene(&self) -> String {
        self.shared.core.lock().current_scene()
    }

    pub fn set_current_scene(&self, scene_id: &str) -> Result<(), SessionError> {
        self.set_group_scene(crowdplay_protocol::DEFAULT_GROUP_ID, scene_id)
    }

    pub fn set_participant_group(&self, user_id: u32, group_id: &str) -> Result<(), SessionError> {
        self.send_op(|core| core.set_participant_group(user_id, group_id))
    }

    pub fn update_scene(&self, scene_id: &str) -> Result<(), SessionError> {
        self.send_op(|core| core.update_scene(scene_id))
    }

    pub fn set_control_disabled(&self, control_id: &str, disabled: bool) -> Result<(), SessionError> {
        self.send_op(|core| core.set_control_disabled(control_id, disabled))
    }

    /// Disable a button for `cooldown` from now.
    pub fn trigger_cooldown(&self, control_id: &str, cooldown: Duration) -> Result<(), SessionError> {
        self.send_op(|core| core.trigger_cooldown(control_id, cooldown, now_ms()))
    }

    /// Progress bar fill of a button, clamped to `0.0..=1.0`.
    pub fn set_control_progress(&self, control_id: &str, progress: f32) -> Result<(), SessionError> {
        self.send_op(|core| core.set_control_progress(control_id, progress))
    }

    pub fn set_joystick_coordinates(
        &self,
        control_id: &str,
        x: f64,
        y: f64,
    ) -> Result<(), SessionError> {
        self.send_op(|core| core.set_joystick_coordinates(control_id, x, y))
    }

    pub fn request_compression(&self, schemes: &[&str]) -> Result<(), SessionError> {
        self.send_op(|core| core.request_compression(schemes))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn interactivity_state(&self) -> InteractivityState {
        self.shared.core.lock().state()
    }

    /// Code the user must enter on the website, while one is outstanding.
    pub fn short_code(&self) -> Option<String> {
        self.shared.core.lock().short_code().map(str::to_string)
    }

    /// Requests still waiting for a reply.
    pub fn outstanding_requests(&self) -> usize {
        self.shared.core.lock().requests().len()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.shared.core.lock().cache().participants().to_vec()
    }

    /// The participant, or a placeholder in state `Left`.
    pub fn participant(&self, user_id: u32) -> Participant {
        self.shared
            .core
            .lock()
            .cache()
            .participant(user_id)
            .cloned()
            .unwrap_or_else(|| Participant::placeholder(user_id))
    }

    pub fn contains_participant(&self, user_id: u32) -> bool {
        self.shared.core.lock().cache().participant(user_id).is_some()
    }

    pub fn participants_in_group(&self, group_id: &str) -> Vec<Participant> {
        let core = self.shared.core.lock();
        core.cache()
            .participants_in_group(group_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.shared.core.lock().cache().groups().to_vec()
    }

    /// The group, or a placeholder showing the default scene.
    pub fn group(&self, group_id: &str) -> Group {
        self.shared
            .core
            .lock()
            .cache()
            .group(group_id)
            .cloned()
            .unwrap_or_else(|| Group::placeholder(group_id))
    }

    pub fn contains_group(&self, group_id: &str) -> bool {
        self.shared.core.lock().cache().group(group_id).is_some()
    }

    pub fn groups_for_scene(&self, scene_id: &str) -> Vec<Group> {
        let core = self.shared.core.lock();
        core.cache()
            .groups_for_scene(scene_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn scenes(&self) -> Vec<Scene> {
        self.shared.core.lock().cache().scenes().to_vec()
    }

    pub fn scene(&self, scene_id: &str) -> Scene {
        self.shared
            .core
            .lock()
            .cache()
            .scene(scene_id)
            .cloned()
            .unwrap_or_else(|| Scene::placeholder(scene_id))
    }

    pub fn contains_scene(&self, scene_id: &str) -> bool {
        self.shared.core.lock().cache().scene(scene_id).is_some()
    }

    pub fn controls_in_scene(&self, scene_id: &str) -> Vec<Control> {
        let core = self.shared.core.lock();
        core.cache()
            .controls_in_scene(scene_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn buttons_in_scene(&self, scene_id: &str) -> Vec<Control> {
        let core = self.shared.core.lock();
        core.cache()
            .buttons_in_scene(scene_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn joysticks_in_scene(&self, scene_id: &str) -> Vec<Control> {
        let core = self.shared.core.lock();
        core.cache()
            .joysticks_in_scene(scene_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn buttons(&self) -> Vec<Control> {
        self.shared.core.lock().cache().buttons().cloned().collect()
    }

    /// The button, or an enabled placeholder.
    pub fn button(&self, control_id: &str) -> Control {
        self.shared
            .core
            .lock()
            .cache()
            .button(control_id)
            .cloned()
            .unwrap_or_else(|| Control::placeholder_button(control_id))
    }

    pub fn contains_button(&self, control_id: &str) -> bool {
        self.shared.core.lock().cache().button(control_id).is_some()
    }

    pub fn joysticks(&self) -> Vec<Control> {
        self.shared.core.lock().cache().joysticks().cloned().collect()
    }

    /// The joystick, or a disabled placeholder.
    pub fn joystick(&self, control_id: &str) -> Control {
        self.shared
            .core
            .lock()
            .cache()
            .joystick(control_id)
            .cloned()
            .unwrap_or_else(|| Control::placeholder_joystick(control_id))
    }

    pub fn contains_joystick(&self, control_id: &str) -> bool {
        self.shared.core.lock().cache().joystick(control_id).is_some()
    }

    // -----------------------------------------------------------------------
    // Input queries. `None` asks about all participants combined.
    // -----------------------------------------------------------------------

    fn with_input<T>(
        &self,
        f: impl FnOnce(&crowdplay_input::InputAggregator, Scope) -> T,
        participant: Option<u32>,
    ) -> T {
        let scope = participant.map_or(Scope::Global, Scope::Participant);
        f(self.shared.core.lock().input(), scope)
    }

    pub fn button_down(&self, control_id: &str, participant: Option<u32>) -> bool {
        self.with_input(|input, scope| input.button_down(control_id, scope), participant)
    }

    pub fn button_pressed(&self, control_id: &str, participant: Option<u32>) -> bool {
        self.with_input(|input, scope| input.button_pressed(control_id, scope), participant)
    }

    pub fn button_up(&self, control_id: &str, participant: Option<u32>) -> bool {
        self.with_input(|input, scope| input.button_up(control_id, scope), participant)
    }

    pub fn count_of_button_downs(&self, control_id: &str, participant: Option<u32>) -> u32 {
        self.with_input(
            |input, scope| input.count_of_button_downs(control_id, scope),
            participant,
        )
    }

    pub fn count_of_button_presses(&self, control_id: &str, participant: Option<u32>) -> u32 {
        self.with_input(
            |input, scope| input.count_of_button_presses(control_id, scope),
            participant,
        )
    }

    pub fn count_of_button_ups(&self, control_id: &str, participant: Option<u32>) -> u32 {
        self.with_input(
            |input, scope| input.count_of_button_ups(control_id, scope),
            participant,
        )
    }

    pub fn joystick_x(&self, control_id: &str, participant: Option<u32>) -> f64 {
        self.with_input(|input, scope| input.joystick_x(control_id, scope), participant)
    }

    pub fn joystick_y(&self, control_id: &str, participant: Option<u32>) -> f64 {
        self.with_input(|input, scope| input.joystick_y(control_id, scope), participant)
    }

    /// Controls a participant has produced input on.
    pub fn controls_for_participant(&self, user_id: u32) -> Vec<String> {
        let core = self.shared.core.lock();
        core.input()
            .controls_for_participant(user_id)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
        SESSION_ACTIVE.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
